//! Effect catalog for the post-processing engine.
//!
//! A catalog is read-only declarative data: effects made of parameters and
//! fragment passes. The renderer consumes it together with an [`EffectChain`]
//! describing which effects run, in which order, with which overrides.
mod chain;
mod model;
mod session;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use chain::{AppliedEffect, EffectChain};
pub use model::{
    is_identifier, Effect, Parameter, Pass, ENVIRONMENT_UNIFORMS, FINAL_OUTPUT, PRIMARY_SAMPLER,
    RESERVED_OUTPUTS, SHADER_BUILTINS, SOURCE_INPUT,
};
pub use session::{PointerSetting, Session};

const BUILTIN_EFFECTS: &str = include_str!("../assets/effects.toml");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialise catalog data: {0}")]
    Serialise(#[from] toml::ser::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog: {0}")]
    Invalid(String),
    #[error("unknown effect '{0}'")]
    UnknownEffect(String),
    #[error("effect '{effect}' has no parameter '{parameter}'")]
    UnknownParameter { effect: String, parameter: String },
    #[error("effect '{0}' is not part of the chain")]
    NotInChain(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct CatalogFile {
    #[serde(default, rename = "effect")]
    effects: Vec<Effect>,
}

/// Ordered, id-addressable set of effects.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    effects: Vec<Effect>,
    index: BTreeMap<String, usize>,
}

impl Catalog {
    /// Parses `[[effect]]` tables and rejects the catalog when any effect has
    /// hard validation errors. Soft issues are logged and tolerated.
    pub fn from_toml_str(input: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(input)?;
        Self::from_effects(file.effects)
    }

    pub fn from_effects(effects: Vec<Effect>) -> Result<Self, CatalogError> {
        let mut issues = Vec::new();
        let mut index = BTreeMap::new();
        for (position, effect) in effects.iter().enumerate() {
            issues.extend(effect.validate());
            if index.insert(effect.id.clone(), position).is_some() {
                issues.push(format!("effect id '{}' is declared twice", effect.id));
            }
        }
        if !issues.is_empty() {
            return Err(CatalogError::Invalid(issues.join("; ")));
        }

        for effect in &effects {
            for issue in effect.lint() {
                tracing::warn!(effect = %effect.id, "{issue}");
            }
        }
        tracing::debug!(effects = effects.len(), "loaded effect catalog");
        Ok(Self { effects, index })
    }

    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_EFFECTS)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn get(&self, id: &str) -> Option<&Effect> {
        self.index.get(id).map(|&position| &self.effects[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Category names in first-seen order, deduplicated.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.effects
            .iter()
            .map(|effect| effect.category.as_str())
            .filter(|category| seen.insert(*category))
            .collect()
    }

    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Effect> + 'a {
        self.effects
            .iter()
            .filter(move |effect| effect.category == category)
    }

    /// Soft issues across every effect, for tooling that wants to surface them.
    pub fn lint(&self) -> Vec<String> {
        self.effects.iter().flat_map(Effect::lint).collect()
    }
}
