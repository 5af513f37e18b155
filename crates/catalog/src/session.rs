//! Session files capture a chain plus the environment inputs needed to
//! reproduce a render:
//!
//! ```toml
//! time = 1.5
//!
//! [pointer]
//! x = 0.25
//! y = 0.75
//!
//! [[effects]]
//! id = "brightness"
//! params = { amount = 1.5 }
//! ```
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{AppliedEffect, Catalog, CatalogError, EffectChain};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PointerSetting {
    pub x: f32,
    pub y: f32,
}

impl Default for PointerSetting {
    fn default() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<PointerSetting>,
    #[serde(default)]
    pub effects: Vec<AppliedEffect>,
}

impl Session {
    pub fn from_toml_str(input: &str) -> Result<Self, CatalogError> {
        let session: Session = toml::from_str(input)?;
        session.validate()?;
        Ok(session)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, CatalogError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if let Some(time) = self.time {
            if !time.is_finite() || time < 0.0 {
                return Err(CatalogError::Invalid(format!(
                    "session time must be a non-negative number, got {time}"
                )));
            }
        }
        if let Some(pointer) = self.pointer {
            let in_range = |v: f32| (0.0..=1.0).contains(&v);
            if !in_range(pointer.x) || !in_range(pointer.y) {
                return Err(CatalogError::Invalid(format!(
                    "session pointer ({}, {}) must lie within [0, 1]",
                    pointer.x, pointer.y
                )));
            }
        }
        Ok(())
    }

    /// Builds a chain from the session entries. Known parameters are clamped
    /// to catalog bounds; unknown effects are kept so the renderer reports them.
    pub fn chain(&self, catalog: &Catalog) -> EffectChain {
        self.effects
            .iter()
            .map(|entry| {
                let Some(effect) = catalog.get(&entry.id) else {
                    tracing::warn!(effect = %entry.id, "session references unknown effect");
                    return entry.clone();
                };
                let mut applied = AppliedEffect::new(entry.id.clone());
                for (param_id, value) in &entry.params {
                    match effect.parameter(param_id) {
                        Some(param) => {
                            applied.params.insert(param_id.clone(), param.clamp(*value));
                        }
                        None => tracing::warn!(
                            effect = %entry.id,
                            parameter = %param_id,
                            "ignoring unknown parameter in session"
                        ),
                    }
                }
                applied
            })
            .collect()
    }
}
