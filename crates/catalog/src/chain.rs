use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Catalog, CatalogError};

/// One entry of an effect chain: an effect id plus the parameter values the
/// caller has overridden. Missing parameters fall back to their initial value.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct AppliedEffect {
    pub id: String,
    #[serde(default)]
    pub params: BTreeMap<String, f32>,
}

impl AppliedEffect {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, id: impl Into<String>, value: f32) -> Self {
        self.params.insert(id.into(), value);
        self
    }
}

/// Ordered list of applied effects. Position defines execution order.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct EffectChain {
    effects: Vec<AppliedEffect>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_effects(effects: Vec<AppliedEffect>) -> Self {
        Self { effects }
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AppliedEffect> {
        self.effects.iter()
    }

    pub fn as_slice(&self) -> &[AppliedEffect] {
        &self.effects
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.effects.iter().position(|effect| effect.id == id)
    }

    /// Appends `id` with every parameter seeded from its initial value.
    /// Returns `Ok(false)` when the effect is already part of the chain.
    pub fn add(&mut self, catalog: &Catalog, id: &str) -> Result<bool, CatalogError> {
        if self.contains(id) {
            return Ok(false);
        }
        let effect = catalog
            .get(id)
            .ok_or_else(|| CatalogError::UnknownEffect(id.to_string()))?;
        let params = effect
            .params
            .iter()
            .map(|param| (param.id.clone(), param.initial_value))
            .collect();
        self.effects.push(AppliedEffect {
            id: id.to_string(),
            params,
        });
        Ok(true)
    }

    /// Pushes an entry without consulting a catalog. Unknown ids are kept and
    /// reported by the renderer when the chain executes.
    pub fn push(&mut self, effect: AppliedEffect) {
        self.effects.push(effect);
    }

    pub fn remove(&mut self, id: &str) -> Option<AppliedEffect> {
        let index = self.position(id)?;
        Some(self.effects.remove(index))
    }

    /// Moves `id` to `index`, clamping the index to the chain length.
    pub fn move_to(&mut self, id: &str, index: usize) -> bool {
        let Some(from) = self.position(id) else {
            return false;
        };
        let entry = self.effects.remove(from);
        let to = index.min(self.effects.len());
        self.effects.insert(to, entry);
        true
    }

    /// Stores a parameter override clamped to the catalog bounds and returns
    /// the value that was actually stored.
    pub fn set_param(
        &mut self,
        catalog: &Catalog,
        effect_id: &str,
        param_id: &str,
        value: f32,
    ) -> Result<f32, CatalogError> {
        let effect = catalog
            .get(effect_id)
            .ok_or_else(|| CatalogError::UnknownEffect(effect_id.to_string()))?;
        let param = effect
            .parameter(param_id)
            .ok_or_else(|| CatalogError::UnknownParameter {
                effect: effect_id.to_string(),
                parameter: param_id.to_string(),
            })?;
        let entry = self
            .effects
            .iter_mut()
            .find(|entry| entry.id == effect_id)
            .ok_or_else(|| CatalogError::NotInChain(effect_id.to_string()))?;
        let clamped = param.clamp(value);
        entry.params.insert(param_id.to_string(), clamped);
        Ok(clamped)
    }
}

impl FromIterator<AppliedEffect> for EffectChain {
    fn from_iter<I: IntoIterator<Item = AppliedEffect>>(iter: I) -> Self {
        Self {
            effects: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EffectChain {
    type Item = &'a AppliedEffect;
    type IntoIter = std::slice::Iter<'a, AppliedEffect>;

    fn into_iter(self) -> Self::IntoIter {
        self.effects.iter()
    }
}
