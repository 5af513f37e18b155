//! Declarative schema for effect catalogs, shared by the built-in catalog, user
//! supplied TOML files, and the renderer's chain planner. Everything here is
//! plain data; the renderer never mutates a catalog after loading it.
//!
//! Types:
//!
//! - `Parameter` describes one scalar uniform with its slider bounds.
//! - `Pass` stores a fragment body, optional helper block, sampler inputs, and
//!   the symbolic output key.
//! - `Effect` groups ordered parameters and passes under an id and category.
//!
//! Functions:
//!
//! - `Effect::validate` returns hard errors that make a catalog unusable.
//! - `Effect::lint` returns soft issues that only degrade rendering.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Output key meaning "the chain's current destination".
pub const FINAL_OUTPUT: &str = "final";
/// Input key meaning "the chain's current source".
pub const SOURCE_INPUT: &str = "source";
/// Sampler name that receives the predeclared `color` convenience read.
pub const PRIMARY_SAMPLER: &str = "u_texture";
/// Target keys owned by the renderer that passes may never write by name.
pub const RESERVED_OUTPUTS: [&str; 3] = ["source", "A", "B"];
/// Uniforms every synthesized fragment program predeclares.
pub const ENVIRONMENT_UNIFORMS: [&str; 4] = ["u_resolution", "u_time", "u_mouseX", "u_mouseY"];
/// Names the fragment prelude defines; sampler inputs may not shadow them.
pub const SHADER_BUILTINS: [&str; 4] = ["texture2D", "gl_FragColor", "v_texCoord", "color"];

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Parameter {
    pub id: String,
    pub name: String,
    pub min: f32,
    pub max: f32,
    #[serde(default = "default_step")]
    pub step: f32,
    #[serde(rename = "initial")]
    pub initial_value: f32,
    #[serde(default)]
    pub unit: String,
}

fn default_step() -> f32 {
    0.01
}

impl Parameter {
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.initial_value;
        }
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Pass {
    pub shader: String,
    #[serde(default)]
    pub helpers: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    pub output: String,
}

impl Pass {
    pub fn writes_final(&self) -> bool {
        self.output == FINAL_OUTPUT
    }

    /// Input uniform names in binding order.
    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Effect {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub passes: Vec<Pass>,
}

impl Effect {
    pub fn parameter(&self, id: &str) -> Option<&Parameter> {
        self.params.iter().find(|param| param.id == id)
    }

    /// True when at least one pass writes to the chain destination.
    pub fn advances_chain(&self) -> bool {
        self.passes.iter().any(Pass::writes_final)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.id.trim().is_empty() {
            issues.push("effect id must not be empty".to_string());
        }
        if self.passes.is_empty() {
            issues.push(format!("effect '{}' must declare at least one pass", self.id));
        }

        let mut seen = BTreeSet::new();
        for param in &self.params {
            if !is_identifier(&param.id) {
                issues.push(format!(
                    "effect '{}' parameter '{}' is not a valid identifier",
                    self.id, param.id
                ));
            }
            if !seen.insert(param.id.as_str()) {
                issues.push(format!(
                    "effect '{}' declares parameter '{}' twice",
                    self.id, param.id
                ));
            }
            let uniform = format!("u_{}", param.id);
            if ENVIRONMENT_UNIFORMS.contains(&uniform.as_str()) {
                issues.push(format!(
                    "effect '{}' parameter '{}' collides with environment uniform '{}'",
                    self.id, param.id, uniform
                ));
            }
            if param.min > param.max {
                issues.push(format!(
                    "effect '{}' parameter '{}' has min {} above max {}",
                    self.id, param.id, param.min, param.max
                ));
            }
        }

        for (index, pass) in self.passes.iter().enumerate() {
            if pass.output.trim().is_empty() {
                issues.push(format!(
                    "effect '{}' pass {} has an empty output key",
                    self.id, index
                ));
            }
            if RESERVED_OUTPUTS.contains(&pass.output.as_str()) {
                issues.push(format!(
                    "effect '{}' pass {} writes reserved target '{}'",
                    self.id, index, pass.output
                ));
            }
            for uniform in pass.inputs.keys() {
                if !is_identifier(uniform) {
                    issues.push(format!(
                        "effect '{}' pass {} binds invalid sampler name '{}'",
                        self.id, index, uniform
                    ));
                } else if self.shadows_shader_name(uniform) {
                    issues.push(format!(
                        "effect '{}' pass {} sampler '{}' collides with a shader uniform or builtin",
                        self.id, index, uniform
                    ));
                }
            }
        }
        issues
    }

    fn shadows_shader_name(&self, sampler: &str) -> bool {
        ENVIRONMENT_UNIFORMS.contains(&sampler)
            || SHADER_BUILTINS.contains(&sampler)
            || sampler.starts_with("pp_")
            || self
                .params
                .iter()
                .any(|param| sampler.strip_prefix("u_") == Some(param.id.as_str()))
    }

    pub fn lint(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.advances_chain() {
            issues.push(format!(
                "effect '{}' has no pass writing '{}'; it will not change the chain output",
                self.id, FINAL_OUTPUT
            ));
        }

        for param in &self.params {
            if param.initial_value < param.min || param.initial_value > param.max {
                issues.push(format!(
                    "effect '{}' parameter '{}' initial value {} lies outside [{}, {}]",
                    self.id, param.id, param.initial_value, param.min, param.max
                ));
            }
        }

        let mut produced: BTreeSet<&str> = BTreeSet::new();
        for (index, pass) in self.passes.iter().enumerate() {
            for (uniform, key) in &pass.inputs {
                let known = key == SOURCE_INPUT
                    || RESERVED_OUTPUTS.contains(&key.as_str())
                    || produced.contains(key.as_str());
                if !known {
                    issues.push(format!(
                        "effect '{}' pass {} reads '{}' into '{}' before any earlier pass produced it",
                        self.id, index, key, uniform
                    ));
                }
                if *key == pass.output {
                    issues.push(format!(
                        "effect '{}' pass {} reads and writes '{}' in the same draw",
                        self.id, index, key
                    ));
                }
            }
            if !pass.writes_final() {
                produced.insert(pass.output.as_str());
            }
        }
        issues
    }
}

/// GLSL-style identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(output: &str, inputs: &[(&str, &str)]) -> Pass {
        Pass {
            shader: "gl_FragColor = color;".into(),
            helpers: String::new(),
            inputs: inputs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            output: output.into(),
        }
    }

    fn effect(passes: Vec<Pass>) -> Effect {
        Effect {
            id: "demo".into(),
            name: "Demo".into(),
            category: "Test".into(),
            params: vec![Parameter {
                id: "amount".into(),
                name: "Amount".into(),
                min: 0.0,
                max: 2.0,
                step: 0.01,
                initial_value: 1.0,
                unit: "x".into(),
            }],
            passes,
        }
    }

    #[test]
    fn identifiers_follow_glsl_rules() {
        assert!(is_identifier("u_texture"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("with-dash"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn validate_rejects_reserved_outputs() {
        let issues = effect(vec![pass("A", &[("u_texture", "source")])]).validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("reserved target 'A'"));
    }

    #[test]
    fn lint_flags_reads_before_production() {
        let fx = effect(vec![
            pass("final", &[("u_texture", "source"), ("u_blur_tex", "blur")]),
            pass("blur", &[("u_texture", "source")]),
        ]);
        let issues = fx.lint();
        assert!(issues.iter().any(|issue| issue.contains("reads 'blur'")));
    }

    #[test]
    fn lint_accepts_well_formed_multi_pass_effect() {
        let fx = effect(vec![
            pass("blur", &[("u_texture", "source")]),
            pass("final", &[("u_texture", "source"), ("u_blur_tex", "blur")]),
        ]);
        assert!(fx.validate().is_empty());
        assert!(fx.lint().is_empty());
        assert!(fx.advances_chain());
    }

    #[test]
    fn validate_rejects_names_that_collide_in_the_shader() {
        let mut fx = effect(vec![pass("final", &[("u_texture", "source")])]);
        fx.params[0].id = "time".into();
        let issues = fx.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("environment uniform 'u_time'"));

        for sampler in ["u_resolution", "u_amount", "color", "pp_tex_u_texture"] {
            let issues = effect(vec![pass("final", &[(sampler, "source")])]).validate();
            assert_eq!(issues.len(), 1, "{sampler}: {issues:?}");
            assert!(issues[0].contains(&format!("sampler '{sampler}' collides")));
        }
    }

    #[test]
    fn clamp_respects_bounds_and_nan() {
        let fx = effect(Vec::new());
        let param = fx.parameter("amount").unwrap();
        assert_eq!(param.clamp(5.0), 2.0);
        assert_eq!(param.clamp(-1.0), 0.0);
        assert_eq!(param.clamp(f32::NAN), 1.0);
    }
}
