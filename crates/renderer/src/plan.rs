//! Target key resolution for an effect chain.
//!
//! Planning walks the chain exactly like execution does but touches no GPU
//! state: it decides which target every pass writes, which targets feed each
//! input uniform, and which parameter values are uploaded. The executor then
//! only has to allocate, bind, and draw.
use catalog::{AppliedEffect, Catalog, Effect, EffectChain, Pass, SOURCE_INPUT};

use crate::types::{PassDiagnostic, ACCUM_A, ACCUM_B, SOURCE_TARGET};

#[derive(Debug, Clone)]
pub struct PlannedPass<'a> {
    /// Position of the owning effect in the chain.
    pub position: usize,
    pub effect: &'a Effect,
    pub pass_index: usize,
    pub pass: &'a Pass,
    pub write_key: String,
    /// `(uniform, target key)` pairs in uniform name order.
    pub inputs: Vec<(String, String)>,
    /// One value per effect parameter, in declaration order.
    pub parameter_values: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct ChainPlan<'a> {
    pub steps: Vec<PlannedPass<'a>>,
    pub final_key: String,
    pub diagnostics: Vec<PassDiagnostic>,
}

pub fn plan_chain<'a>(catalog: &'a Catalog, chain: &EffectChain) -> ChainPlan<'a> {
    let mut steps = Vec::new();
    let mut diagnostics = Vec::new();
    let mut current_source = SOURCE_TARGET;
    let mut destination = ACCUM_A;

    for (position, applied) in chain.iter().enumerate() {
        let Some(effect) = catalog.get(&applied.id) else {
            diagnostics.push(PassDiagnostic::UnknownEffectId {
                position,
                effect: applied.id.clone(),
            });
            continue;
        };
        let parameter_values = parameter_values(effect, applied);

        for (pass_index, pass) in effect.passes.iter().enumerate() {
            let write_key = if pass.writes_final() {
                destination.to_string()
            } else {
                pass.output.clone()
            };
            let inputs: Vec<(String, String)> = pass
                .inputs
                .iter()
                .map(|(uniform, key)| {
                    let resolved = if key == SOURCE_INPUT {
                        current_source.to_string()
                    } else {
                        key.clone()
                    };
                    (uniform.clone(), resolved)
                })
                .collect();

            if inputs.iter().any(|(_, key)| *key == write_key) {
                diagnostics.push(PassDiagnostic::TargetAliasing {
                    effect: effect.id.clone(),
                    pass: pass_index,
                    key: write_key,
                });
                continue;
            }

            steps.push(PlannedPass {
                position,
                effect,
                pass_index,
                pass,
                write_key,
                inputs,
                parameter_values: parameter_values.clone(),
            });
        }

        if effect.advances_chain() {
            current_source = destination;
            destination = if current_source == ACCUM_A {
                ACCUM_B
            } else {
                ACCUM_A
            };
        }
    }

    ChainPlan {
        steps,
        final_key: current_source.to_string(),
        diagnostics,
    }
}

fn parameter_values(effect: &Effect, applied: &AppliedEffect) -> Vec<f32> {
    effect
        .params
        .iter()
        .map(|param| {
            applied
                .params
                .get(&param.id)
                .copied()
                .unwrap_or(param.initial_value)
        })
        .collect()
}
