#![allow(dead_code)]

use catalog::{AppliedEffect, Catalog, EffectChain};
use renderer::{RenderError, Renderer, RendererConfig};

/// Red, green / blue, white.
pub const QUAD: [u8; 16] = [
    255, 0, 0, 255, 0, 255, 0, 255, //
    0, 0, 255, 255, 255, 255, 255, 255,
];

pub fn headless(catalog: Catalog) -> Option<Renderer> {
    headless_with(catalog, RendererConfig::default())
}

pub fn headless_with(catalog: Catalog, config: RendererConfig) -> Option<Renderer> {
    let config = RendererConfig {
        allow_software: true,
        ..config
    };
    match Renderer::headless(catalog, &config) {
        Ok(renderer) => Some(renderer),
        Err(err @ (RenderError::NoAdapter(_) | RenderError::Device(_))) => {
            eprintln!("No adapter available; skipping GPU test: {err}");
            None
        }
        Err(err) => panic!("unexpected renderer failure: {err}"),
    }
}

pub fn builtin() -> Catalog {
    Catalog::builtin().unwrap()
}

pub fn chain(entries: &[(&str, f32)]) -> EffectChain {
    entries
        .iter()
        .map(|(id, amount)| AppliedEffect::new(*id).with_param("amount", *amount))
        .collect()
}

pub fn assert_close(actual: &[u8], expected: &[u8], tolerance: u8) {
    assert_eq!(actual.len(), expected.len());
    for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            a.abs_diff(*e) <= tolerance,
            "byte {index}: got {a}, expected {e} (±{tolerance})\nactual:   {actual:?}\nexpected: {expected:?}"
        );
    }
}
