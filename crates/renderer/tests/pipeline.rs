mod common;

use catalog::{AppliedEffect, Catalog, EffectChain};
use renderer::runtime::RenderPolicy;
use renderer::{ImageLoadError, PassDiagnostic, Pointer, RenderError, RendererConfig};

use common::{assert_close, builtin, chain, headless, headless_with, QUAD};

const TEST_EFFECTS: &str = r#"
[[effect]]
id = "copy-a"
name = "Copy A"
category = "Test"

[[effect.params]]
id = "amount"
name = "Amount"
min = 0.0
max = 1.0
initial = 1.0

[[effect.passes]]
shader = "gl_FragColor = color * u_amount;"
inputs = { u_texture = "source" }
output = "final"

[[effect]]
id = "copy-b"
name = "Copy B"
category = "Test"

[[effect.params]]
id = "amount"
name = "Amount"
min = 0.0
max = 1.0
initial = 1.0

[[effect.passes]]
shader = "gl_FragColor = color * u_amount;"
inputs = { u_texture = "source" }
output = "final"

[[effect]]
id = "masked"
name = "Masked"
category = "Test"

[[effect.passes]]
shader = "gl_FragColor = color + texture2D(u_mask, v_texCoord);"
inputs = { u_texture = "source", u_mask = "never_written" }
output = "final"

[[effect]]
id = "broken"
name = "Broken"
category = "Test"

[[effect.passes]]
shader = "gl_FragColor = ;"
inputs = { u_texture = "source" }
output = "final"

[[effect]]
id = "environment"
name = "Environment"
category = "Test"

[[effect.passes]]
shader = "gl_FragColor = vec4(u_mouseX, u_mouseY, u_time / 10.0, u_resolution.x / 4.0);"
output = "final"
"#;

fn test_catalog() -> Catalog {
    Catalog::from_toml_str(TEST_EFFECTS).unwrap()
}

fn unorm(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Brightness then grayscale, quantizing between passes like the targets do.
fn brightness_then_grayscale(rgba: &[u8], brightness: f32, grayscale: f32) -> Vec<u8> {
    rgba.chunks(4)
        .flat_map(|px| {
            let bright: Vec<f32> = px[..3]
                .iter()
                .map(|&c| f32::from(unorm(f32::from(c) / 255.0 * brightness)) / 255.0)
                .collect();
            let gray = bright[0] * 0.2125 + bright[1] * 0.7154 + bright[2] * 0.0721;
            let mut out: Vec<u8> = bright
                .iter()
                .map(|&c| unorm(c + (gray - c) * grayscale))
                .collect();
            out.push(px[3]);
            out
        })
        .collect()
}

#[test]
fn empty_chain_returns_source_unmodified() {
    let Some(mut renderer) = headless(builtin()) else {
        return;
    };
    renderer.load_image(&QUAD, 2, 2).unwrap();
    let (pixels, report) = renderer.render_with_report(&EffectChain::new()).unwrap();
    assert_eq!(report.final_key, "source");
    assert_eq!(report.draws, 0);
    assert_eq!(pixels.rgba, QUAD);
    assert_eq!(pixels.pixel(0, 0), [255, 0, 0, 255]);
    assert_eq!(pixels.pixel(1, 1), [255, 255, 255, 255]);
}

#[test]
fn repeated_renders_are_byte_identical() {
    let Some(mut renderer) = headless(builtin()) else {
        return;
    };
    renderer.load_image(&QUAD, 2, 2).unwrap();
    let chain = chain(&[("blur", 2.0), ("vignette", 0.8), ("bloom", 0.7)]);
    let first = renderer.render_now(&chain).unwrap();
    let second = renderer.render_now(&chain).unwrap();
    assert_eq!(first, second);
}

#[test]
fn identical_passes_share_one_program() {
    let Some(mut renderer) = headless(test_catalog()) else {
        return;
    };
    renderer.load_image(&QUAD, 2, 2).unwrap();
    renderer
        .render_now(&chain(&[("copy-a", 1.0), ("copy-b", 0.5)]))
        .unwrap();
    assert_eq!(renderer.program_count(), 1);
    renderer.render_now(&chain(&[("copy-b", 1.0)])).unwrap();
    assert_eq!(renderer.program_count(), 1);
}

#[test]
fn chain_order_changes_the_result() {
    let Some(mut renderer) = headless(builtin()) else {
        return;
    };
    renderer.load_image(&QUAD, 2, 2).unwrap();
    let forward = renderer
        .render_now(&chain(&[("brightness", 0.5), ("invert", 1.0)]))
        .unwrap();
    let reverse = renderer
        .render_now(&chain(&[("invert", 1.0), ("brightness", 0.5)]))
        .unwrap();
    assert_ne!(forward, reverse);
    assert_close(&forward.pixel(0, 0), &[127, 255, 255, 255], 1);
    assert_close(&reverse.pixel(0, 0), &[0, 128, 128, 255], 1);
}

#[test]
fn loading_a_new_image_rebuilds_every_target() {
    let Some(mut renderer) = headless(builtin()) else {
        return;
    };
    renderer.load_image(&QUAD, 2, 2).unwrap();
    renderer.render_now(&chain(&[("bloom", 0.5)])).unwrap();
    let keys = renderer.target_keys();
    assert!(keys.iter().any(|key| key == "bloom_bright"));
    assert!(keys.iter().any(|key| key == "bloom_blur_v"));

    let strip = [10, 20, 30, 255, 40, 50, 60, 255, 70, 80, 90, 255];
    renderer.load_image(&strip, 3, 1).unwrap();
    assert_eq!(renderer.target_dimensions(), Some((3, 1)));
    assert_eq!(renderer.target_keys(), ["A", "B", "source"]);
    assert_eq!(renderer.render_now(&EffectChain::new()).unwrap().rgba, strip);

    let bloomed = renderer.render_now(&chain(&[("bloom", 0.5)])).unwrap();
    assert_eq!((bloomed.width, bloomed.height), (3, 1));
}

#[test]
fn rejected_image_keeps_previous_state() {
    let Some(mut renderer) = headless(builtin()) else {
        return;
    };
    renderer.load_image(&QUAD, 2, 2).unwrap();

    let err = renderer.load_image(&[], 0, 4).unwrap_err();
    assert!(matches!(
        err,
        RenderError::ImageLoad(ImageLoadError::EmptyImage { width: 0, height: 4 })
    ));
    let err = renderer.load_image(&QUAD[..12], 2, 2).unwrap_err();
    assert!(matches!(
        err,
        RenderError::ImageLoad(ImageLoadError::PixelLengthMismatch {
            expected: 16,
            actual: 12
        })
    ));
    let too_wide = renderer.max_image_dimension() + 1;
    let err = renderer.load_image(&[], too_wide, 1).unwrap_err();
    assert!(matches!(
        err,
        RenderError::ImageLoad(ImageLoadError::DimensionTooLarge { .. })
    ));

    assert_eq!(renderer.target_dimensions(), Some((2, 2)));
    assert_eq!(renderer.render_now(&EffectChain::new()).unwrap().rgba, QUAD);
}

#[test]
fn rendering_before_load_is_an_error() {
    let Some(mut renderer) = headless(builtin()) else {
        return;
    };
    assert!(renderer.target_keys().is_empty());
    assert!(matches!(
        renderer.render_now(&EffectChain::new()),
        Err(RenderError::NoImageLoaded)
    ));
}

#[test]
fn export_matches_render_now_and_cpu_reference() {
    let Some(mut renderer) = headless(builtin()) else {
        return;
    };
    renderer.load_image(&QUAD, 2, 2).unwrap();
    let chain = chain(&[("brightness", 1.5), ("grayscale", 0.5)]);

    let png = renderer.export_frame(&chain).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.png");
    std::fs::write(&path, &png).unwrap();
    let exported = image::open(&path).unwrap().to_rgba8();
    assert_eq!(exported.dimensions(), (2, 2));

    let pixels = renderer.render_now(&chain).unwrap();
    assert_eq!(exported.as_raw(), &pixels.rgba);
    assert_close(&pixels.rgba, &brightness_then_grayscale(&QUAD, 1.5, 0.5), 1);
}

#[test]
fn unknown_effects_are_skipped() {
    let Some(mut renderer) = headless(builtin()) else {
        return;
    };
    renderer.load_image(&QUAD, 2, 2).unwrap();
    let mut entries = EffectChain::new();
    entries.push(AppliedEffect::new("does-not-exist"));
    entries.push(AppliedEffect::new("invert").with_param("amount", 1.0));

    let (pixels, report) = renderer.render_with_report(&entries).unwrap();
    assert_eq!(
        report.diagnostics,
        [PassDiagnostic::UnknownEffectId {
            position: 0,
            effect: "does-not-exist".into()
        }]
    );
    assert_eq!(report.final_key, "A");
    assert_close(&pixels.pixel(0, 0), &[0, 255, 255, 255], 1);
}

#[test]
fn missing_inputs_bind_a_zero_texture() {
    let Some(mut renderer) = headless(test_catalog()) else {
        return;
    };
    renderer.load_image(&QUAD, 2, 2).unwrap();
    let (pixels, report) = renderer
        .render_with_report(&[AppliedEffect::new("masked")].into_iter().collect())
        .unwrap();
    assert_eq!(
        report.diagnostics,
        [PassDiagnostic::MissingInputTexture {
            effect: "masked".into(),
            pass: 0,
            uniform: "u_mask".into(),
            key: "never_written".into()
        }]
    );
    assert_close(&pixels.rgba, &QUAD, 1);
}

#[test]
fn compile_failures_are_reported_once_and_skipped() {
    let Some(mut renderer) = headless(test_catalog()) else {
        return;
    };
    renderer.load_image(&QUAD, 2, 2).unwrap();
    let entries: EffectChain = [AppliedEffect::new("broken"), AppliedEffect::new("copy-a")]
        .into_iter()
        .collect();

    for _ in 0..2 {
        let (_, report) = renderer.render_with_report(&entries).unwrap();
        assert_eq!(report.draws, 1);
        assert!(matches!(
            report.diagnostics.as_slice(),
            [PassDiagnostic::ProgramCompileFailure { effect, pass: 0, .. }] if effect == "broken"
        ));
    }
    assert_eq!(renderer.failed_program_count(), 1);
    assert_eq!(renderer.program_count(), 1);
}

#[test]
fn skipped_passes_leave_their_target_untouched() {
    let Some(mut renderer) = headless(test_catalog()) else {
        return;
    };
    renderer.load_image(&QUAD, 2, 2).unwrap();
    let (scaled, report) = renderer
        .render_with_report(&chain(&[("copy-a", 0.5)]))
        .unwrap();
    assert_eq!(report.final_key, "A");
    assert_ne!(scaled.rgba, QUAD);

    let broken: EffectChain = [AppliedEffect::new("broken")].into_iter().collect();
    let (stale, report) = renderer.render_with_report(&broken).unwrap();
    assert_eq!(report.final_key, "A");
    assert_eq!(report.draws, 0);
    assert_eq!(stale.rgba, scaled.rgba);
}

#[test]
fn environment_uniforms_reach_the_shader() {
    let config = RendererConfig {
        pointer: Pointer::new(0.25, 1.0),
        policy: RenderPolicy::Still { time: 5.0 },
        ..RendererConfig::default()
    };
    let Some(mut renderer) = headless_with(test_catalog(), config) else {
        return;
    };
    renderer.load_image(&QUAD, 2, 2).unwrap();
    let entries: EffectChain = [AppliedEffect::new("environment")].into_iter().collect();
    let (pixels, report) = renderer.render_with_report(&entries).unwrap();
    assert_eq!(report.time, 5.0);
    assert_close(&pixels.pixel(1, 0), &[64, 255, 128, 128], 1);

    renderer.set_pointer(1.0, 0.0);
    let pixels = renderer.render_now(&entries).unwrap();
    assert_close(&pixels.pixel(0, 1), &[255, 0, 128, 128], 1);
}
