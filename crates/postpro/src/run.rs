//! Command implementations.
//!
//! - `initialise_tracing` configures logging.
//! - `resolve_chain` merges a session file with `--effect` flags.
//! - `export`, `preview`, and `list_effects` back the subcommands.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use catalog::{Catalog, EffectChain, Session};
use renderer::runtime::RenderPolicy;
use renderer::{run_preview, Pointer, PreviewOptions, Renderer, RendererConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::{ChainArgs, EffectSpec, EffectsArgs, ExportArgs, PreviewArgs};

pub fn initialise_tracing() {
    let default_filter = "warn,postpro=info,renderer=info,catalog=info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error,winit=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Chain plus environment inputs resolved from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChain {
    pub chain: EffectChain,
    pub time: Option<f32>,
    pub pointer: Pointer,
}

pub fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("failed to load effect catalog {}", path.display())),
        None => Catalog::builtin().context("built-in effect catalog is invalid"),
    }
}

/// Builds the chain from the optional session, then applies `--effect` flags
/// in order. Flags append unknown-to-the-chain effects seeded with initial
/// values and override parameters of effects already present. Flags win over
/// the session for time and pointer.
pub fn resolve_chain(
    catalog: &Catalog,
    session: Option<&Session>,
    specs: &[EffectSpec],
    time: Option<f32>,
    pointer: Option<(f32, f32)>,
) -> Result<ResolvedChain> {
    let mut chain = session
        .map(|session| session.chain(catalog))
        .unwrap_or_default();

    for spec in specs {
        if catalog.get(&spec.id).is_none() {
            bail!("unknown effect '{}' (see `postpro effects`)", spec.id);
        }
        chain
            .add(catalog, &spec.id)
            .with_context(|| format!("failed to add effect '{}'", spec.id))?;
        for (param, value) in &spec.params {
            let stored = chain
                .set_param(catalog, &spec.id, param, *value)
                .with_context(|| format!("invalid --effect {}", spec.id))?;
            if stored != *value {
                tracing::warn!(
                    effect = %spec.id,
                    param = %param,
                    requested = value,
                    stored,
                    "parameter clamped to catalog bounds"
                );
            }
        }
    }

    let time = time.or_else(|| session.and_then(|session| session.time));
    let pointer = pointer
        .or_else(|| session.and_then(|s| s.pointer).map(|p| (p.x, p.y)))
        .map(|(x, y)| Pointer::new(x, y))
        .unwrap_or_default();
    Ok(ResolvedChain {
        chain,
        time,
        pointer,
    })
}

fn prepare(args: &ChainArgs) -> Result<(Catalog, ResolvedChain, image::RgbaImage)> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    let session = args
        .session
        .as_deref()
        .map(|path| {
            Session::load(path).with_context(|| format!("failed to load session {}", path.display()))
        })
        .transpose()?;
    let resolved = resolve_chain(
        &catalog,
        session.as_ref(),
        &args.effects,
        args.time,
        args.pointer,
    )?;
    let image = image::open(&args.image)
        .with_context(|| format!("failed to read image {}", args.image.display()))?
        .to_rgba8();
    tracing::info!(
        image = %args.image.display(),
        width = image.width(),
        height = image.height(),
        effects = resolved.chain.len(),
        "prepared chain"
    );
    Ok((catalog, resolved, image))
}

fn renderer_config(args: &ChainArgs, resolved: &ResolvedChain, policy: RenderPolicy) -> RendererConfig {
    RendererConfig {
        power: args.gpu_power,
        pointer: resolved.pointer,
        policy,
        allow_software: args.software,
    }
}

pub fn export(args: ExportArgs) -> Result<()> {
    let (catalog, resolved, image) = prepare(&args.chain)?;
    let policy = RenderPolicy::Still {
        time: resolved.time.unwrap_or(0.0),
    };
    let config = renderer_config(&args.chain, &resolved, policy);

    let mut renderer =
        Renderer::headless(catalog, &config).context("failed to initialise headless renderer")?;
    let adapter = renderer.adapter_info();
    tracing::debug!(adapter = %adapter.name, backend = ?adapter.backend, "export adapter");
    renderer
        .load_image(image.as_raw(), image.width(), image.height())
        .context("failed to upload image")?;
    let png = renderer
        .export_frame(&resolved.chain)
        .context("failed to render chain")?;
    fs::write(&args.output, png)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    let stats = renderer.stats();
    tracing::info!(
        output = %args.output.display(),
        draws = stats.draws,
        programs = renderer.program_count(),
        "export complete"
    );
    Ok(())
}

pub fn preview(args: PreviewArgs) -> Result<()> {
    let (catalog, resolved, image) = prepare(&args.chain)?;
    let policy = match resolved.time {
        Some(time) => RenderPolicy::Still { time },
        None => RenderPolicy::Animate,
    };
    let config = renderer_config(&args.chain, &resolved, policy);
    let title = match args.chain.image.file_name() {
        Some(name) => format!("postpro - {}", name.to_string_lossy()),
        None => "postpro".to_string(),
    };
    let options = PreviewOptions {
        title,
        max_edge: args.max_window.max(1),
    };
    run_preview(catalog, &config, &image, resolved.chain, &options)
}

pub fn list_effects(args: EffectsArgs) -> Result<()> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    print!("{}", render_listing(&catalog));
    Ok(())
}

/// Human-readable catalog listing grouped by category.
pub fn render_listing(catalog: &Catalog) -> String {
    let mut out = String::new();
    for category in catalog.categories() {
        let _ = writeln!(out, "{category}");
        for effect in catalog.in_category(category) {
            let passes = effect.passes.len();
            let _ = writeln!(
                out,
                "  {:<24} {} ({passes} pass{})",
                effect.id,
                effect.name,
                if passes == 1 { "" } else { "es" }
            );
            for param in &effect.params {
                let _ = writeln!(
                    out,
                    "      {:<14} {} .. {} step {} (default {}{})",
                    param.id,
                    param.min,
                    param.max,
                    param.step,
                    param.initial_value,
                    if param.unit.is_empty() {
                        String::new()
                    } else {
                        format!(" {}", param.unit)
                    }
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parse_effect_spec;

    fn specs(values: &[&str]) -> Vec<EffectSpec> {
        values
            .iter()
            .map(|value| parse_effect_spec(value).unwrap())
            .collect()
    }

    #[test]
    fn effect_flags_build_a_chain_in_order() {
        let catalog = Catalog::builtin().unwrap();
        let resolved = resolve_chain(
            &catalog,
            None,
            &specs(&["brightness:amount=1.5", "grayscale"]),
            None,
            None,
        )
        .unwrap();
        let ids: Vec<&str> = resolved.chain.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["brightness", "grayscale"]);
        let first = resolved.chain.iter().next().unwrap();
        assert_eq!(first.params["amount"], 1.5);
        let second = resolved.chain.iter().nth(1).unwrap();
        assert_eq!(second.params["amount"], 0.5);
        assert_eq!(resolved.time, None);
        assert_eq!(resolved.pointer, Pointer::default());
    }

    #[test]
    fn flags_override_session_entries_and_environment() {
        let catalog = Catalog::builtin().unwrap();
        let session = Session::from_toml_str(
            r#"
time = 3.0

[pointer]
x = 0.1
y = 0.2

[[effects]]
id = "invert"
params = { amount = 1.0 }
"#,
        )
        .unwrap();

        let resolved = resolve_chain(
            &catalog,
            Some(&session),
            &specs(&["invert:amount=0.25", "brightness:amount=9"]),
            None,
            Some((0.75, 0.5)),
        )
        .unwrap();
        assert_eq!(resolved.chain.len(), 2);
        assert_eq!(resolved.chain.iter().next().unwrap().params["amount"], 0.25);
        assert_eq!(resolved.chain.iter().nth(1).unwrap().params["amount"], 2.0);
        assert_eq!(resolved.time, Some(3.0));
        assert_eq!(resolved.pointer, Pointer::new(0.75, 0.5));
    }

    #[test]
    fn unknown_flags_are_errors() {
        let catalog = Catalog::builtin().unwrap();
        let err = resolve_chain(&catalog, None, &specs(&["nope"]), None, None).unwrap_err();
        assert!(err.to_string().contains("unknown effect 'nope'"));
        let err = resolve_chain(&catalog, None, &specs(&["blur:width=2"]), None, None)
            .unwrap_err();
        assert!(format!("{err:#}").contains("width"));
    }

    #[test]
    fn listing_groups_effects_by_category() {
        let catalog = Catalog::builtin().unwrap();
        let listing = render_listing(&catalog);
        assert!(listing.starts_with("Color & Tone\n"));
        assert!(listing.contains("  brightness"));
        assert!(listing.contains("bloom"));
        assert!(listing.contains("(4 passes)"));
    }
}
