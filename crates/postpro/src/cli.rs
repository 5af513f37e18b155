use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use renderer::GpuPowerPreference;

#[derive(Parser, Debug)]
#[command(
    name = "postpro",
    author,
    version,
    about = "Apply chains of GPU shader effects to still images"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render the chain headlessly and write the result as PNG.
    Export(ExportArgs),
    /// Show the chain applied to the image in an interactive window.
    Preview(PreviewArgs),
    /// List the effects of the catalog grouped by category.
    Effects(EffectsArgs),
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Destination PNG file.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Largest initial window edge in pixels.
    #[arg(long, value_name = "PIXELS", default_value_t = 1280)]
    pub max_window: u32,
}

#[derive(Args, Debug)]
pub struct EffectsArgs {
    /// Effect catalog TOML file; defaults to the built-in catalog.
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
}

/// Inputs shared by every command that renders a chain.
#[derive(Args, Debug)]
pub struct ChainArgs {
    /// Image to process (PNG, JPEG, BMP, or GIF).
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Session TOML providing the chain, time, and pointer.
    #[arg(long, value_name = "FILE")]
    pub session: Option<PathBuf>,

    /// Effect to append, as `id` or `id:param=value,param=value`. Repeatable;
    /// an id already in the chain only has its parameters updated.
    #[arg(long = "effect", value_name = "SPEC", value_parser = parse_effect_spec)]
    pub effects: Vec<EffectSpec>,

    /// Evaluate the chain at this time in seconds. Without it, export uses the
    /// session time (or 0) and preview animates with the clock.
    #[arg(long, value_name = "SECONDS", value_parser = parse_time)]
    pub time: Option<f32>,

    /// Normalized pointer position, origin bottom-left (e.g. `0.25,0.75`).
    #[arg(long, value_name = "X,Y", value_parser = parse_pointer)]
    pub pointer: Option<(f32, f32)>,

    /// Effect catalog TOML file; defaults to the built-in catalog.
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Adapter power preference: `low` or `high`.
    #[arg(long, value_name = "MODE", value_parser = parse_power, default_value = "low")]
    pub gpu_power: GpuPowerPreference,

    /// Allow a software adapter when no hardware GPU is available.
    #[arg(long)]
    pub software: bool,
}

/// One `--effect` flag.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSpec {
    pub id: String,
    pub params: Vec<(String, f32)>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_effect_spec(value: &str) -> Result<EffectSpec, String> {
    let trimmed = value.trim();
    let (id, params) = match trimmed.split_once(':') {
        Some((id, params)) => (id.trim(), params.trim()),
        None => (trimmed, ""),
    };
    if id.is_empty() {
        return Err("effect id must not be empty".to_string());
    }

    let mut parsed = Vec::new();
    for assignment in params.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, raw) = assignment
            .split_once('=')
            .ok_or_else(|| format!("expected param=value, got '{assignment}'"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("missing parameter name in '{assignment}'"));
        }
        let number: f32 = raw
            .trim()
            .parse()
            .map_err(|_| format!("invalid value for parameter '{name}': '{}'", raw.trim()))?;
        if !number.is_finite() {
            return Err(format!("parameter '{name}' must be finite"));
        }
        parsed.push((name.to_string(), number));
    }

    Ok(EffectSpec {
        id: id.to_string(),
        params: parsed,
    })
}

pub fn parse_pointer(value: &str) -> Result<(f32, f32), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| "expected X,Y, e.g. 0.5,0.5".to_string())?;
    let coordinate = |raw: &str, axis: &str| -> Result<f32, String> {
        let parsed: f32 = raw
            .trim()
            .parse()
            .map_err(|_| format!("invalid pointer {axis} '{}'", raw.trim()))?;
        if !(0.0..=1.0).contains(&parsed) {
            return Err(format!("pointer {axis} must be within 0..=1"));
        }
        Ok(parsed)
    };
    Ok((coordinate(x, "x")?, coordinate(y, "y")?))
}

pub fn parse_time(value: &str) -> Result<f32, String> {
    let parsed: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid time '{}'", value.trim()))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err("time must be a non-negative number of seconds".to_string());
    }
    Ok(parsed)
}

pub fn parse_power(value: &str) -> Result<GpuPowerPreference, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low-power" | "integrated" => Ok(GpuPowerPreference::Low),
        "high" | "high-performance" | "discrete" => Ok(GpuPowerPreference::High),
        other => Err(format!("unknown power preference '{other}'; expected low or high")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_spec_without_params() {
        assert_eq!(
            parse_effect_spec(" invert ").unwrap(),
            EffectSpec {
                id: "invert".into(),
                params: vec![]
            }
        );
    }

    #[test]
    fn effect_spec_with_params() {
        let spec = parse_effect_spec("bloom:threshold=0.6, amount = 1.25").unwrap();
        assert_eq!(spec.id, "bloom");
        assert_eq!(
            spec.params,
            [("threshold".to_string(), 0.6), ("amount".to_string(), 1.25)]
        );
        assert!(parse_effect_spec("blur:").unwrap().params.is_empty());
    }

    #[test]
    fn malformed_effect_specs_are_rejected() {
        assert!(parse_effect_spec(":amount=1").is_err());
        assert!(parse_effect_spec("blur:radius").is_err());
        assert!(parse_effect_spec("blur:=2").is_err());
        assert!(parse_effect_spec("blur:radius=wide").is_err());
        assert!(parse_effect_spec("blur:radius=inf").is_err());
    }

    #[test]
    fn pointer_must_be_normalized() {
        assert_eq!(parse_pointer("0.25, 0.75").unwrap(), (0.25, 0.75));
        assert!(parse_pointer("0.5").is_err());
        assert!(parse_pointer("1.5,0.5").is_err());
        assert!(parse_pointer("0.5,y").is_err());
    }

    #[test]
    fn time_and_power_values() {
        assert_eq!(parse_time("2.5").unwrap(), 2.5);
        assert!(parse_time("-1").is_err());
        assert_eq!(parse_power("HIGH").unwrap(), GpuPowerPreference::High);
        assert!(parse_power("turbo").is_err());
    }

    #[test]
    fn cli_accepts_repeated_effects() {
        let cli = Cli::try_parse_from([
            "postpro",
            "export",
            "in.png",
            "--effect",
            "brightness:amount=1.5",
            "--effect",
            "grayscale",
            "-o",
            "out.png",
        ])
        .unwrap();
        let Command::Export(args) = cli.command else {
            panic!("expected export command");
        };
        assert_eq!(args.chain.effects.len(), 2);
        assert_eq!(args.output, PathBuf::from("out.png"));
        assert_eq!(args.chain.gpu_power, GpuPowerPreference::Low);
    }
}
