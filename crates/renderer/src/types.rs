use std::fmt;
use std::io::Cursor;

use crate::error::RenderError;
use crate::runtime::RenderPolicy;

/// Target holding the loaded image. Written once per load.
pub const SOURCE_TARGET: &str = "source";
/// First accumulation buffer.
pub const ACCUM_A: &str = "A";
/// Second accumulation buffer.
pub const ACCUM_B: &str = "B";

/// Power preference forwarded to adapter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

impl GpuPowerPreference {
    pub(crate) fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Normalized pointer position, origin bottom-left, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub x: f32,
    pub y: f32,
}

impl Pointer {
    pub fn new(x: f32, y: f32) -> Self {
        let clamp = |v: f32| if v.is_nan() { 0.5 } else { v.clamp(0.0, 1.0) };
        Self {
            x: clamp(x),
            y: clamp(y),
        }
    }
}

impl Default for Pointer {
    fn default() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone, Default)]
pub struct RendererConfig {
    /// Adapter power preference.
    pub power: GpuPowerPreference,
    /// Pointer position used until the caller reports movement.
    pub pointer: Pointer,
    /// Selects the time source sampled by synchronous renders.
    pub policy: RenderPolicy,
    /// Allow wgpu's software fallback adapter when no hardware adapter exists.
    pub allow_software: bool,
}

/// Non-fatal problem raised while executing a chain. The affected effect or
/// pass is skipped (or bound to a zero texture) and execution continues.
#[derive(Debug, Clone, PartialEq)]
pub enum PassDiagnostic {
    UnknownEffectId {
        position: usize,
        effect: String,
    },
    ProgramCompileFailure {
        effect: String,
        pass: usize,
        message: String,
    },
    MissingInputTexture {
        effect: String,
        pass: usize,
        uniform: String,
        key: String,
    },
    TargetAliasing {
        effect: String,
        pass: usize,
        key: String,
    },
}

impl fmt::Display for PassDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassDiagnostic::UnknownEffectId { position, effect } => {
                write!(f, "chain entry {position} references unknown effect '{effect}'")
            }
            PassDiagnostic::ProgramCompileFailure {
                effect,
                pass,
                message,
            } => write!(f, "effect '{effect}' pass {pass} failed to compile: {message}"),
            PassDiagnostic::MissingInputTexture {
                effect,
                pass,
                uniform,
                key,
            } => write!(
                f,
                "effect '{effect}' pass {pass} reads missing target '{key}' into '{uniform}'"
            ),
            PassDiagnostic::TargetAliasing { effect, pass, key } => write!(
                f,
                "effect '{effect}' pass {pass} reads target '{key}' while writing it"
            ),
        }
    }
}

/// Outcome of one chain execution.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Target holding the composited image.
    pub final_key: String,
    /// Draws recorded for the chain, excluding presentation.
    pub draws: u32,
    /// Time uniform the chain was evaluated at.
    pub time: f32,
    pub diagnostics: Vec<PassDiagnostic>,
}

/// Running GPU work counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Chain executions submitted to the queue.
    pub submissions: u64,
    /// Effect pass draws across all submissions.
    pub draws: u64,
    /// Frames handed to the presentation surface.
    pub frames_presented: u64,
}

/// Tightly packed RGBA8 pixels, first row at the top of the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl PixelBuffer {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * self.width + x) * 4) as usize;
        [
            self.rgba[offset],
            self.rgba[offset + 1],
            self.rgba[offset + 2],
            self.rgba[offset + 3],
        ]
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut bytes = Vec::new();
        image::write_buffer_with_format(
            &mut Cursor::new(&mut bytes),
            &self.rgba,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
            image::ImageFormat::Png,
        )?;
        Ok(bytes)
    }
}
