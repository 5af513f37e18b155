//! GPU side of the renderer.
//!
//! - `context` owns the wgpu instance, adapter, device and queue, and creates
//!   window surfaces on request.
//! - `programs` compiles synthesized fragment programs into render pipelines
//!   and memoizes them by [`crate::ProgramDescriptor`].
//! - `targets` holds every render target of the loaded image keyed by name,
//!   plus the shared sampler and the zero texture bound for missing inputs.
//! - `uniforms` packs the per-pass uniform block.
//! - `executor` records a planned chain into a command encoder.
//! - `present` blits the final target onto a window surface.
//! - `readback` copies a target into host memory for export.

mod context;
mod executor;
mod present;
mod programs;
mod readback;
mod targets;
mod uniforms;

pub(crate) use context::GpuContext;
pub(crate) use executor::encode_chain;
pub(crate) use present::Presenter;
pub use programs::{CompileFailure, ProgramCache};
pub(crate) use programs::ProgramLibrary;
pub(crate) use readback::PendingReadback;
pub(crate) use targets::ResourceTable;
pub(crate) use uniforms::EnvUniforms;
