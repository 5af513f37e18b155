//! Multi-pass GPU post-processing for still images.
//!
//! A [`Renderer`] owns one GPU device, the loaded image, and every render
//! target derived from it. Callers hand it an [`EffectChain`] built against a
//! [`Catalog`]; the chain is planned into passes, each pass is drawn with a
//! program synthesized from its catalog entry, and the result is either
//! presented on a window surface or read back as pixels.
//!
//! ```text
//!   apply_chain ──▶ FrameScheduler ──▶ on_refresh ──┐
//!                                                   ├─▶ plan_chain ─▶ encode_chain ─▶ submit
//!   render_now / export_frame ──────────────────────┘                    │
//!                                                            present ◀───┴───▶ readback
//! ```
//!
//! Interactive requests are coalesced: only the latest chain requested before
//! a refresh is drawn. Synchronous renders bypass the queue and leave any
//! pending request untouched.

mod compile;
mod error;
mod gpu;
mod plan;
pub mod runtime;
mod types;
mod window;

use std::sync::Arc;
use std::time::Instant;

use catalog::{Catalog, EffectChain};
use image::imageops::flip_vertical_in_place;
use scheduler::{FrameScheduler, SchedulerStats, Ticket};
use tracing::{debug, info, trace, warn};
use winit::window::Window;

use crate::gpu::{
    encode_chain, EnvUniforms, GpuContext, PendingReadback, Presenter, ProgramLibrary,
    ResourceTable,
};
use crate::runtime::{time_source_for_policy, BoxedTimeSource, RenderPolicy};

pub use compile::{check_fragment, synthesize_fragment, ProgramDescriptor};
pub use error::{ImageLoadError, ReadbackFailure, RenderError};
pub use gpu::{CompileFailure, ProgramCache};
pub use plan::{plan_chain, ChainPlan, PlannedPass};
pub use types::{
    FrameReport, GpuPowerPreference, PassDiagnostic, PixelBuffer, Pointer, RenderStats,
    RendererConfig, ACCUM_A, ACCUM_B, SOURCE_TARGET,
};
pub use window::{fit_window, run_preview, PreviewOptions};

/// Completion hook invoked after every interactive frame.
pub type RenderCallback = Box<dyn FnMut(&FrameReport)>;

pub struct Renderer {
    presenter: Option<Presenter>,
    programs: ProgramLibrary,
    targets: ResourceTable,
    gpu: GpuContext,
    catalog: Catalog,
    scheduler: FrameScheduler<EffectChain>,
    pointer: Pointer,
    time_source: BoxedTimeSource,
    stats: RenderStats,
    on_render: Option<RenderCallback>,
}

impl Renderer {
    /// Creates a renderer without a presentation surface. Only the
    /// synchronous paths produce visible output.
    pub fn headless(catalog: Catalog, config: &RendererConfig) -> Result<Self, RenderError> {
        let instance = GpuContext::create_instance();
        let gpu = GpuContext::new(&instance, config.power, config.allow_software, None)?;
        Ok(Self::from_context(gpu, catalog, config))
    }

    /// Creates a renderer presenting onto `window`.
    pub fn windowed(
        catalog: Catalog,
        config: &RendererConfig,
        window: Arc<Window>,
    ) -> Result<Self, RenderError> {
        let instance = GpuContext::create_instance();
        // SAFETY: the presenter stores `window` and drops the surface first.
        let surface = unsafe { GpuContext::create_surface(&instance, window.as_ref())? };
        let gpu = GpuContext::new(&instance, config.power, config.allow_software, Some(&surface))?;
        let mut renderer = Self::from_context(gpu, catalog, config);
        let presenter = Presenter::new(
            &renderer.gpu.device,
            &renderer.gpu.adapter,
            surface,
            window,
            &mut renderer.programs,
        )?;
        renderer.presenter = Some(presenter);
        Ok(renderer)
    }

    fn from_context(gpu: GpuContext, catalog: Catalog, config: &RendererConfig) -> Self {
        let programs = ProgramLibrary::new(&gpu.device);
        let targets = ResourceTable::new(&gpu.device, &gpu.queue);
        Self {
            presenter: None,
            programs,
            targets,
            gpu,
            catalog,
            scheduler: FrameScheduler::new(),
            pointer: config.pointer,
            time_source: time_source_for_policy(&config.policy),
            stats: RenderStats::default(),
            on_render: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.gpu.adapter.get_info()
    }

    /// Largest width or height accepted by [`Renderer::load_image`].
    pub fn max_image_dimension(&self) -> u32 {
        self.gpu.max_texture_dimension
    }

    /// Replaces the current image. `rgba` holds tightly packed RGBA8 rows,
    /// top row first.
    ///
    /// On success every render target is recreated at the new size and the
    /// unmodified image is queued for presentation. A rejected image leaves
    /// the previous one and all targets in place.
    pub fn load_image(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(ImageLoadError::EmptyImage { width, height }.into());
        }
        let limit = self.gpu.max_texture_dimension;
        if width > limit || height > limit {
            return Err(ImageLoadError::DimensionTooLarge {
                width,
                height,
                limit,
            }
            .into());
        }
        let expected = width as usize * height as usize * 4;
        let mismatch = ImageLoadError::PixelLengthMismatch {
            expected,
            actual: rgba.len(),
        };
        if rgba.len() != expected {
            return Err(mismatch.into());
        }
        let mut image = image::RgbaImage::from_raw(width, height, rgba.to_vec()).ok_or(mismatch)?;
        flip_vertical_in_place(&mut image);

        self.targets.reset(&self.gpu.device, width, height);
        self.targets.upload_source(&self.gpu.queue, image.as_raw());
        info!(width, height, "loaded image");
        self.request_render(EffectChain::new());
        Ok(())
    }

    /// Queues `chain` for the next refresh, replacing any request that has
    /// not been drawn yet.
    pub fn request_render(&mut self, chain: EffectChain) -> Ticket {
        let outcome = self.scheduler.request(chain, Instant::now());
        if let Some(presenter) = &self.presenter {
            presenter.window().request_redraw();
        }
        outcome.ticket
    }

    pub fn apply_chain(&mut self, chain: &EffectChain) -> Ticket {
        self.request_render(chain.clone())
    }

    /// Drops the pending request, if any. Returns whether one was pending.
    pub fn cancel_pending(&mut self) -> bool {
        self.scheduler.cancel().is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn set_render_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&FrameReport) + 'static,
    {
        self.on_render = Some(Box::new(callback));
    }

    /// Draws the pending request, if any, evaluated at `timestamp` seconds.
    ///
    /// With a surface the result is presented in the same submission.
    pub fn on_refresh(&mut self, timestamp: f32) -> Result<Option<FrameReport>, RenderError> {
        let Some(frame) = self.scheduler.take_due() else {
            return Ok(None);
        };
        if self.targets.dimensions().is_none() {
            debug!(ticket = frame.ticket.0, "dropping frame requested before an image was loaded");
            return Err(RenderError::NoImageLoaded);
        }

        let surface_frame = match self.presenter.as_mut() {
            Some(presenter) => Some(presenter.acquire(&self.gpu.device)?),
            None => None,
        };
        let mut encoder = self.create_encoder("interactive frame");
        let report = self.encode_frame(&frame.payload, timestamp, &mut encoder)?;
        if let (Some(presenter), Some(surface_frame)) = (&self.presenter, &surface_frame) {
            presenter.encode_blit(
                &self.gpu.device,
                &self.programs,
                &self.targets,
                &report.final_key,
                surface_frame,
                &mut encoder,
            );
        }
        self.submit(encoder, &report);
        if let Some(surface_frame) = surface_frame {
            surface_frame.present();
            self.stats.frames_presented += 1;
        }
        trace!(
            ticket = frame.ticket.0,
            latency_ms = frame.requested_at.elapsed().as_millis() as u64,
            draws = report.draws,
            "frame executed"
        );

        if let Some(callback) = self.on_render.as_mut() {
            callback(&report);
        }
        Ok(Some(report))
    }

    /// Renders `chain` immediately and reads the result back. Pending
    /// interactive requests are left untouched.
    pub fn render_now(&mut self, chain: &EffectChain) -> Result<PixelBuffer, RenderError> {
        self.render_with_report(chain).map(|(pixels, _)| pixels)
    }

    /// Like [`Renderer::render_now`], also returning the frame report.
    pub fn render_with_report(
        &mut self,
        chain: &EffectChain,
    ) -> Result<(PixelBuffer, FrameReport), RenderError> {
        let (width, height) = self.targets.dimensions().ok_or(RenderError::NoImageLoaded)?;
        let time = self.time_source.sample();
        let mut encoder = self.create_encoder("synchronous frame");
        let report = self.encode_frame(chain, time, &mut encoder)?;
        let target = self
            .targets
            .get(&report.final_key)
            .ok_or(RenderError::NoImageLoaded)?;
        let readback =
            PendingReadback::record(&self.gpu.device, &mut encoder, &target.texture, width, height);
        self.submit(encoder, &report);
        let pixels = readback.finish(&self.gpu.device)?;
        Ok((pixels, report))
    }

    /// Renders `chain` synchronously and encodes the result as PNG.
    pub fn export_frame(&mut self, chain: &EffectChain) -> Result<Vec<u8>, RenderError> {
        self.render_now(chain)?.encode_png()
    }

    /// Reads back the current contents of target `key` without drawing.
    pub fn read_target(&mut self, key: &str) -> Result<Option<PixelBuffer>, RenderError> {
        let Some((width, height)) = self.targets.dimensions() else {
            return Err(RenderError::NoImageLoaded);
        };
        let Some(target) = self.targets.get(key) else {
            return Ok(None);
        };
        let mut encoder = self.create_encoder("target readback");
        let readback =
            PendingReadback::record(&self.gpu.device, &mut encoder, &target.texture, width, height);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        readback.finish(&self.gpu.device).map(Some)
    }

    pub fn pointer(&self) -> Pointer {
        self.pointer
    }

    /// Updates the pointer uniforms used by subsequent frames. Coordinates are
    /// normalized with the origin at the bottom-left.
    pub fn set_pointer(&mut self, x: f32, y: f32) {
        self.pointer = Pointer::new(x, y);
    }

    /// Replaces the time source sampled by synchronous renders.
    pub fn set_policy(&mut self, policy: &RenderPolicy) {
        self.time_source = time_source_for_policy(policy);
    }

    /// Reconfigures the presentation surface. Render targets keep the image
    /// size.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if let Some(presenter) = self.presenter.as_mut() {
            presenter.resize(&self.gpu.device, width, height);
        }
    }

    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.presenter.as_ref().map(Presenter::size)
    }

    pub fn target_keys(&self) -> Vec<String> {
        self.targets.keys()
    }

    pub fn target_dimensions(&self) -> Option<(u32, u32)> {
        self.targets.dimensions()
    }

    /// Number of distinct compiled programs, including the presentation blit
    /// when a surface exists.
    pub fn program_count(&self) -> usize {
        self.programs.cache().len()
    }

    pub fn failed_program_count(&self) -> usize {
        self.programs.cache().failed_len()
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn encode_frame(
        &mut self,
        chain: &EffectChain,
        time: f32,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<FrameReport, RenderError> {
        let size = self.targets.dimensions().ok_or(RenderError::NoImageLoaded)?;
        let plan = plan_chain(&self.catalog, chain);
        for diagnostic in &plan.diagnostics {
            warn!(%diagnostic, "skipping chain entry");
        }
        let env = EnvUniforms::new(size, time, self.pointer);
        let outcome = encode_chain(
            &self.gpu.device,
            &mut self.programs,
            &mut self.targets,
            &plan,
            &env,
            encoder,
        );

        let mut diagnostics = plan.diagnostics;
        diagnostics.extend(outcome.diagnostics);
        Ok(FrameReport {
            final_key: plan.final_key,
            draws: outcome.draws,
            time,
            diagnostics,
        })
    }

    fn submit(&mut self, encoder: wgpu::CommandEncoder, report: &FrameReport) {
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        self.stats.submissions += 1;
        self.stats.draws += u64::from(report.draws);
    }
}
