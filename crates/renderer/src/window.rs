use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use catalog::{Catalog, EffectChain};
use tracing::{debug, error, info, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::error::RenderError;
use crate::runtime::{time_source_for_policy, RenderPolicy};
use crate::types::RendererConfig;
use crate::Renderer;

/// Window parameters for [`run_preview`].
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub title: String,
    /// Largest initial window edge in physical pixels.
    pub max_edge: u32,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            title: "postpro preview".to_string(),
            max_edge: 1280,
        }
    }
}

/// Scales `width`x`height` down so neither edge exceeds `max_edge`, keeping
/// the aspect ratio. Images already within bounds are returned unchanged.
pub fn fit_window(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_edge || longest == 0 {
        return (width.max(1), height.max(1));
    }
    let scale = max_edge as f64 / longest as f64;
    let scaled = |edge: u32| ((edge as f64 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Opens an interactive window showing `chain` applied to `image`.
///
/// Pointer movement updates the pointer uniforms and requests a new frame;
/// requests are coalesced until the next redraw. Escape or closing the window
/// ends the preview.
pub fn run_preview(
    catalog: Catalog,
    config: &RendererConfig,
    image: &image::RgbaImage,
    chain: EffectChain,
    options: &PreviewOptions,
) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let (width, height) = fit_window(image.width(), image.height(), options.max_edge);
    let window = WindowBuilder::new()
        .with_title(options.title.as_str())
        .with_inner_size(PhysicalSize::new(width, height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut renderer = Renderer::windowed(catalog, config, window.clone())
        .context("failed to initialise preview renderer")?;
    let adapter = renderer.adapter_info();
    info!(adapter = %adapter.name, backend = ?adapter.backend, "preview renderer ready");
    renderer
        .load_image(image.as_raw(), image.width(), image.height())
        .context("failed to upload image")?;
    renderer.set_render_callback(|report| {
        for diagnostic in &report.diagnostics {
            debug!(%diagnostic, "frame diagnostic");
        }
    });
    renderer.apply_chain(&chain);

    let animate = matches!(config.policy, RenderPolicy::Animate);
    let mut clock = time_source_for_policy(&config.policy);
    let mut failure: Option<anyhow::Error> = None;

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && matches!(event.logical_key, Key::Named(NamedKey::Escape))
                {
                    elwt.exit();
                }
            }
            WindowEvent::Resized(size) => {
                renderer.resize_surface(size.width, size.height);
                renderer.apply_chain(&chain);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = normalized_pointer(position, window.inner_size());
                renderer.set_pointer(x, y);
                renderer.apply_chain(&chain);
            }
            WindowEvent::RedrawRequested => match renderer.on_refresh(clock.sample()) {
                Ok(_) => {}
                Err(RenderError::Surface(wgpu::SurfaceError::Timeout)) => {
                    warn!("surface timeout; retrying next frame");
                    renderer.apply_chain(&chain);
                }
                Err(err) => {
                    error!(error = %err, "preview frame failed");
                    failure = Some(err.into());
                    elwt.exit();
                }
            },
            _ => {}
        },
        Event::AboutToWait => {
            if animate && !renderer.has_pending() {
                renderer.apply_chain(&chain);
            }
            elwt.set_control_flow(ControlFlow::Wait);
        }
        _ => {}
    });

    if let Some(err) = failure {
        return Err(err);
    }
    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

/// Converts a cursor position to normalized coordinates with the origin at
/// the bottom-left of the window.
fn normalized_pointer(position: PhysicalPosition<f64>, size: PhysicalSize<u32>) -> (f32, f32) {
    let width = f64::from(size.width.max(1));
    let height = f64::from(size.height.max(1));
    (
        (position.x / width) as f32,
        (1.0 - position.y / height) as f32,
    )
}
