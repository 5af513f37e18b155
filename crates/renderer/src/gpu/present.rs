use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::compile::present_descriptor;
use crate::error::RenderError;

use super::programs::{ProgramLibrary, ShaderProgram};
use super::targets::ResourceTable;

/// Owns the window surface and the blit pipeline that copies a render target
/// onto it.
pub(crate) struct Presenter {
    // Dropped before `window`.
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    program: Arc<ShaderProgram>,
    pipeline: wgpu::RenderPipeline,
    window: Arc<Window>,
}

impl Presenter {
    pub fn new(
        device: &wgpu::Device,
        adapter: &wgpu::Adapter,
        surface: wgpu::Surface<'static>,
        window: Arc<Window>,
        programs: &mut ProgramLibrary,
    ) -> Result<Self, RenderError> {
        let caps = surface.get_capabilities(adapter);
        // Target bytes are already display-encoded, so prefer a linear format
        // that passes them through unchanged.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(RenderError::UnsupportedSurface)?;
        let present_mode = caps
            .present_modes
            .first()
            .copied()
            .unwrap_or(wgpu::PresentMode::Fifo);
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(device, &config);

        let program = programs
            .get(device, &present_descriptor())
            .map_err(|failure| RenderError::PresentProgram(failure.message))?;
        let pipeline = program.pipeline_for(device, programs.vertex(), format);
        tracing::debug!(
            ?format,
            ?present_mode,
            width = config.width,
            height = config.height,
            "configured presentation surface"
        );

        Ok(Self {
            surface,
            config,
            program,
            pipeline,
            window,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigures the surface. Zero-sized requests are ignored.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(device, &self.config);
    }

    /// Acquires the next surface texture, reconfiguring once when the surface
    /// went stale.
    pub fn acquire(&mut self, device: &wgpu::Device) -> Result<wgpu::SurfaceTexture, RenderError> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated; reconfiguring");
                self.surface.configure(device, &self.config);
                Ok(self.surface.get_current_texture()?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Records a blit of target `key` onto `frame`.
    pub fn encode_blit(
        &self,
        device: &wgpu::Device,
        programs: &ProgramLibrary,
        table: &ResourceTable,
        key: &str,
        frame: &wgpu::SurfaceTexture,
        encoder: &mut wgpu::CommandEncoder,
    ) {
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let source = table.get(key).unwrap_or_else(|| table.zero());

        let texture_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("present texture bind group"),
            layout: &self.program.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Sampler(table.sampler()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
            ],
        });
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("present uniforms"),
            contents: &vec![0u8; self.program.uniform_size as usize],
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("present uniform bind group"),
            layout: programs.uniform_layout(),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("present pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &uniform_group, &[]);
        render_pass.set_bind_group(1, &texture_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}
