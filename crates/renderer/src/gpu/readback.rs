use std::sync::mpsc;

use crate::error::{ReadbackFailure, RenderError};
use crate::types::PixelBuffer;

fn align_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Records a copy of `texture` into a mappable staging buffer.
pub(crate) struct PendingReadback {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_bytes_per_row: u32,
}

impl PendingReadback {
    pub fn record(
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
        width: u32,
        height: u32,
    ) -> Self {
        let padded_bytes_per_row = align_bytes_per_row(width * 4);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback staging"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Self {
            buffer,
            width,
            height,
            padded_bytes_per_row,
        }
    }

    /// Waits for the submitted copy and returns top-row-first pixels. Targets
    /// hold the bottom row first, so rows are flipped on the way out.
    pub fn finish(self, device: &wgpu::Device) -> Result<PixelBuffer, RenderError> {
        let slice = self.buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(ReadbackFailure::Poll)?;
        receiver
            .recv()
            .map_err(|_| ReadbackFailure::CallbackDropped)?
            .map_err(ReadbackFailure::Map)?;

        let tight_row = (self.width * 4) as usize;
        let mut rgba = Vec::with_capacity(tight_row * self.height as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(self.padded_bytes_per_row as usize).rev() {
                rgba.extend_from_slice(&row[..tight_row]);
            }
        }
        self.buffer.unmap();

        Ok(PixelBuffer {
            width: self.width,
            height: self.height,
            rgba,
        })
    }
}
