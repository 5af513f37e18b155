use std::collections::BTreeMap;

use tracing::debug;
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::types::{ACCUM_A, ACCUM_B, SOURCE_TARGET};

use super::programs::TARGET_FORMAT;

/// GPU texture usable both as a draw destination and as a sampled input.
pub(crate) struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl RenderTarget {
    fn new(device: &wgpu::Device, key: &str, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("render target '{key}'")),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: target_usage(),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

fn target_usage() -> wgpu::TextureUsages {
    wgpu::TextureUsages::RENDER_ATTACHMENT
        | wgpu::TextureUsages::TEXTURE_BINDING
        | wgpu::TextureUsages::COPY_SRC
        | wgpu::TextureUsages::COPY_DST
}

/// Owns every render target for the current image, keyed by symbolic name.
///
/// All targets share the loaded image's dimensions. Before the first
/// [`ResourceTable::reset`] the table is empty and refuses to allocate.
pub(crate) struct ResourceTable {
    size: Option<(u32, u32)>,
    targets: BTreeMap<String, RenderTarget>,
    sampler: wgpu::Sampler,
    zero: RenderTarget,
}

impl ResourceTable {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("render target sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let zero_texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("missing input texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TARGET_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            &[0u8; 4],
        );
        let zero_view = zero_texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            size: None,
            targets: BTreeMap::new(),
            sampler,
            zero: RenderTarget {
                texture: zero_texture,
                view: zero_view,
            },
        }
    }

    /// Destroys every target and allocates `source`, `A`, and `B` at the new
    /// size. Pass-specific targets are recreated lazily on first use.
    pub fn reset(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        for (_, target) in std::mem::take(&mut self.targets) {
            target.texture.destroy();
        }
        self.size = Some((width, height));
        for key in [SOURCE_TARGET, ACCUM_A, ACCUM_B] {
            self.targets
                .insert(key.to_string(), RenderTarget::new(device, key, width, height));
        }
        debug!(width, height, "reset resource table");
    }

    /// Uploads rows given bottom row first into the `source` target.
    pub fn upload_source(&self, queue: &wgpu::Queue, bottom_up_rgba: &[u8]) {
        let (Some((width, height)), Some(source)) = (self.size, self.targets.get(SOURCE_TARGET))
        else {
            return;
        };
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bottom_up_rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&RenderTarget> {
        self.targets.get(key)
    }

    /// Returns the target for `key`, allocating it at the session size when
    /// needed. Returns `None` before an image has been loaded.
    pub fn get_or_create(&mut self, device: &wgpu::Device, key: &str) -> Option<&RenderTarget> {
        let (width, height) = self.size?;
        if !self.targets.contains_key(key) {
            debug!(key, width, height, "allocating intermediate target");
            self.targets
                .insert(key.to_string(), RenderTarget::new(device, key, width, height));
        }
        self.targets.get(key)
    }

    pub fn zero(&self) -> &RenderTarget {
        &self.zero
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.size
    }

    pub fn keys(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }
}
