use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::compile::{
    check_fragment, compile_fragment_shader, compile_vertex_shader, synthesize_fragment,
    ProgramDescriptor,
};

/// Format of every render target in the resource table.
pub(crate) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Result of a cache lookup that did not yield a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    pub message: String,
    /// True when the failure was remembered from an earlier attempt.
    pub cached: bool,
}

/// Memoizes compiled programs by structural descriptor.
///
/// Failed descriptors are remembered so they are not compiled again, and they
/// never count towards [`ProgramCache::len`]. The cache is generic over the
/// program type so its bookkeeping is testable without a device.
#[derive(Debug)]
pub struct ProgramCache<P> {
    programs: HashMap<ProgramDescriptor, Arc<P>>,
    failures: HashMap<ProgramDescriptor, String>,
}

impl<P> Default for ProgramCache<P> {
    fn default() -> Self {
        Self {
            programs: HashMap::new(),
            failures: HashMap::new(),
        }
    }
}

impl<P> ProgramCache<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile<F>(
        &mut self,
        descriptor: &ProgramDescriptor,
        compile: F,
    ) -> Result<Arc<P>, CompileFailure>
    where
        F: FnOnce(&ProgramDescriptor) -> Result<P, String>,
    {
        if let Some(program) = self.programs.get(descriptor) {
            return Ok(program.clone());
        }
        if let Some(message) = self.failures.get(descriptor) {
            return Err(CompileFailure {
                message: message.clone(),
                cached: true,
            });
        }

        match compile(descriptor) {
            Ok(program) => {
                let program = Arc::new(program);
                self.programs.insert(descriptor.clone(), program.clone());
                Ok(program)
            }
            Err(message) => {
                self.failures.insert(descriptor.clone(), message.clone());
                Err(CompileFailure {
                    message,
                    cached: false,
                })
            }
        }
    }

    pub fn get(&self, descriptor: &ProgramDescriptor) -> Option<Arc<P>> {
        self.programs.get(descriptor).cloned()
    }

    /// Number of successfully compiled programs.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Number of descriptors that failed to compile.
    pub fn failed_len(&self) -> usize {
        self.failures.len()
    }
}

/// A compiled fragment program plus the layouts needed to bind it.
pub(crate) struct ShaderProgram {
    fragment: wgpu::ShaderModule,
    pub texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    /// Pipeline rendering into [`TARGET_FORMAT`] targets.
    pub pipeline: wgpu::RenderPipeline,
    pub input_names: Vec<String>,
    pub uniform_size: u64,
}

impl ShaderProgram {
    /// Builds a pipeline for a different color format, used for presentation.
    pub(crate) fn pipeline_for(
        &self,
        device: &wgpu::Device,
        vertex: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        build_pipeline(device, &self.pipeline_layout, vertex, &self.fragment, format)
    }
}

/// Device-side program management: shared vertex stage, uniform layout, and
/// the descriptor cache.
pub(crate) struct ProgramLibrary {
    vertex: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    cache: ProgramCache<ShaderProgram>,
}

impl ProgramLibrary {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        Self {
            vertex: compile_vertex_shader(device),
            uniform_layout,
            cache: ProgramCache::new(),
        }
    }

    pub fn vertex(&self) -> &wgpu::ShaderModule {
        &self.vertex
    }

    pub fn uniform_layout(&self) -> &wgpu::BindGroupLayout {
        &self.uniform_layout
    }

    pub fn cache(&self) -> &ProgramCache<ShaderProgram> {
        &self.cache
    }

    pub fn get(
        &mut self,
        device: &wgpu::Device,
        descriptor: &ProgramDescriptor,
    ) -> Result<Arc<ShaderProgram>, CompileFailure> {
        let vertex = &self.vertex;
        let uniform_layout = &self.uniform_layout;
        self.cache.get_or_compile(descriptor, |descriptor| {
            compile_program(device, vertex, uniform_layout, descriptor)
        })
    }
}

fn compile_program(
    device: &wgpu::Device,
    vertex: &wgpu::ShaderModule,
    uniform_layout: &wgpu::BindGroupLayout,
    descriptor: &ProgramDescriptor,
) -> Result<ShaderProgram, String> {
    let source = synthesize_fragment(descriptor);
    if let Err(message) = check_fragment(&source) {
        warn!(inputs = ?descriptor.inputs, "fragment program rejected by validator");
        return Err(message);
    }

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let fragment = compile_fragment_shader(device, source);
    let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("pass texture layout"),
        entries: &texture_layout_entries(descriptor.inputs.len()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("pass pipeline layout"),
        bind_group_layouts: &[uniform_layout, &texture_layout],
        push_constant_ranges: &[],
    });
    let pipeline = build_pipeline(device, &pipeline_layout, vertex, &fragment, TARGET_FORMAT);
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        warn!(%error, "device rejected fragment program");
        return Err(error.to_string());
    }

    debug!(
        inputs = ?descriptor.inputs,
        parameters = descriptor.parameters.len(),
        "compiled fragment program"
    );
    Ok(ShaderProgram {
        fragment,
        texture_layout,
        pipeline_layout,
        pipeline,
        input_names: descriptor.inputs.clone(),
        uniform_size: descriptor.uniform_size(),
    })
}

fn texture_layout_entries(inputs: usize) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(inputs + 1);
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });
    for index in 0..inputs {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index as u32 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    entries
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("effect pass pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: Some("main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: fragment,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}
