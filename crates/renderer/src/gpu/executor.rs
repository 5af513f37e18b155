use tracing::warn;
use wgpu::util::DeviceExt;

use crate::compile::ProgramDescriptor;
use crate::plan::{ChainPlan, PlannedPass};
use crate::types::PassDiagnostic;

use super::programs::ProgramLibrary;
use super::targets::ResourceTable;
use super::uniforms::{pack_pass_uniforms, EnvUniforms};

/// Draws recorded for one chain plus the diagnostics raised on the way.
#[derive(Debug, Default)]
pub(crate) struct ExecutionOutcome {
    pub draws: u32,
    pub diagnostics: Vec<PassDiagnostic>,
}

/// Records every planned pass into `encoder`. Nothing is submitted here.
pub(crate) fn encode_chain(
    device: &wgpu::Device,
    programs: &mut ProgramLibrary,
    table: &mut ResourceTable,
    plan: &ChainPlan<'_>,
    env: &EnvUniforms,
    encoder: &mut wgpu::CommandEncoder,
) -> ExecutionOutcome {
    let mut outcome = ExecutionOutcome::default();
    for step in &plan.steps {
        if encode_pass(device, programs, table, step, env, encoder, &mut outcome.diagnostics) {
            outcome.draws += 1;
        }
    }
    outcome
}

fn encode_pass(
    device: &wgpu::Device,
    programs: &mut ProgramLibrary,
    table: &mut ResourceTable,
    step: &PlannedPass<'_>,
    env: &EnvUniforms,
    encoder: &mut wgpu::CommandEncoder,
    diagnostics: &mut Vec<PassDiagnostic>,
) -> bool {
    if table.get_or_create(device, &step.write_key).is_none() {
        return false;
    }

    let descriptor = ProgramDescriptor::for_pass(step.effect, step.pass);
    let program = match programs.get(device, &descriptor) {
        Ok(program) => program,
        Err(failure) => {
            if !failure.cached {
                warn!(
                    effect = %step.effect.id,
                    pass = step.pass_index,
                    "skipping pass whose program failed to compile:\n{}",
                    failure.message
                );
            }
            diagnostics.push(PassDiagnostic::ProgramCompileFailure {
                effect: step.effect.id.clone(),
                pass: step.pass_index,
                message: failure.message,
            });
            return false;
        }
    };

    let table = &*table;
    let Some(write_target) = table.get(&step.write_key) else {
        return false;
    };

    let mut entries = Vec::with_capacity(program.input_names.len() + 1);
    entries.push(wgpu::BindGroupEntry {
        binding: 0,
        resource: wgpu::BindingResource::Sampler(table.sampler()),
    });
    for (slot, uniform) in program.input_names.iter().enumerate() {
        let key = step
            .inputs
            .iter()
            .find(|(name, _)| name == uniform)
            .map(|(_, key)| key.as_str())
            .unwrap_or_default();
        let view = match table.get(key) {
            Some(target) => &target.view,
            None => {
                warn!(
                    effect = %step.effect.id,
                    pass = step.pass_index,
                    uniform = %uniform,
                    key,
                    "binding zero texture for missing input"
                );
                diagnostics.push(PassDiagnostic::MissingInputTexture {
                    effect: step.effect.id.clone(),
                    pass: step.pass_index,
                    uniform: uniform.clone(),
                    key: key.to_string(),
                });
                &table.zero().view
            }
        };
        entries.push(wgpu::BindGroupEntry {
            binding: slot as u32 + 1,
            resource: wgpu::BindingResource::TextureView(view),
        });
    }
    let texture_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("pass texture bind group"),
        layout: &program.texture_layout,
        entries: &entries,
    });

    let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("pass uniforms"),
        contents: &pack_pass_uniforms(env, &step.parameter_values, program.uniform_size),
        usage: wgpu::BufferUsages::UNIFORM,
    });
    let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("pass uniform bind group"),
        layout: programs.uniform_layout(),
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }],
    });

    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("effect pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &write_target.view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
    render_pass.set_pipeline(&program.pipeline);
    render_pass.set_bind_group(0, &uniform_group, &[]);
    render_pass.set_bind_group(1, &texture_group, &[]);
    render_pass.draw(0..3, 0..1);
    true
}
