//! Fragment program synthesis.
//!
//! Catalog passes only carry a fragment body plus optional helpers written
//! against a small WebGL-flavoured vocabulary (`texture2D`, `gl_FragColor`,
//! `v_texCoord`, `u_*` uniforms). [`synthesize_fragment`] wraps that body into
//! a complete Vulkan GLSL 450 module whose bind layout is derived purely from
//! the [`ProgramDescriptor`]:
//!
//! ```text
//!   set 0, binding 0   uniform block: resolution, time, pointer, parameters
//!   set 1, binding 0   shared sampler
//!   set 1, binding 1+  one texture per input uniform, sorted by name
//! ```
//!
//! The same source is parsed and validated with naga before it reaches the
//! device so compile failures come back as readable messages.
use std::borrow::Cow;
use std::fmt::Write as _;

use catalog::{Effect, Pass, PRIMARY_SAMPLER};
use wgpu::naga::front::glsl::{Frontend, Options};
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::ShaderStage;

/// Floats occupied by the environment uniforms ahead of the parameters.
pub(crate) const ENV_FLOATS: usize = 5;

/// Structural identity of a fragment program. Doubles as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramDescriptor {
    pub body: String,
    pub helpers: String,
    /// Parameter ids in declaration order; order defines uniform offsets.
    pub parameters: Vec<String>,
    /// Input uniform names, sorted and deduplicated.
    pub inputs: Vec<String>,
}

impl ProgramDescriptor {
    pub fn new<P, I>(body: &str, helpers: &str, parameters: P, inputs: I) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
        inputs.sort();
        inputs.dedup();
        Self {
            body: body.to_string(),
            helpers: helpers.to_string(),
            parameters: parameters.into_iter().map(Into::into).collect(),
            inputs,
        }
    }

    pub fn for_pass(effect: &Effect, pass: &Pass) -> Self {
        Self::new(
            &pass.shader,
            &pass.helpers,
            effect.params.iter().map(|param| param.id.as_str()),
            pass.input_names(),
        )
    }

    /// Whether `main` predeclares `color` from `u_texture`.
    pub fn primary_texture(&self) -> bool {
        self.inputs.iter().any(|name| name == PRIMARY_SAMPLER)
    }

    /// Size of the uniform block in bytes, rounded to a 16 byte multiple.
    pub fn uniform_size(&self) -> u64 {
        let floats = ENV_FLOATS + self.parameters.len();
        let bytes = (floats * std::mem::size_of::<f32>()) as u64;
        bytes.div_ceil(16) * 16
    }
}

/// Program used to blit a target onto the presentation surface. Targets store
/// the image bottom row first, the surface expects the top row first.
pub(crate) fn present_descriptor() -> ProgramDescriptor {
    ProgramDescriptor::new(
        "gl_FragColor = texture2D(u_texture, vec2(v_texCoord.x, 1.0 - v_texCoord.y));",
        "",
        std::iter::empty::<String>(),
        [PRIMARY_SAMPLER],
    )
}

/// Produces the complete GLSL 450 fragment source for `descriptor`.
pub fn synthesize_fragment(descriptor: &ProgramDescriptor) -> String {
    let mut out = String::with_capacity(1024 + descriptor.body.len() + descriptor.helpers.len());
    out.push_str(FRAGMENT_PRELUDE);

    let _ = writeln!(out, "layout(set = 1, binding = 0) uniform sampler pp_sampler;");
    for (index, name) in descriptor.inputs.iter().enumerate() {
        let _ = writeln!(
            out,
            "layout(set = 1, binding = {}) uniform texture2D pp_tex_{name};",
            index + 1
        );
    }
    for name in &descriptor.inputs {
        let _ = writeln!(out, "#define {name} sampler2D(pp_tex_{name}, pp_sampler)");
    }

    out.push_str("\nlayout(std140, set = 0, binding = 0) uniform PpParams {\n");
    out.push_str("    vec2 pp_resolution;\n    float pp_time;\n");
    out.push_str("    float pp_mouse_x;\n    float pp_mouse_y;\n");
    for id in &descriptor.parameters {
        let _ = writeln!(out, "    float pp_p_{id};");
    }
    out.push_str("} pp_params;\n\n");
    out.push_str(ENV_DEFINES);
    for id in &descriptor.parameters {
        let _ = writeln!(out, "#define u_{id} pp_params.pp_p_{id}");
    }

    out.push_str(COMPAT_DEFINES);
    out.push_str(&descriptor.helpers);
    out.push_str("\n\nvoid main() {\n    v_texCoord = pp_uv;\n");
    if descriptor.primary_texture() {
        out.push_str("    vec4 color = texture2D(u_texture, v_texCoord);\n");
    }
    out.push_str(&descriptor.body);
    out.push_str("\n}\n");
    out
}

/// Parses and validates a fragment source with naga, returning a printable
/// diagnostic on failure.
pub fn check_fragment(source: &str) -> Result<(), String> {
    let mut frontend = Frontend::default();
    let module = frontend
        .parse(&Options::from(ShaderStage::Fragment), source)
        .map_err(|errors| errors.emit_to_string(source))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|error| error.emit_to_string(source))?;
    Ok(())
}

pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("full-surface vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

pub(crate) fn compile_fragment_shader(device: &wgpu::Device, source: String) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("effect pass fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

const FRAGMENT_PRELUDE: &str = r"#version 450
layout(location = 0) in vec2 pp_uv;
layout(location = 0) out vec4 pp_frag_color;

";

const ENV_DEFINES: &str = r"#define u_resolution pp_params.pp_resolution
#define u_time pp_params.pp_time
#define u_mouseX pp_params.pp_mouse_x
#define u_mouseY pp_params.pp_mouse_y
";

// Texture declarations above still need the real `texture2D` type name.
const COMPAT_DEFINES: &str = r"#define texture2D texture
#define gl_FragColor pp_frag_color

vec2 v_texCoord;

";

/// Full-surface triangle. `uv.y == 0` lands on the first texel row.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 pp_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    vec2 pos = positions[gl_VertexIndex];
    pp_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";
