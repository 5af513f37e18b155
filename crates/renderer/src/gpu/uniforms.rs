use bytemuck::{Pod, Zeroable};

use crate::types::Pointer;

/// Environment block shared by every pass. Mirrors the leading members of the
/// synthesized `PpParams` uniform block.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub(crate) struct EnvUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub mouse_x: f32,
    pub mouse_y: f32,
}

impl EnvUniforms {
    pub fn new(size: (u32, u32), time: f32, pointer: Pointer) -> Self {
        Self {
            resolution: [size.0 as f32, size.1 as f32],
            time,
            mouse_x: pointer.x,
            mouse_y: pointer.y,
        }
    }
}

/// Packs the environment block followed by one float per parameter, padded
/// with zeros to `size` bytes.
pub(crate) fn pack_pass_uniforms(env: &EnvUniforms, parameters: &[f32], size: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(size as usize);
    bytes.extend_from_slice(bytemuck::bytes_of(env));
    bytes.extend_from_slice(bytemuck::cast_slice(parameters));
    bytes.resize((size as usize).max(bytes.len()), 0);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_follow_environment_block() {
        let env = EnvUniforms::new((640, 480), 1.5, Pointer::new(0.25, 0.75));
        let bytes = pack_pass_uniforms(&env, &[2.0, 3.0], 32);
        assert_eq!(bytes.len(), 32);
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
        assert_eq!(floats, [640.0, 480.0, 1.5, 0.25, 0.75, 2.0, 3.0, 0.0]);
    }
}
