use bytemuck::{Pod, Zeroable};

use crate::params::ParameterValues;

/// CPU-side mirror of the viewer uniform block.
///
/// The layout matches the GLSL prelude injected by `compile::wrap_fragment`
/// and therefore must observe std140 alignment rules: the leading vec2 packs
/// to an 8-byte slot and the seven scalars follow back to back, giving a
/// 32-byte block with no interior padding.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub(crate) struct ViewerUniforms {
    pub r: [f32; 2],
    pub t: f32,
    pub speed: f32,
    pub hue_shift: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub shape_scale: f32,
}

unsafe impl Zeroable for ViewerUniforms {}
unsafe impl Pod for ViewerUniforms {}

impl ViewerUniforms {
    /// Prepares a uniform block sized to the current surface, with every
    /// parameter at its registry default.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            r: [width as f32, height as f32],
            t: 0.0,
            speed: 1.0,
            hue_shift: 0.0,
            saturation: 1.0,
            brightness: 1.0,
            shape_scale: 1.0,
        }
    }

    /// Writes the current surface dimensions into `r`.
    pub fn set_resolution(&mut self, width: f32, height: f32) {
        self.r = [width, height];
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.t = seconds;
    }

    pub fn set_params(&mut self, values: ParameterValues) {
        self.speed = values.speed;
        self.hue_shift = values.hue_shift;
        self.saturation = values.saturation;
        self.brightness = values.brightness;
        self.shape_scale = values.shape_scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    /// Sanity-checks that the CPU mirror of the uniform block matches the
    /// layout baked into the GLSL header.
    #[test]
    fn viewer_uniforms_follow_std140_layout() {
        let uniforms = ViewerUniforms::new(1280, 720);
        let base = &uniforms as *const _ as usize;

        assert_eq!(align_of::<ViewerUniforms>(), 16);
        assert_eq!(size_of::<ViewerUniforms>(), 32);
        assert_eq!((&uniforms.r as *const _ as usize) - base, 0);
        assert_eq!((&uniforms.t as *const _ as usize) - base, 8);
        assert_eq!((&uniforms.speed as *const _ as usize) - base, 12);
        assert_eq!((&uniforms.hue_shift as *const _ as usize) - base, 16);
        assert_eq!((&uniforms.saturation as *const _ as usize) - base, 20);
        assert_eq!((&uniforms.brightness as *const _ as usize) - base, 24);
        assert_eq!((&uniforms.shape_scale as *const _ as usize) - base, 28);
    }

    #[test]
    fn setters_write_through() {
        let mut uniforms = ViewerUniforms::new(100, 50);
        assert_eq!(uniforms.r, [100.0, 50.0]);

        uniforms.set_resolution(640.0, 480.0);
        uniforms.set_time(2.5);
        assert_eq!(uniforms.r, [640.0, 480.0]);
        assert_eq!(uniforms.t, 2.5);
    }
}
