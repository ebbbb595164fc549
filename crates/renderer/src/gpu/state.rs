use std::sync::mpsc;

use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::clock::TimeSample;
use crate::compile::CompileError;
use crate::params::ParameterValues;
use crate::types::Antialiasing;

use super::context::GpuContext;
use super::pipeline::{PipelineLayouts, ShaderPipeline};
use super::uniforms::ViewerUniforms;

/// One captured frame, tightly packed RGBA8.
#[derive(Debug, Clone)]
pub struct FramePixels {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// The render engine: GPU context, uniform state, and the active program.
///
/// The engine owns exactly one active [`ShaderPipeline`] at a time. A
/// fragment swap compiles first and replaces the pipeline only on success,
/// so an invalid edit can never blank the canvas or interrupt the loop; with
/// no program yet compiled, rendering presents a cleared frame.
pub struct RenderEngine {
    context: GpuContext,
    layouts: PipelineLayouts,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: ViewerUniforms,
    current: Option<ShaderPipeline>,
    multisample_target: Option<MultisampleTarget>,
    capture: Option<CaptureTarget>,
}

impl RenderEngine {
    /// Builds an engine presenting into the supplied window.
    pub fn for_window<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        vertex_source: &str,
        antialiasing: Antialiasing,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::for_window(target, initial_size, antialiasing)?;
        Self::from_context(context, vertex_source)
    }

    /// Builds a headless engine whose frames are only reachable via capture.
    pub fn offscreen(
        initial_size: PhysicalSize<u32>,
        vertex_source: &str,
        antialiasing: Antialiasing,
    ) -> Result<Self> {
        let context = GpuContext::offscreen(initial_size, antialiasing)?;
        Self::from_context(context, vertex_source)
    }

    fn from_context(context: GpuContext, vertex_source: &str) -> Result<Self> {
        let layouts = PipelineLayouts::new(&context.device, vertex_source)
            .map_err(|err| anyhow!("failed to compile vertex stage: {err}"))?;

        let uniforms = ViewerUniforms::new(context.size.width, context.size.height);
        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform buffer"),
            size: std::mem::size_of::<ViewerUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform bind group"),
                layout: &layouts.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
        context
            .queue
            .write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let multisample_target = MultisampleTarget::for_context(&context);

        Ok(Self {
            context,
            layouts,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
            current: None,
            multisample_target,
            capture: None,
        })
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub fn has_program(&self) -> bool {
        self.current.is_some()
    }

    /// Reacts to host resize events.
    ///
    /// Only swapchain configuration and the `r` uniform change; the active
    /// program is untouched, so this is safe to apply between any two frames.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.uniforms
            .set_resolution(self.context.size.width as f32, self.context.size.height as f32);
        self.multisample_target = MultisampleTarget::for_context(&self.context);
        self.capture = None;
    }

    /// Attempts to build and activate a new program from fragment source.
    ///
    /// On success the new pipeline atomically replaces the active one. On
    /// failure the attempt is discarded, the previously active program keeps
    /// rendering, and the compiler diagnostic is returned to the caller.
    pub fn set_fragment_source(&mut self, source: &str) -> Result<(), CompileError> {
        let pipeline = ShaderPipeline::new(
            &self.context.device,
            &self.layouts,
            self.context.surface_format,
            self.context.sample_count,
            source,
        )?;
        self.current = Some(pipeline);
        Ok(())
    }

    /// Draws the active program into the swapchain and presents.
    ///
    /// Idempotent and safe to call at any time; with no active program the
    /// frame is cleared to black.
    pub fn render_frame(
        &mut self,
        sample: TimeSample,
        params: ParameterValues,
    ) -> Result<(), wgpu::SurfaceError> {
        self.upload_uniforms(sample, params);

        let frame = self.context.acquire_frame()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });

        let msaa_view = self.multisample_target.as_ref().map(|msaa| &msaa.view);
        self.encode_draw(&mut encoder, &view, msaa_view);

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        tracing::trace!(
            t = self.uniforms.t,
            frame = sample.frame_index,
            "presented frame"
        );
        Ok(())
    }

    /// Renders one frame at the supplied sample and reads the pixels back.
    ///
    /// Capture goes through a dedicated offscreen target so logical time is
    /// the only input: the same shader, parameters, and sample always
    /// produce the same pixels regardless of how long the readback takes.
    pub fn render_capture(
        &mut self,
        sample: TimeSample,
        params: ParameterValues,
    ) -> Result<FramePixels> {
        self.upload_uniforms(sample, params);

        if self
            .capture
            .as_ref()
            .map(|capture| capture.size != self.context.size)
            .unwrap_or(true)
        {
            self.capture = Some(CaptureTarget::new(&self.context)?);
        }
        let capture = self.capture.as_ref().expect("capture target just ensured");

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("capture encoder"),
                });

        let msaa_view = capture.msaa_view.as_ref();
        self.encode_draw(&mut encoder, &capture.view, msaa_view);

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &capture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &capture.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(capture.padded_bytes_per_row),
                    rows_per_image: Some(capture.size.height),
                },
            },
            wgpu::Extent3d {
                width: capture.size.width,
                height: capture.size.height,
                depth_or_array_layers: 1,
            },
        );

        self.context.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = capture.readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context
            .device
            .poll(wgpu::PollType::Wait)
            .context("failed to wait for GPU readback")?;
        receiver
            .recv()
            .map_err(|_| anyhow!("GPU readback callback was dropped"))?
            .context("GPU buffer mapping failed")?;

        let mapped = buffer_slice.get_mapped_range();
        let mut rgba = tighten_rows(
            &mapped,
            capture.unpadded_bytes_per_row,
            capture.padded_bytes_per_row,
            capture.size.height,
        )?;
        drop(mapped);
        capture.readback.unmap();

        swizzle_to_rgba(&mut rgba, self.context.surface_format)?;

        Ok(FramePixels {
            rgba,
            width: capture.size.width,
            height: capture.size.height,
        })
    }

    fn upload_uniforms(&mut self, sample: TimeSample, params: ParameterValues) {
        self.uniforms.set_time(sample.seconds);
        self.uniforms.set_params(params);
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));
    }

    fn encode_draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        msaa_view: Option<&wgpu::TextureView>,
    ) {
        let (attachment_view, resolve_target) = match msaa_view {
            Some(msaa) => (msaa, Some(view)),
            None => (view, None),
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("render pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: attachment_view,
                depth_slice: None,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        if let Some(current) = self.current.as_ref() {
            render_pass.set_pipeline(&current.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            // Two triangles generated in the vertex stage cover the surface
            // edge to edge.
            render_pass.draw(0..6, 0..1);
        }
    }
}

struct MultisampleTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn for_context(context: &GpuContext) -> Option<Self> {
        if context.sample_count <= 1 {
            return None;
        }
        Some(Self::new(
            &context.device,
            context.surface_format,
            context.size,
            context.sample_count,
        ))
    }

    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        sample_count: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa color target"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Offscreen render target plus readback buffer for frame capture.
struct CaptureTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
    _msaa_texture: Option<wgpu::Texture>,
    readback: wgpu::Buffer,
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
    size: PhysicalSize<u32>,
}

impl CaptureTarget {
    fn new(context: &GpuContext) -> Result<Self> {
        let size = context.size;
        let texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("capture target"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: context.surface_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let (msaa_texture, msaa_view) = if context.sample_count > 1 {
            let msaa = MultisampleTarget::new(
                &context.device,
                context.surface_format,
                size,
                context.sample_count,
            );
            (Some(msaa._texture), Some(msaa.view))
        } else {
            (None, None)
        };

        let unpadded_bytes_per_row = size
            .width
            .checked_mul(4)
            .ok_or_else(|| anyhow!("frame width overflow when computing row bytes"))?;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let readback = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("capture readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(size.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Ok(Self {
            texture,
            view,
            msaa_view,
            _msaa_texture: msaa_texture,
            readback,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
            size,
        })
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

/// Copies the row-padded readback buffer into tightly packed pixel rows.
fn tighten_rows(
    mapped: &[u8],
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let required_len = padded_bytes_per_row as usize * height as usize;
    if mapped.len() < required_len {
        anyhow::bail!(
            "mapped frame too small: expected at least {} bytes, got {}",
            required_len,
            mapped.len()
        );
    }

    let mut frame = vec![0_u8; unpadded_bytes_per_row as usize * height as usize];
    for row_index in 0..height as usize {
        let src_start = row_index * padded_bytes_per_row as usize;
        let src_end = src_start + unpadded_bytes_per_row as usize;
        let dst_start = row_index * unpadded_bytes_per_row as usize;
        frame[dst_start..dst_start + unpadded_bytes_per_row as usize]
            .copy_from_slice(&mapped[src_start..src_end]);
    }

    Ok(frame)
}

/// Normalizes captured bytes to RGBA channel order in place.
fn swizzle_to_rgba(frame: &mut [u8], format: wgpu::TextureFormat) -> Result<()> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => Ok(()),
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => {
            for pixel in frame.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
            Ok(())
        }
        other => anyhow::bail!("unsupported surface format for capture: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_to_respects_copy_alignment() {
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(640 * 4, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT), 2560);
    }

    #[test]
    fn tighten_rows_drops_row_padding() {
        // Two rows of 4 bytes each, padded to 8 bytes per row.
        let mapped = [1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8, 0, 0, 0, 0];
        let tight = tighten_rows(&mapped, 4, 8, 2).expect("rows should tighten");
        assert_eq!(tight, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn tighten_rows_rejects_short_buffers() {
        let mapped = [0_u8; 8];
        assert!(tighten_rows(&mapped, 4, 8, 2).is_err());
    }

    #[test]
    fn swizzle_converts_bgra_and_keeps_rgba() {
        let mut bgra = vec![10, 20, 30, 255];
        swizzle_to_rgba(&mut bgra, wgpu::TextureFormat::Bgra8UnormSrgb).expect("bgra supported");
        assert_eq!(bgra, vec![30, 20, 10, 255]);

        let mut rgba = vec![10, 20, 30, 255];
        swizzle_to_rgba(&mut rgba, wgpu::TextureFormat::Rgba8UnormSrgb).expect("rgba supported");
        assert_eq!(rgba, vec![10, 20, 30, 255]);
    }
}
