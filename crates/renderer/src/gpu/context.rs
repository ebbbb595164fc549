use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::TextureFormatFeatureFlags;
use winit::dpi::PhysicalSize;

use crate::types::Antialiasing;

/// Format used for headless render targets; RGBA keeps readback trivial.
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Owns the wgpu plumbing shared by every render path.
///
/// A context is created either against a live window (swapchain surface) or
/// headless (no surface at all, frames only ever leave through the capture
/// target). The rest of the engine treats both the same way and only the
/// present step cares about the difference.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: Option<wgpu::Surface<'static>>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    config: Option<wgpu::SurfaceConfiguration>,
    pub size: PhysicalSize<u32>,
    pub sample_count: u32,
    pub surface_format: wgpu::TextureFormat,
    limits: wgpu::Limits,
}

impl GpuContext {
    /// Creates a context presenting into the supplied window handle.
    pub(crate) fn for_window<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let limits = adapter.limits();
        let size = clamp_to_device_limits(initial_size, &limits)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let sample_count = resolve_sample_count(&adapter, surface_format, antialiasing);
        let (device, queue) = request_device(&adapter, &limits)?;

        let present_mode = surface_caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .unwrap_or(surface_caps.present_modes[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(&device, &config);

        tracing::info!(
            width = size.width,
            height = size.height,
            ?surface_format,
            sample_count,
            "initialised windowed GPU context"
        );

        Ok(Self {
            _instance: instance,
            surface: Some(surface),
            device,
            queue,
            config: Some(config),
            size,
            sample_count,
            surface_format,
            limits,
        })
    }

    /// Creates a headless context; frames are only reachable via capture.
    pub(crate) fn offscreen(
        initial_size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
    ) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let limits = adapter.limits();
        let size = clamp_to_device_limits(initial_size, &limits)?;
        let sample_count = resolve_sample_count(&adapter, OFFSCREEN_FORMAT, antialiasing);
        let (device, queue) = request_device(&adapter, &limits)?;

        tracing::info!(
            width = size.width,
            height = size.height,
            sample_count,
            "initialised headless GPU context"
        );

        Ok(Self {
            _instance: instance,
            surface: None,
            device,
            queue,
            config: None,
            size,
            sample_count,
            surface_format: OFFSCREEN_FORMAT,
            limits,
        })
    }

    /// Reconfigures the swapchain to match the new size.
    ///
    /// Zero-sized and over-limit requests are ignored so a resize can land
    /// between any two frames without invalidating state.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        let max_dimension = self.limits.max_texture_dimension_2d;
        if new_size.width > max_dimension || new_size.height > max_dimension {
            tracing::warn!(
                width = new_size.width,
                height = new_size.height,
                max_dimension,
                "resize exceeds GPU texture limits; keeping previous size"
            );
            return;
        }

        self.size = new_size;
        if let (Some(surface), Some(config)) = (self.surface.as_ref(), self.config.as_mut()) {
            config.width = new_size.width;
            config.height = new_size.height;
            surface.configure(&self.device, config);
        }
    }

    /// Acquires the next swapchain frame; only valid for windowed contexts.
    pub(crate) fn acquire_frame(&self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        match self.surface.as_ref() {
            Some(surface) => surface.get_current_texture(),
            None => Err(wgpu::SurfaceError::Lost),
        }
    }
}

fn request_device(
    adapter: &wgpu::Adapter,
    limits: &wgpu::Limits,
) -> Result<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("shaderdesk device"),
        required_features: wgpu::Features::empty(),
        required_limits: limits.clone(),
        memory_hints: wgpu::MemoryHints::default(),
        trace: wgpu::Trace::default(),
    }))
    .context("failed to create GPU device")
}

fn clamp_to_device_limits(
    requested: PhysicalSize<u32>,
    limits: &wgpu::Limits,
) -> Result<PhysicalSize<u32>> {
    let max_dimension = limits.max_texture_dimension_2d;
    let width = requested.width.max(1);
    let height = requested.height.max(1);
    if width > max_dimension || height > max_dimension {
        anyhow::bail!(
            "GPU max texture dimension is {max_dimension}, requested surface is {width}x{height}"
        );
    }
    Ok(PhysicalSize::new(width, height))
}

/// Resolves the requested anti-aliasing policy against format capabilities.
fn resolve_sample_count(
    adapter: &wgpu::Adapter,
    format: wgpu::TextureFormat,
    antialiasing: Antialiasing,
) -> u32 {
    let format_features = adapter.get_texture_format_features(format);
    let mut supported_samples = format_features.flags.supported_sample_counts();
    if !supported_samples.contains(&1) {
        supported_samples.push(1);
    }
    supported_samples.sort_unstable();
    supported_samples.dedup();

    let mut sample_count = match antialiasing {
        Antialiasing::Auto => supported_samples
            .iter()
            .copied()
            .filter(|&count| count <= 4)
            .max()
            .unwrap_or(1),
        Antialiasing::Off => 1,
        Antialiasing::Samples(requested) => {
            if supported_samples.contains(&requested) {
                requested
            } else {
                let fallback = supported_samples
                    .iter()
                    .copied()
                    .filter(|&count| count <= requested)
                    .max()
                    .unwrap_or(*supported_samples.first().unwrap_or(&1));
                tracing::warn!(
                    requested,
                    fallback,
                    ?supported_samples,
                    "requested MSAA sample count not supported; falling back"
                );
                fallback
            }
        }
    };

    if sample_count > 1
        && !format_features
            .flags
            .contains(TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE)
    {
        tracing::warn!(?format, "format does not support MSAA resolve; disabling MSAA");
        sample_count = 1;
    }

    sample_count
}
