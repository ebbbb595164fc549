//! Render engine for Shaderdesk.
//!
//! The crate turns user-edited GLSL fragment source into a live full-screen
//! render and, on request, into a deterministic frame sequence for video
//! export. The overall flow is:
//!
//! ```text
//!   host (CLI / preview loop)
//!          │ vertex + fragment source, parameter events
//!          ▼
//!   RenderEngine::set_fragment_source ──▶ compile::wrap + naga validate
//!          │ (swap on success only)
//!          ▼
//!   PlaybackClock::tick ──▶ render_frame() ──▶ uniform upload ─▶ draw quad
//!          │
//!          └─ export: fixed t = i / fps ─▶ render_capture() ─▶ PNG/base64
//! ```
//!
//! The engine owns all GPU resources; the parameter registry and playback
//! clock are plain state the host mutates between frames. Compilation goes
//! through naga's GLSL front-end first so a broken edit surfaces as a
//! [`CompileError`] with the compiler's diagnostic while the previous
//! program keeps rendering.

mod clock;
mod compile;
mod export;
mod gpu;
mod params;
mod types;

pub use clock::{PlaybackClock, TimeSample};
pub use compile::CompileError;
pub use export::{
    capture_frames, CapturedFrames, ExportRequest, MAX_EXPORT_SECONDS, MIN_EXPORT_SECONDS,
};
pub use gpu::{FramePixels, RenderEngine};
pub use params::{ParameterRegistry, ParameterSpec, ParameterValues, PARAMETER_SPECS};
pub use types::Antialiasing;
pub use wgpu::SurfaceError;
