//! GPU orchestration for the viewer.
//!
//! - `context` owns wgpu instance/device/surface wiring for both the
//!   windowed preview and headless capture, and knows how to reconfigure
//!   the swapchain when the host resizes.
//! - `pipeline` compiles wrapped GLSL into render pipelines sharing one
//!   uniform bind-group layout and a fixed vertex stage.
//! - `uniforms` mirrors the injected uniform block and writes changes
//!   through the queue each frame.
//! - `state` glues everything together and exposes the `RenderEngine` API
//!   used by the session: atomic program swap, per-frame draw, and the
//!   padded-readback capture path for export.

mod context;
mod pipeline;
mod state;
mod uniforms;

pub use state::{FramePixels, RenderEngine};
