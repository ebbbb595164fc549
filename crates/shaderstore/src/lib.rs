//! Client for the shader service Shaderdesk talks to.
//!
//! One base URL hosts three collaborators the viewer depends on: the static
//! default shader assets fetched once at startup, the named shader store
//! (create / list / fetch-by-id), and the video encoding endpoint that turns
//! a captured frame sequence into a downloadable artifact. All calls are
//! blocking and carry enough context for the caller's error surface.

mod remote;

pub use remote::{SavedShader, ShaderStoreClient, ShaderSummary, StoreConfig};
