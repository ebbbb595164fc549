use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use renderer::{
    capture_frames, ExportRequest, ParameterRegistry, ParameterValues, PlaybackClock,
    RenderEngine, TimeSample,
};
use shaderstore::{ShaderStoreClient, ShaderSummary};
use winit::dpi::PhysicalSize;

use crate::watcher::EditorFile;

/// Classification for the shared error surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Compile,
    Persistence,
    Export,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Compile => "compile error",
            ErrorKind::Persistence => "persistence error",
            ErrorKind::Export => "export error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

/// The one user-visible error surface.
///
/// Showing a new report always supersedes the previous one; successful
/// operations clear it.
#[derive(Debug, Default)]
pub struct ErrorBanner {
    current: Option<ErrorReport>,
}

impl ErrorBanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, kind: ErrorKind, message: String) {
        self.current = Some(ErrorReport { kind, message });
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&ErrorReport> {
        self.current.as_ref()
    }
}

/// Collapses a multi-line diagnostic to something a title bar can carry.
pub fn summarize(message: &str) -> &str {
    message.lines().find(|line| !line.trim().is_empty()).unwrap_or("")
}

/// The one render/editor session for the process.
///
/// Owns the engine, parameter registry, playback clock, service client,
/// editor file, and error surface; the host (preview loop or headless
/// export) delivers named UI actions as plain method calls. All state
/// mutation happens on the host's event thread.
pub struct ViewerSession {
    engine: RenderEngine,
    registry: ParameterRegistry,
    clock: PlaybackClock,
    store: ShaderStoreClient,
    editor: EditorFile,
    banner: ErrorBanner,
    shader_name: String,
    current_source: String,
    dirty: bool,
    exporting: bool,
}

impl ViewerSession {
    /// Wires up a session around an initialized engine.
    ///
    /// The initial fragment is written into the editor file and compiled;
    /// a compile failure of the fetched default is an ordinary recoverable
    /// error (the banner shows it and editing can begin), not a startup
    /// failure.
    pub fn new(
        engine: RenderEngine,
        store: ShaderStoreClient,
        mut editor: EditorFile,
        shader_name: String,
        initial_fragment: String,
    ) -> Result<Self> {
        editor
            .set_contents(&initial_fragment)
            .context("failed to seed the editor file")?;

        let mut session = Self {
            engine,
            registry: ParameterRegistry::new(),
            clock: PlaybackClock::new(Instant::now()),
            store,
            editor,
            banner: ErrorBanner::new(),
            shader_name,
            current_source: String::new(),
            dirty: false,
            exporting: false,
        };
        session.apply_source(&initial_fragment);
        session.dirty = false;
        Ok(session)
    }

    pub fn parameter(&self, name: &str) -> Option<f32> {
        self.registry.get(name)
    }

    pub fn parameter_display(&self, name: &str) -> Option<String> {
        self.registry.display_value(name)
    }

    /// Drains pending editor change events for the host to feed back in.
    pub fn drain_editor_changes(&mut self) -> Vec<String> {
        self.editor.drain_changes()
    }

    /// Reacts to one editor content-change event.
    ///
    /// Events matching the currently compiled source (our own programmatic
    /// writes echoed back by the watcher) are ignored so they neither mark
    /// the session dirty nor recompile.
    pub fn handle_editor_changed(&mut self, text: String) {
        if text == self.current_source {
            return;
        }
        self.dirty = true;
        self.apply_source(&text);
    }

    fn apply_source(&mut self, text: &str) {
        match self.engine.set_fragment_source(text) {
            Ok(()) => {
                self.current_source = text.to_string();
                self.banner.clear();
                tracing::debug!("shader recompiled and swapped");
            }
            Err(err) => {
                tracing::warn!(diagnostic = err.diagnostic(), "shader compile failed");
                self.banner.show(ErrorKind::Compile, err.to_string());
            }
        }
    }

    /// Writes one parameter; the value takes effect on the next render tick.
    pub fn set_parameter(&mut self, name: &str, value: f32) -> Option<f32> {
        let applied = self.registry.set(name, value)?;
        tracing::info!(parameter = name, value = %format!("{applied:.1}"), "parameter updated");
        Some(applied)
    }

    pub fn toggle_play_pause(&mut self, now: Instant) {
        self.clock.toggle(now);
        tracing::info!(playing = self.clock.is_playing(), "playback toggled");
    }

    /// Full reset: parameters to defaults, elapsed time to zero, playback
    /// state untouched, plus one immediate re-render so the effect is
    /// visible even while paused.
    pub fn reset(&mut self, now: Instant) {
        self.registry.reset_all();
        self.clock.reset(now);
        if let Err(err) = self
            .engine
            .render_frame(TimeSample::new(0.0, 0), self.registry.values())
        {
            tracing::warn!(error = ?err, "reset re-render failed; retrying next frame");
        }
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.engine.resize(new_size);
    }

    /// Renders one live frame at the clock's current time.
    pub fn render_tick(&mut self, now: Instant) -> Result<(), renderer::SurfaceError> {
        let sample = self.clock.tick(now);
        self.engine.render_frame(sample, self.registry.values())
    }

    /// Persists the editor contents under `name`.
    ///
    /// Local editor state is unaffected by failure; in-progress edits are
    /// never lost to a persistence error.
    pub fn save(&mut self, name: &str) {
        let code = self.editor.contents().to_string();
        match self.store.create_shader(name, &code) {
            Ok(saved) => {
                tracing::info!(id = saved.id, name = %saved.name, "shader saved");
                self.shader_name = saved.name;
                self.dirty = false;
                self.banner.clear();
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "save failed");
                self.banner.show(ErrorKind::Persistence, format!("{err:#}"));
            }
        }
    }

    /// Loads a saved shader: both the editor contents and the active
    /// program take the stored code, and the session is marked saved.
    pub fn load(&mut self, id: i64) {
        let shader = match self.store.fetch_shader(id) {
            Ok(shader) => shader,
            Err(err) => {
                tracing::error!(id, error = %format!("{err:#}"), "load failed");
                self.banner.show(ErrorKind::Persistence, format!("{err:#}"));
                return;
            }
        };

        if let Err(err) = self.editor.set_contents(&shader.code) {
            self.banner.show(ErrorKind::Persistence, format!("{err:#}"));
            return;
        }
        self.apply_source(&shader.code);
        self.shader_name = shader.name;
        self.dirty = false;
        tracing::info!(id, name = %self.shader_name, "shader loaded");
    }

    /// Fetches the saved-shader listing.
    pub fn list(&mut self) -> Option<Vec<ShaderSummary>> {
        match self.store.list_shaders() {
            Ok(listing) => {
                self.banner.clear();
                Some(listing)
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "list failed");
                self.banner.show(ErrorKind::Persistence, format!("{err:#}"));
                None
            }
        }
    }

    /// Runs one export job and writes the encoded video to `output`.
    ///
    /// The capture always starts from `t = 0` regardless of what the live
    /// preview was showing, and the pre-export playing/paused state is
    /// restored unconditionally, so a failed or rejected export never
    /// leaves playback permanently paused.
    pub fn export(&mut self, request: ExportRequest, output: PathBuf, now: Instant) -> Option<PathBuf> {
        if self.exporting {
            self.banner.show(
                ErrorKind::Export,
                "an export is already in flight".to_string(),
            );
            return None;
        }
        self.exporting = true;

        let was_playing = self.clock.is_playing();
        self.clock.pause(now);
        self.clock.reset(now);

        let params = self.registry.values();
        let result = capture_and_submit(&mut self.engine, &self.store, request, params, &output);

        if was_playing {
            self.clock.resume(Instant::now());
        }
        self.exporting = false;

        match result {
            Ok(path) => {
                tracing::info!(path = %path.display(), "export complete");
                self.banner.clear();
                Some(path)
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "export failed");
                self.banner.show(ErrorKind::Export, format!("{err:#}"));
                None
            }
        }
    }

    /// Title-bar status: shader name, dirty marker, and any active error.
    pub fn window_title(&self) -> String {
        let mut title = format!("Shaderdesk - {}", self.shader_name);
        if self.dirty {
            title.push('*');
        }
        if let Some(report) = self.banner.current() {
            title.push_str("  [");
            title.push_str(report.kind.label());
            title.push_str("] ");
            title.push_str(summarize(&report.message));
        }
        title
    }
}

/// Capture, submit for encoding, and write the artifact to disk.
///
/// Shared by the interactive export action and the headless subcommand.
pub fn capture_and_submit(
    engine: &mut RenderEngine,
    store: &ShaderStoreClient,
    request: ExportRequest,
    params: ParameterValues,
    output: &Path,
) -> Result<PathBuf> {
    let captured = capture_frames(engine, request, params, |done, total| {
        if done % 30 == 0 || done == total {
            tracing::info!(done, total, "capturing frames");
        }
    })?;
    let video = store.submit_export(&captured.frames, captured.fps, captured.duration_seconds)?;
    std::fs::write(output, &video)
        .with_context(|| format!("failed to write exported video to {}", output.display()))?;
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_new_report_supersedes_the_previous_one() {
        let mut banner = ErrorBanner::new();
        banner.show(ErrorKind::Compile, "unknown identifier".to_string());
        banner.show(ErrorKind::Export, "encoding rejected".to_string());

        let report = banner.current().expect("banner should be visible");
        assert_eq!(report.kind, ErrorKind::Export);
        assert_eq!(report.message, "encoding rejected");
    }

    #[test]
    fn clear_hides_the_banner() {
        let mut banner = ErrorBanner::new();
        banner.show(ErrorKind::Persistence, "service unreachable".to_string());
        assert!(banner.current().is_some());
        banner.clear();
        assert!(banner.current().is_none());
    }

    #[test]
    fn summarize_keeps_the_first_meaningful_line() {
        assert_eq!(summarize("line one\nline two"), "line one");
        assert_eq!(summarize("\n  \nerror: bad token\ncontext"), "error: bad token");
        assert_eq!(summarize(""), "");
    }

    #[test]
    fn error_kinds_have_stable_labels() {
        assert_eq!(ErrorKind::Compile.label(), "compile error");
        assert_eq!(ErrorKind::Persistence.label(), "persistence error");
        assert_eq!(ErrorKind::Export.label(), "export error");
    }
}
