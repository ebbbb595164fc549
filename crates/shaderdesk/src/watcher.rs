use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

const POLL_INTERVAL: Duration = Duration::from_millis(150);

/// The editor scratch file and its change-event stream.
///
/// The text-editing widget is an external collaborator: any editor that can
/// write a file works. A polling worker turns writes into content-change
/// events, delivered over a channel and drained on the event thread. The
/// poll interval coalesces bursts of keystroke saves naturally.
pub struct EditorFile {
    path: PathBuf,
    events: Receiver<String>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    contents: String,
}

impl EditorFile {
    /// Opens (creating if needed) the scratch file and starts the watcher.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            fs::write(&path, "")
                .with_context(|| format!("failed to create editor file {}", path.display()))?;
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read editor file {}", path.display()))?;

        let stop = Arc::new(AtomicBool::new(false));
        let (sender, events) = unbounded();
        let worker = thread::Builder::new()
            .name("shaderdesk-editor-watch".into())
            .spawn({
                let path = path.clone();
                let stop = stop.clone();
                let last_seen = contents.clone();
                move || watch_loop(&path, &stop, &sender, last_seen)
            })
            .context("failed to spawn editor watcher thread")?;

        Ok(Self {
            path,
            events,
            stop,
            worker: Some(worker),
            contents,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last known contents, tracking both programmatic sets and drained events.
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Programmatically replaces the editor contents (writes the file).
    pub fn set_contents(&mut self, text: &str) -> Result<()> {
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write editor file {}", self.path.display()))?;
        self.contents = text.to_string();
        Ok(())
    }

    /// Drains pending content-change events, oldest first.
    pub fn drain_changes(&mut self) -> Vec<String> {
        let changes: Vec<String> = self.events.try_iter().collect();
        if let Some(latest) = changes.last() {
            self.contents = latest.clone();
        }
        changes
    }
}

impl Drop for EditorFile {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn watch_loop(path: &Path, stop: &AtomicBool, sender: &Sender<String>, mut last_seen: String) {
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(POLL_INTERVAL);
        match fs::read_to_string(path) {
            Ok(text) if text != last_seen => {
                last_seen = text.clone();
                if sender.send(text).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            // Editors replace files non-atomically; a transient read failure
            // resolves on the next poll.
            Err(err) => tracing::debug!(error = %err, "editor file momentarily unreadable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn wait_for_changes(editor: &mut EditorFile) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut changes = Vec::new();
        while changes.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
            changes.extend(editor.drain_changes());
        }
        changes
    }

    #[test]
    fn external_writes_become_change_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scratch.frag");
        let mut editor = EditorFile::open(&path).expect("open editor file");

        fs::write(&path, "void main() { gl_FragColor = vec4(1.0); }").expect("external write");
        let changes = wait_for_changes(&mut editor);

        assert_eq!(
            changes.last().map(String::as_str),
            Some("void main() { gl_FragColor = vec4(1.0); }")
        );
        assert_eq!(editor.contents(), "void main() { gl_FragColor = vec4(1.0); }");
    }

    #[test]
    fn open_creates_a_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fresh.frag");
        let editor = EditorFile::open(&path).expect("open editor file");
        assert!(path.exists());
        assert_eq!(editor.contents(), "");
    }

    #[test]
    fn set_contents_round_trips_through_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scratch.frag");
        let mut editor = EditorFile::open(&path).expect("open editor file");

        editor.set_contents("uniform float q;").expect("set contents");
        assert_eq!(editor.contents(), "uniform float q;");
        assert_eq!(
            fs::read_to_string(&path).expect("read back"),
            "uniform float q;"
        );
    }
}
