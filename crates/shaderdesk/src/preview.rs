use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use renderer::{Antialiasing, ExportRequest, RenderEngine, PARAMETER_SPECS};
use shaderstore::ShaderStoreClient;
use tracing::{error, info};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::session::ViewerSession;
use crate::watcher::EditorFile;

/// Everything the interactive boundary needs besides the session itself.
pub struct PreviewConfig {
    pub surface_size: (u32, u32),
    pub antialiasing: Antialiasing,
    pub export: ExportRequest,
    pub output: Option<PathBuf>,
    pub save_name: String,
}

/// Opens the preview window and drives the winit event loop.
///
/// The loop is the single mutation context for session state: editor change
/// events are drained and applied right before each render tick, keyboard
/// input maps onto named session operations, and resize events flow through
/// to the engine between frames.
pub fn run(
    store: ShaderStoreClient,
    editor: EditorFile,
    vertex_source: String,
    initial_fragment: String,
    shader_name: String,
    config: PreviewConfig,
) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title("Shaderdesk")
        .with_inner_size(window_size)
        .build(&event_loop)
        .context("failed to create preview window")?;
    let window = Arc::new(window);

    let engine = RenderEngine::for_window(
        window.as_ref(),
        window.inner_size(),
        &vertex_source,
        config.antialiasing,
    )?;
    let mut session = ViewerSession::new(engine, store, editor, shader_name, initial_fragment)?;

    for spec in &PARAMETER_SPECS {
        info!(
            parameter = spec.name,
            value = %format!("{:.1}", spec.default),
            "control ready"
        );
    }

    let mut selected_param: usize = 0;
    let mut last_title = String::new();
    let export_request = config.export;
    let output = config.output;
    let save_name = config.save_name;

    window.request_redraw();

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::WindowEvent { window_id, event } if window_id == window.id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            elwt.exit();
                        }
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.state == ElementState::Pressed && !event.repeat {
                                handle_key(
                                    &event.logical_key,
                                    &mut session,
                                    &mut selected_param,
                                    export_request,
                                    output.as_deref(),
                                    &save_name,
                                );
                            }
                        }
                        WindowEvent::Resized(new_size) => {
                            session.resize(new_size);
                        }
                        WindowEvent::ScaleFactorChanged {
                            mut inner_size_writer,
                            ..
                        } => {
                            // Keep the current logical size when the scale factor changes.
                            let _ = inner_size_writer.request_inner_size(window.inner_size());
                        }
                        WindowEvent::RedrawRequested => {
                            for text in session.drain_editor_changes() {
                                session.handle_editor_changed(text);
                            }

                            match session.render_tick(Instant::now()) {
                                Ok(()) => {}
                                Err(renderer::SurfaceError::Lost)
                                | Err(renderer::SurfaceError::Outdated) => {
                                    session.resize(window.inner_size());
                                }
                                Err(renderer::SurfaceError::OutOfMemory) => {
                                    error!("surface out of memory; exiting preview");
                                    elwt.exit();
                                }
                                Err(renderer::SurfaceError::Timeout) => {
                                    error!("surface timeout; retrying next frame");
                                }
                                Err(other) => {
                                    error!("surface error: {other:?}; retrying next frame");
                                }
                            }

                            let title = session.window_title();
                            if title != last_title {
                                window.set_title(&title);
                                last_title = title;
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    // Schedule the next frame once winit is about to wait again.
                    window.request_redraw();
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop error: {err}"))
}

fn handle_key(
    key: &Key,
    session: &mut ViewerSession,
    selected_param: &mut usize,
    export_request: ExportRequest,
    output: Option<&std::path::Path>,
    save_name: &str,
) {
    let now = Instant::now();
    match key {
        Key::Named(NamedKey::Space) => session.toggle_play_pause(now),
        Key::Named(NamedKey::ArrowUp) => adjust_selected(session, *selected_param, 1.0),
        Key::Named(NamedKey::ArrowDown) => adjust_selected(session, *selected_param, -1.0),
        Key::Character(value) => match value.as_str() {
            "r" => session.reset(now),
            "e" => {
                let path = output
                    .map(|path| path.to_path_buf())
                    .unwrap_or_else(crate::run::default_output_path);
                session.export(export_request, path, now);
            }
            "s" => session.save(save_name),
            "l" => {
                if let Some(listing) = session.list() {
                    if listing.is_empty() {
                        info!("no shaders saved yet");
                    }
                    for entry in listing {
                        info!(id = entry.id, name = %entry.name, "saved shader");
                    }
                }
            }
            " " => session.toggle_play_pause(now),
            digit @ ("1" | "2" | "3" | "4" | "5") => {
                let index = digit.parse::<usize>().expect("digit key") - 1;
                *selected_param = index;
                let spec = &PARAMETER_SPECS[index];
                info!(
                    parameter = spec.name,
                    value = %session.parameter_display(spec.name).unwrap_or_default(),
                    "parameter selected"
                );
            }
            _ => {}
        },
        _ => {}
    }
}

fn adjust_selected(session: &mut ViewerSession, selected_param: usize, direction: f32) {
    let spec = &PARAMETER_SPECS[selected_param];
    if let Some(current) = session.parameter(spec.name) {
        session.set_parameter(spec.name, current + direction * spec.step);
    }
}
