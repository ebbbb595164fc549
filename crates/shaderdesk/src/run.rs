use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use renderer::{ExportRequest, ParameterRegistry, RenderEngine};
use shaderstore::{ShaderStoreClient, StoreConfig};
use tracing_subscriber::EnvFilter;
use winit::dpi::PhysicalSize;

use crate::cli::RunArgs;
use crate::preview::{self, PreviewConfig};
use crate::session;
use crate::watcher::EditorFile;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Runs the interactive preview.
pub fn run(args: RunArgs) -> Result<()> {
    let store = build_client(&args)?;
    let (vertex_source, shader_name, fragment) = load_initial_shaders(&store, &args)?;

    let editor = EditorFile::open(&args.editor_file)?;
    tracing::info!(
        editor = %editor.path().display(),
        service = %args.service_url,
        "starting shaderdesk preview"
    );

    preview::run(
        store,
        editor,
        vertex_source,
        fragment,
        shader_name,
        PreviewConfig {
            surface_size: args.size,
            antialiasing: args.antialias,
            export: ExportRequest::new(args.duration, args.fps),
            output: args.output,
            save_name: args.name,
        },
    )
}

/// Renders a deterministic export without opening a window.
pub fn run_export(args: RunArgs) -> Result<()> {
    let store = build_client(&args)?;
    let (vertex_source, shader_name, fragment) = load_initial_shaders(&store, &args)?;

    let mut engine = RenderEngine::offscreen(
        PhysicalSize::new(args.size.0, args.size.1),
        &vertex_source,
        args.antialias,
    )?;
    engine
        .set_fragment_source(&fragment)
        .map_err(|err| anyhow!("shader failed to compile: {err}"))?;

    let request = ExportRequest::new(args.duration, args.fps);
    let registry = ParameterRegistry::new();
    let output = args.output.unwrap_or_else(default_output_path);
    tracing::info!(
        shader = %shader_name,
        duration = request.duration_seconds,
        fps = request.fps,
        frames = request.frame_count(),
        "starting headless export"
    );

    let path = session::capture_and_submit(&mut engine, &store, request, registry.values(), &output)?;
    tracing::info!(path = %path.display(), "export complete");
    Ok(())
}

fn build_client(args: &RunArgs) -> Result<ShaderStoreClient> {
    let config = StoreConfig::new(&args.service_url)
        .context("invalid shader service configuration")?;
    ShaderStoreClient::new(config).context("failed to construct shader service client")
}

/// Fetches the default shader stages, or a saved shader when `--load` is set.
///
/// This is the one startup fetch: the surface has nothing to render without
/// it, so failure here is fatal rather than a banner-level error.
fn load_initial_shaders(
    store: &ShaderStoreClient,
    args: &RunArgs,
) -> Result<(String, String, String)> {
    let vertex_source = store
        .fetch_default_vertex()
        .context("failed to fetch the default vertex shader")?;

    let (shader_name, fragment) = match args.load {
        Some(id) => {
            let shader = store
                .fetch_shader(id)
                .with_context(|| format!("failed to load shader {id}"))?;
            (shader.name, shader.code)
        }
        None => {
            let fragment = store
                .fetch_default_fragment()
                .context("failed to fetch the default fragment shader")?;
            ("Untitled".to_string(), fragment)
        }
    };

    Ok((vertex_source, shader_name, fragment))
}

pub(crate) fn default_output_path() -> PathBuf {
    PathBuf::from(format!(
        "shader_{}.mp4",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}
