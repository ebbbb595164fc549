use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::{Antialiasing, MAX_EXPORT_SECONDS, MIN_EXPORT_SECONDS};

#[derive(Parser, Debug)]
#[command(
    name = "shaderdesk",
    author,
    version,
    about = "Live GLSL authoring, preview, and export",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Base URL of the shader service.
    #[arg(
        long,
        global = true,
        env = "SHADERDESK_SERVICE_URL",
        value_name = "URL",
        default_value = "http://127.0.0.1:5000"
    )]
    pub service_url: String,

    /// Scratch file watched for live shader edits.
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        default_value = "shaderdesk.frag"
    )]
    pub editor_file: PathBuf,

    /// Load a saved shader by id at startup instead of the default.
    #[arg(long, global = true, value_name = "ID")]
    pub load: Option<i64>,

    /// Name used when saving the current shader.
    #[arg(long, global = true, value_name = "NAME", default_value = "Untitled")]
    pub name: String,

    /// Render resolution (e.g. `1280x720`).
    #[arg(
        long,
        global = true,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_surface_size,
        default_value = "1280x720"
    )]
    pub size: (u32, u32),

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(
        long,
        global = true,
        value_name = "MODE",
        value_parser = parse_antialias,
        default_value = "auto"
    )]
    pub antialias: Antialiasing,

    /// Export duration in seconds (bounded to 2-10).
    #[arg(
        long,
        global = true,
        value_name = "SECONDS",
        value_parser = parse_export_duration,
        default_value = "4"
    )]
    pub duration: u32,

    /// Export frame rate.
    #[arg(
        long,
        global = true,
        value_name = "FPS",
        value_parser = parse_export_fps,
        default_value = "30"
    )]
    pub fps: u32,

    /// Destination for exported video (defaults to a timestamped file).
    #[arg(long, global = true, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a deterministic export headlessly and exit.
    Export,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT (e.g. 1280x720)".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{width}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{height}'"))?;
    if width == 0 || height == 0 {
        return Err("surface size must be non-zero".to_string());
    }
    Ok((width, height))
}

fn parse_antialias(value: &str) -> Result<Antialiasing, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "auto" => Ok(Antialiasing::Auto),
        "off" | "none" | "1" => Ok(Antialiasing::Off),
        other => other
            .parse::<u32>()
            .map(Antialiasing::Samples)
            .map_err(|_| "expected auto, off, or a sample count (e.g. 4)".to_string()),
    }
}

/// Export duration is validated here, before any export job exists.
fn parse_export_duration(value: &str) -> Result<u32, String> {
    let seconds: u32 = value
        .parse()
        .map_err(|_| "duration must be a whole number of seconds".to_string())?;
    if !(MIN_EXPORT_SECONDS..=MAX_EXPORT_SECONDS).contains(&seconds) {
        return Err(format!(
            "duration must be between {MIN_EXPORT_SECONDS} and {MAX_EXPORT_SECONDS} seconds"
        ));
    }
    Ok(seconds)
}

fn parse_export_fps(value: &str) -> Result<u32, String> {
    let fps: u32 = value
        .parse()
        .map_err(|_| "fps must be a positive whole number".to_string())?;
    if fps == 0 {
        return Err("fps must be positive".to_string());
    }
    Ok(fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_outside_bounds_are_rejected_before_parsing_finishes() {
        assert!(Cli::try_parse_from(["shaderdesk", "--duration", "1"]).is_err());
        assert!(Cli::try_parse_from(["shaderdesk", "--duration", "11"]).is_err());
        assert!(Cli::try_parse_from(["shaderdesk", "--duration", "2"]).is_ok());
        assert!(Cli::try_parse_from(["shaderdesk", "--duration", "10"]).is_ok());
        assert!(Cli::try_parse_from(["shaderdesk", "export", "--duration", "12"]).is_err());
    }

    #[test]
    fn fps_must_be_a_positive_integer() {
        assert!(Cli::try_parse_from(["shaderdesk", "--fps", "0"]).is_err());
        assert!(Cli::try_parse_from(["shaderdesk", "--fps", "23.9"]).is_err());
        let cli = Cli::try_parse_from(["shaderdesk", "--fps", "60"]).expect("valid fps");
        assert_eq!(cli.run.fps, 60);
    }

    #[test]
    fn surface_size_parses_width_and_height() {
        let cli = Cli::try_parse_from(["shaderdesk", "--size", "1920x1080"]).expect("valid size");
        assert_eq!(cli.run.size, (1920, 1080));
        assert!(Cli::try_parse_from(["shaderdesk", "--size", "1920"]).is_err());
        assert!(Cli::try_parse_from(["shaderdesk", "--size", "0x720"]).is_err());
    }

    #[test]
    fn antialias_accepts_auto_off_and_counts() {
        let cli = Cli::try_parse_from(["shaderdesk", "--antialias", "4"]).expect("valid msaa");
        assert_eq!(cli.run.antialias, Antialiasing::Samples(4));
        let cli = Cli::try_parse_from(["shaderdesk", "--antialias", "off"]).expect("off");
        assert_eq!(cli.run.antialias, Antialiasing::Off);
        assert!(Cli::try_parse_from(["shaderdesk", "--antialias", "fancy"]).is_err());
    }

    #[test]
    fn export_subcommand_accepts_global_flags() {
        let cli = Cli::try_parse_from([
            "shaderdesk",
            "export",
            "--duration",
            "3",
            "--fps",
            "24",
            "--output",
            "out.mp4",
        ])
        .expect("export invocation should parse");
        assert!(matches!(cli.command, Some(Command::Export)));
        assert_eq!(cli.run.duration, 3);
        assert_eq!(cli.run.fps, 24);
        assert_eq!(cli.run.output.as_deref(), Some(std::path::Path::new("out.mp4")));
    }
}
