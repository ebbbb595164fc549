use std::borrow::Cow;

use thiserror::Error;
use wgpu::naga;
use wgpu::naga::ShaderStage;

/// Uniform names reserved by the viewer contract. User declarations of these
/// are stripped so the injected uniform block is the single source of truth.
const CONTRACT_UNIFORMS: [&str; 7] = [
    "r",
    "t",
    "speed",
    "hue_shift",
    "saturation",
    "brightness",
    "shape_scale",
];

/// Compile or validation failure for user-supplied shader source.
///
/// The payload is the rendered compiler diagnostic, suitable for showing to
/// the author verbatim.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to parse shader:\n{0}")]
    Parse(String),

    #[error("shader failed validation:\n{0}")]
    Validate(String),
}

impl CompileError {
    /// The diagnostic text without the surrounding phrasing.
    pub fn diagnostic(&self) -> &str {
        match self {
            CompileError::Parse(message) | CompileError::Validate(message) => message,
        }
    }
}

/// Compiles the externally-loaded vertex stage.
///
/// The vertex source is fetched once at startup and reused for every
/// fragment swap, so a failure here is a startup error rather than an
/// editing error.
pub(crate) fn compile_vertex_shader(
    device: &wgpu::Device,
    source: &str,
) -> Result<wgpu::ShaderModule, CompileError> {
    let prepared = prepare_vertex_source(source);
    validate_glsl(&prepared, ShaderStage::Vertex)?;

    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(prepared),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    }))
}

/// Wraps the user fragment with the uniform-contract prelude and compiles it.
///
/// Validation runs through naga's GLSL front-end before the module is handed
/// to the device, so a broken edit surfaces here as a [`CompileError`] with
/// the compiler's diagnostic instead of tearing down the device. The wrapped
/// source is dumped to `/tmp/shaderdesk_wrapped.frag` to aid debugging.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    source: &str,
) -> Result<wgpu::ShaderModule, CompileError> {
    let wrapped = wrap_fragment(source);

    if let Err(err) = std::fs::write("/tmp/shaderdesk_wrapped.frag", &wrapped) {
        tracing::debug!(error = %err, "failed to dump wrapped shader");
    }

    validate_glsl(&wrapped, ShaderStage::Fragment)?;

    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("shaderdesk fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrapped),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    }))
}

/// Parses and validates GLSL, rendering any failure into diagnostic text.
pub(crate) fn validate_glsl(source: &str, stage: ShaderStage) -> Result<(), CompileError> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(stage);
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| CompileError::Parse(errors.emit_to_string(source)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| CompileError::Validate(err.emit_to_string(source)))?;

    Ok(())
}

/// Produces a self-contained Vulkan GLSL fragment shader from user source.
///
/// Steps performed:
///
/// 1. Strip `#version`/`precision` directives and declarations of contract
///    uniforms so the injected definitions win.
/// 2. Rename the user's `main` so the epilogue owns the real entry point.
/// 3. Prepend [`HEADER`] which declares the output, the uniform block, and
///    macro aliases for the contract names.
/// 4. Append [`FOOTER`] which remaps `gl_FragCoord` to a bottom-left origin
///    and delegates to the renamed user entry.
pub(crate) fn wrap_fragment(source: &str) -> String {
    let mut sanitized = String::new();
    let mut skipped_version = false;
    for line in source.lines() {
        let trimmed = line.trim_start();
        if !skipped_version && trimmed.starts_with("#version") {
            skipped_version = true;
            continue;
        }
        if trimmed.starts_with("precision ") {
            continue;
        }
        if declares_contract_uniform(trimmed) {
            continue;
        }
        sanitized.push_str(line);
        sanitized.push('\n');
    }

    let sanitized = sanitized.replacen("void main", "void shaderdesk_entry", 1);

    format!("{HEADER}\n#line 1\n{sanitized}{FOOTER}")
}

fn declares_contract_uniform(trimmed_line: &str) -> bool {
    let Some(declaration) = trimmed_line.strip_prefix("uniform ") else {
        return false;
    };
    declaration
        .trim_end()
        .trim_end_matches(';')
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|token| !token.is_empty())
        .any(|token| CONTRACT_UNIFORMS.contains(&token))
}

/// Normalizes the fetched vertex source so naga sees Vulkan GLSL.
fn prepare_vertex_source(source: &str) -> String {
    if source
        .lines()
        .any(|line| line.trim_start().starts_with("#version"))
    {
        source.to_string()
    } else {
        format!("#version 450\n{source}")
    }
}

/// GLSL prologue injected ahead of every user fragment shader.
///
/// The uniform block layout must match `ViewerUniforms` in `gpu/uniforms.rs`
/// and observes std140 rules: a vec2 followed by seven scalars packs into 32
/// bytes with no padding holes.
const HEADER: &str = r"#version 450
layout(location = 0) out vec4 shaderdesk_fragColor;
#define gl_FragColor shaderdesk_fragColor

layout(std140, set = 0, binding = 0) uniform ViewerParams {
    vec2 _r;
    float _t;
    float _speed;
    float _hue_shift;
    float _saturation;
    float _brightness;
    float _shape_scale;
} ubo;

// Map contract names to UBO fields via macros to avoid name clashes.
#define r ubo._r
#define t ubo._t
#define speed ubo._speed
#define hue_shift ubo._hue_shift
#define saturation ubo._saturation
#define brightness ubo._brightness
#define shape_scale ubo._shape_scale

vec4 shaderdesk_gl_FragCoord;
#define gl_FragCoord shaderdesk_gl_FragCoord
";

/// GLSL epilogue that remaps coordinates and delegates to the user entry.
const FOOTER: &str = r"void main() {
    // Capture the real builtin gl_FragCoord, then remap to a bottom-left
    // origin. The macro is temporarily undefined so the hardware builtin is
    // readable.
    #undef gl_FragCoord
    vec2 builtinFC = vec2(gl_FragCoord.x, gl_FragCoord.y);
    #define gl_FragCoord shaderdesk_gl_FragCoord

    vec2 fragCoord = vec2(builtinFC.x, r.y - builtinFC.y);
    shaderdesk_gl_FragCoord = vec4(fragCoord, 0.0, 1.0);

    shaderdesk_entry();
}
";

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_VERTEX: &str = r"#version 450
const vec2 positions[6] = vec2[6](
    vec2(-1.0, -1.0),
    vec2(1.0, -1.0),
    vec2(1.0, 1.0),
    vec2(-1.0, -1.0),
    vec2(1.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    gl_Position = vec4(positions[vertex_index], 0.0, 1.0);
}
";

    const WAVE_FRAGMENT: &str = r"
uniform float t;
uniform vec2 r;
uniform float speed;

void main() {
    vec2 uv = gl_FragCoord.xy / r;
    float wave = 0.5 + 0.5 * sin(t * speed + uv.x * shape_scale * 6.2831);
    vec3 color = vec3(wave + hue_shift, uv.y * saturation, wave) * brightness;
    gl_FragColor = vec4(color, 1.0);
}
";

    #[test]
    fn wrap_strips_contract_uniforms_and_version() {
        let source = "#version 300 es\nprecision mediump float;\nuniform float t;\nuniform vec2 r;\nuniform float intensity;\nvoid main() { gl_FragColor = vec4(intensity); }\n";
        let wrapped = wrap_fragment(source);

        assert!(!wrapped.contains("#version 300 es"));
        assert!(!wrapped.contains("precision mediump"));
        assert!(!wrapped.contains("uniform float t;"));
        assert!(!wrapped.contains("uniform vec2 r;"));
        assert!(wrapped.contains("uniform float intensity;"));
    }

    #[test]
    fn wrap_renames_user_entry_point() {
        let wrapped = wrap_fragment("void main() { gl_FragColor = vec4(1.0); }");
        assert!(wrapped.contains("void shaderdesk_entry()"));
        assert!(wrapped.contains("shaderdesk_entry();"));
    }

    #[test]
    fn uniform_stripping_matches_whole_names_only() {
        assert!(declares_contract_uniform("uniform float t;"));
        assert!(declares_contract_uniform("uniform vec2 r;"));
        assert!(declares_contract_uniform("uniform float hue_shift;"));
        // `time` contains `t` but declares a different uniform.
        assert!(!declares_contract_uniform("uniform float time;"));
        assert!(!declares_contract_uniform("uniform vec2 resolution;"));
        assert!(!declares_contract_uniform("float t = 0.0;"));
    }

    #[test]
    fn wrapped_fragment_passes_validation() {
        let wrapped = wrap_fragment(WAVE_FRAGMENT);
        validate_glsl(&wrapped, ShaderStage::Fragment).expect("wrapped fragment should validate");
    }

    #[test]
    fn quad_vertex_passes_validation() {
        let prepared = prepare_vertex_source(QUAD_VERTEX);
        validate_glsl(&prepared, ShaderStage::Vertex).expect("vertex stage should validate");
    }

    #[test]
    fn invalid_fragment_reports_compiler_diagnostic() {
        let wrapped = wrap_fragment("void main() { gl_FragColor = banana; }");
        let err = validate_glsl(&wrapped, ShaderStage::Fragment)
            .expect_err("undefined identifier should fail");
        assert!(!err.diagnostic().is_empty());
    }

    #[test]
    fn vertex_source_without_version_gains_one() {
        let prepared = prepare_vertex_source("void main() { gl_Position = vec4(0.0); }");
        assert!(prepared.starts_with("#version 450"));
    }
}
