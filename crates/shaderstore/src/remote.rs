use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Connection settings for the shader service.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base: Url,
}

impl StoreConfig {
    pub fn new(base: impl AsRef<str>) -> Result<Self> {
        let base = base.as_ref().trim();
        if base.is_empty() {
            bail!("shader service URL must not be empty");
        }
        let base = Url::parse(base).with_context(|| format!("invalid service URL '{base}'"))?;
        if base.cannot_be_a_base() {
            bail!("shader service URL '{base}' cannot be used as a base");
        }
        Ok(Self { base })
    }
}

/// Blocking HTTP client for the shader service.
///
/// The service plays three roles behind one base URL: static shader assets
/// (the default vertex/fragment sources fetched once at startup), the named
/// shader store, and the video encoding endpoint. Non-2xx responses surface
/// as recoverable errors with the request URL attached.
#[derive(Debug, Clone)]
pub struct ShaderStoreClient {
    http: Client,
    config: StoreConfig,
}

/// A shader record owned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedShader {
    pub id: i64,
    pub name: String,
    pub code: String,
}

/// One row of the saved-shader listing, ordered by creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
struct CreateShaderRequest<'a> {
    name: &'a str,
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct ExportSubmission<'a> {
    frames: &'a [String],
    fps: u32,
    duration: u32,
}

impl ShaderStoreClient {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self { http, config })
    }

    /// Fetches the default vertex source served by the asset endpoint.
    pub fn fetch_default_vertex(&self) -> Result<String> {
        self.fetch_asset_text(&["shaders", "default.vert"])
    }

    /// Fetches the default fragment source served by the asset endpoint.
    pub fn fetch_default_fragment(&self) -> Result<String> {
        self.fetch_asset_text(&["shaders", "default.frag"])
    }

    /// Persists a shader under `name`, returning the stored record.
    pub fn create_shader(&self, name: &str, code: &str) -> Result<SavedShader> {
        let url = self.endpoint(&["api", "shaders"])?;
        let response = self
            .http
            .post(url.clone())
            .json(&CreateShaderRequest { name, code })
            .send()
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .context("shader service rejected the save")?;
        let saved: SavedShader = response
            .json()
            .context("unexpected response while saving shader")?;
        debug!(id = saved.id, name = %saved.name, "saved shader");
        Ok(saved)
    }

    /// Lists stored shaders in creation order.
    pub fn list_shaders(&self) -> Result<Vec<ShaderSummary>> {
        let url = self.endpoint(&["api", "shaders"])?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .context("shader service failed to list shaders")?;
        response
            .json()
            .context("unexpected response while listing shaders")
    }

    /// Fetches one stored shader by id.
    pub fn fetch_shader(&self, id: i64) -> Result<SavedShader> {
        let url = self.endpoint(&["api", "shaders", &id.to_string()])?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .with_context(|| format!("shader service has no shader with id {id}"))?;
        response
            .json()
            .context("unexpected response while loading shader")
    }

    /// Submits captured frames for encoding and returns the video bytes.
    pub fn submit_export(&self, frames: &[String], fps: u32, duration: u32) -> Result<Vec<u8>> {
        let url = self.endpoint(&["api", "export"])?;
        debug!(frames = frames.len(), fps, duration, "submitting export");
        let response = self
            .http
            .post(url.clone())
            .json(&ExportSubmission {
                frames,
                fps,
                duration,
            })
            .send()
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .context("encoding service rejected the export")?;
        let bytes = response
            .bytes()
            .context("failed to read encoded video stream")?;
        Ok(bytes.to_vec())
    }

    fn fetch_asset_text(&self, segments: &[&str]) -> Result<String> {
        let url = self.endpoint(segments)?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .with_context(|| format!("asset {url} is unavailable"))?;
        response.text().context("failed to read asset body")
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow!("invalid shader service base url"))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ShaderStoreClient {
        let config = StoreConfig::new("http://127.0.0.1:5000").expect("valid base url");
        ShaderStoreClient::new(config).expect("client should build")
    }

    #[test]
    fn config_rejects_empty_and_invalid_urls() {
        assert!(StoreConfig::new("").is_err());
        assert!(StoreConfig::new("not a url").is_err());
        assert!(StoreConfig::new("http://localhost:5000").is_ok());
    }

    #[test]
    fn endpoints_join_cleanly_with_and_without_trailing_slash() {
        let client = client();
        let url = client.endpoint(&["api", "shaders", "7"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:5000/api/shaders/7");

        let config = StoreConfig::new("http://127.0.0.1:5000/").unwrap();
        let client = ShaderStoreClient::new(config).unwrap();
        let url = client.endpoint(&["shaders", "default.frag"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:5000/shaders/default.frag");
    }

    #[test]
    fn saved_shader_decodes_service_payload() {
        let json = r#"{"id": 3, "name": "plasma", "code": "void main() {}"}"#;
        let shader: SavedShader = serde_json::from_str(json).expect("payload should decode");
        assert_eq!(shader.id, 3);
        assert_eq!(shader.name, "plasma");
        assert_eq!(shader.code, "void main() {}");
    }

    #[test]
    fn listing_ignores_extra_fields() {
        // The service returns full records; the listing only keeps id/name.
        let json = r#"[
            {"id": 1, "name": "waves", "code": "..."},
            {"id": 2, "name": "rings", "code": "..."}
        ]"#;
        let listed: Vec<ShaderSummary> = serde_json::from_str(json).expect("listing should decode");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, 1);
        assert_eq!(listed[1].name, "rings");
    }

    #[test]
    fn export_submission_serializes_expected_shape() {
        let frames = vec!["aGVsbG8=".to_string()];
        let submission = ExportSubmission {
            frames: &frames,
            fps: 30,
            duration: 4,
        };
        let value = serde_json::to_value(&submission).expect("submission should serialize");
        assert_eq!(value["fps"], 30);
        assert_eq!(value["duration"], 4);
        assert_eq!(value["frames"][0], "aGVsbG8=");
    }
}
