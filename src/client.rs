//! Blocking client for the person detection service.
//!
//! Three detection calls are offered:
//! - `detect_from_file`: streams the raw image with a declared length
//! - `detect_from_base64`: posts the image base64-encoded inside JSON
//! - `detect_with_visualization`: JSON upload, response also carries the
//!   annotated image
//!
//! Each call is a single request/response exchange on its own connection.
//! Every failure is folded into the returned result value; none of these
//! calls return `Err` or panic.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::DetectError;
use crate::result::{Detection, DetectionResult, DetectionResultWithImage};
use crate::upload::open_known_length;

pub const DETECT_PATH: &str = "/detect";
pub const VISUALIZATION_PATH: &str = "/detect-con-visualizacion";
pub const HEALTH_PATH: &str = "/health";
pub const INFO_PATH: &str = "/info";

const THRESHOLD_PARAM: &str = "umbral";
const MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;

/// JSON body shared by the base64 and visualization calls.
#[derive(Debug, Serialize)]
struct EncodedImageRequest<'a> {
    imagen_base64: &'a str,
    umbral: f64,
}

/// Success envelope. Which optional fields are required depends on `exito`
/// and on the endpoint.
#[derive(Debug, Deserialize)]
struct DetectEnvelope {
    exito: bool,
    error: Option<String>,
    detecciones: Option<Vec<Detection>>,
    imagen_resultado_base64: Option<String>,
}

impl DetectEnvelope {
    fn into_detections(self) -> Result<(Vec<Detection>, Option<String>), DetectError> {
        if !self.exito {
            return Err(match self.error {
                Some(message) => DetectError::Application(message),
                None => DetectError::Decode("`exito` is false but `error` is missing".to_string()),
            });
        }
        let detections = self
            .detecciones
            .ok_or_else(|| DetectError::Decode("missing field `detecciones`".to_string()))?;
        Ok((detections, self.imagen_resultado_base64))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Payload of `GET /health`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(rename = "modelo_cargado")]
    pub model_loaded: bool,
}

/// Payload of `GET /info`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ServiceInfo {
    #[serde(rename = "nombre")]
    pub name: String,
    pub version: String,
    #[serde(rename = "modelo", default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(rename = "tamaño_entrada", default)]
    pub input_size: Option<u32>,
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

/// Status and body of one exchange, fully read.
struct Reply {
    status: u16,
    body: Vec<u8>,
}

#[derive(Clone)]
pub struct DetectionClient {
    config: ClientConfig,
    agent: ureq::Agent,
}

impl DetectionClient {
    pub fn new(config: ClientConfig) -> Self {
        // No idle pool: every call opens and releases its own connection.
        // Redirects are not followed; a 3xx is answered like any non-200.
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.read_timeout)
            .timeout_write(config.write_timeout)
            .max_idle_connections(0)
            .max_idle_connections_per_host(0)
            .redirects(0)
            .build();
        Self { config, agent }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Streams the file at `path` to `/detect?umbral=<threshold>`.
    pub fn detect_from_file(&self, path: impl AsRef<Path>, threshold: f64) -> DetectionResult {
        let path = path.as_ref();
        match self.try_detect_from_file(path, threshold) {
            Ok(detections) => DetectionResult::success(detections),
            Err(err) => {
                log::warn!("file detection for {} failed: {}", path.display(), err);
                DetectionResult::failure(&err)
            }
        }
    }

    /// Posts the file at `path` base64-encoded to `/detect`.
    pub fn detect_from_base64(&self, path: impl AsRef<Path>, threshold: f64) -> DetectionResult {
        let path = path.as_ref();
        match self.try_detect_from_base64(path, threshold) {
            Ok(detections) => DetectionResult::success(detections),
            Err(err) => {
                log::warn!("base64 detection for {} failed: {}", path.display(), err);
                DetectionResult::failure(&err)
            }
        }
    }

    /// Posts the file at `path` to `/detect-con-visualizacion` and decodes
    /// the annotated image from the reply.
    pub fn detect_with_visualization(
        &self,
        path: impl AsRef<Path>,
        threshold: f64,
    ) -> DetectionResultWithImage {
        let path = path.as_ref();
        match self.try_detect_with_visualization(path, threshold) {
            Ok((detections, image)) => {
                DetectionResultWithImage::success(DetectionResult::success(detections), image)
            }
            Err(err) => {
                log::warn!(
                    "visualization detection for {} failed: {}",
                    path.display(),
                    err
                );
                DetectionResultWithImage::failure(&err)
            }
        }
    }

    pub fn health(&self) -> Result<HealthStatus, DetectError> {
        self.get_json(HEALTH_PATH)
    }

    pub fn info(&self) -> Result<ServiceInfo, DetectError> {
        self.get_json(INFO_PATH)
    }

    fn try_detect_from_file(
        &self,
        path: &Path,
        threshold: f64,
    ) -> Result<Vec<Detection>, DetectError> {
        let url = self.config.endpoint(DETECT_PATH);
        let (body, len) = open_known_length(path)?;
        log::debug!(
            "POST {} ({} bytes streamed, {}={})",
            url,
            len,
            THRESHOLD_PARAM,
            threshold
        );
        let outcome = self
            .agent
            .post(&url)
            .query(THRESHOLD_PARAM, &threshold.to_string())
            .set("Content-Type", "image/jpeg")
            .set("Content-Length", &len.to_string())
            .send(body);
        let reply = into_reply(&url, outcome)?;
        decode_detections(reply).map(|(detections, _)| detections)
    }

    fn try_detect_from_base64(
        &self,
        path: &Path,
        threshold: f64,
    ) -> Result<Vec<Detection>, DetectError> {
        let reply = self.post_encoded(DETECT_PATH, path, threshold)?;
        decode_detections(reply).map(|(detections, _)| detections)
    }

    fn try_detect_with_visualization(
        &self,
        path: &Path,
        threshold: f64,
    ) -> Result<(Vec<Detection>, Vec<u8>), DetectError> {
        let reply = self.post_encoded(VISUALIZATION_PATH, path, threshold)?;
        let (detections, image) = decode_detections(reply)?;
        let image = image.ok_or_else(|| {
            DetectError::Decode("missing field `imagen_resultado_base64`".to_string())
        })?;
        let image = STANDARD.decode(image.as_bytes()).map_err(|e| {
            DetectError::Decode(format!("`imagen_resultado_base64` is not valid base64: {}", e))
        })?;
        Ok((detections, image))
    }

    fn post_encoded(
        &self,
        endpoint: &str,
        path: &Path,
        threshold: f64,
    ) -> Result<Reply, DetectError> {
        let url = self.config.endpoint(endpoint);
        let image = std::fs::read(path).map_err(|source| DetectError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        let encoded = STANDARD.encode(&image);
        log::debug!(
            "POST {} ({} bytes as {} base64 chars, {}={})",
            url,
            image.len(),
            encoded.len(),
            THRESHOLD_PARAM,
            threshold
        );
        drop(image);
        let outcome = self.agent.post(&url).send_json(EncodedImageRequest {
            imagen_base64: &encoded,
            umbral: threshold,
        });
        into_reply(&url, outcome)
    }

    fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, DetectError> {
        let url = self.config.endpoint(endpoint);
        log::debug!("GET {}", url);
        let reply = into_reply(&url, self.agent.get(&url).call())?;
        if reply.status != 200 {
            return Err(protocol_error(&reply));
        }
        serde_json::from_slice(&reply.body).map_err(|e| DetectError::Decode(e.to_string()))
    }
}

/// Reads the whole reply. HTTP error statuses are replies too; only
/// transport failures end the exchange here.
fn into_reply(
    url: &str,
    outcome: Result<ureq::Response, ureq::Error>,
) -> Result<Reply, DetectError> {
    let response = match outcome {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(transport)) => {
            return Err(DetectError::Transport {
                endpoint: url.to_string(),
                detail: transport.to_string(),
            })
        }
    };
    let status = response.status();
    let mut body = Vec::new();
    response
        .into_reader()
        .take(MAX_RESPONSE_BYTES + 1)
        .read_to_end(&mut body)
        .map_err(|e| DetectError::Transport {
            endpoint: url.to_string(),
            detail: format!("reading response body: {}", e),
        })?;
    if body.len() as u64 > MAX_RESPONSE_BYTES {
        return Err(DetectError::Decode(format!(
            "response body exceeds {} bytes",
            MAX_RESPONSE_BYTES
        )));
    }
    log::debug!("{} answered HTTP {} ({} bytes)", url, status, body.len());
    Ok(Reply { status, body })
}

fn protocol_error(reply: &Reply) -> DetectError {
    let message = serde_json::from_slice::<ErrorBody>(&reply.body)
        .ok()
        .map(|body| body.error);
    DetectError::Protocol {
        status: reply.status,
        message,
    }
}

fn decode_detections(reply: Reply) -> Result<(Vec<Detection>, Option<String>), DetectError> {
    if reply.status != 200 {
        return Err(protocol_error(&reply));
    }
    let envelope: DetectEnvelope =
        serde_json::from_slice(&reply.body).map_err(|e| DetectError::Decode(e.to_string()))?;
    envelope.into_detections()
}
