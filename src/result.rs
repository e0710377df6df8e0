//! Result values returned by the detection calls.
//!
//! Each value is built once per call and handed to the caller. Success and
//! failure are encoded so the invariants hold by construction: a failure
//! always carries a message, a success never does, and `count()` is always
//! the length of the detection list.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DetectError, ErrorKind};

/// One finding reported by the service.
///
/// The record is passed through untouched. The accessors read the attributes
/// the reference server emits and return `None` when an attribute is absent
/// or has another JSON type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Detection(Map<String, Value>);

impl Detection {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_attributes(self) -> Map<String, Value> {
        self.0
    }

    /// Class label, e.g. `"persona"`.
    pub fn label(&self) -> Option<&str> {
        self.0.get("clase").and_then(Value::as_str)
    }

    pub fn class_id(&self) -> Option<i64> {
        self.0.get("clase_id").and_then(Value::as_i64)
    }

    /// Confidence in `0.0..=1.0`.
    pub fn confidence(&self) -> Option<f64> {
        self.0.get("confianza").and_then(Value::as_f64)
    }

    pub fn confidence_percent(&self) -> Option<f64> {
        self.0.get("confianza_porcentaje").and_then(Value::as_f64)
    }

    /// Pixel bounding box as `[x, y, width, height]`.
    pub fn bbox(&self) -> Option<[i64; 4]> {
        let field = |name: &str| self.0.get(name).and_then(Value::as_i64);
        Some([field("x")?, field("y")?, field("ancho")?, field("alto")?])
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Failure {
    kind: ErrorKind,
    message: String,
}

impl From<&DetectError> for Failure {
    fn from(err: &DetectError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of `detect_from_file` / `detect_from_base64`.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    detections: Vec<Detection>,
    failure: Option<Failure>,
}

impl DetectionResult {
    pub fn success(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            failure: None,
        }
    }

    pub fn failure(err: &DetectError) -> Self {
        Self {
            detections: Vec::new(),
            failure: Some(err.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn error(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn count(&self) -> usize {
        self.detections.len()
    }

    pub fn into_detections(self) -> Vec<Detection> {
        self.detections
    }
}

impl fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(failure) = &self.failure {
            return write!(f, "Error: {}", failure.message);
        }
        let pretty = serde_json::to_string_pretty(&self.detections).map_err(|_| fmt::Error)?;
        write!(f, "Total detections: {}\n{}", self.count(), pretty)
    }
}

/// Outcome of `detect_with_visualization`: detections plus the annotated
/// image the service rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResultWithImage {
    result: Option<DetectionResult>,
    image: Option<Vec<u8>>,
    failure: Option<Failure>,
}

impl DetectionResultWithImage {
    pub fn success(result: DetectionResult, image: Vec<u8>) -> Self {
        Self {
            result: Some(result),
            image: Some(image),
            failure: None,
        }
    }

    pub fn failure(err: &DetectError) -> Self {
        Self {
            result: None,
            image: None,
            failure: Some(err.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn error(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        self.result.as_ref()
    }

    /// Decoded bytes of the annotated image.
    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    /// Writes the annotated image to `path`.
    ///
    /// Nothing is created or touched when the result carries no image.
    /// Parent directories are not created.
    pub fn save_image(&self, path: impl AsRef<Path>) -> Result<(), DetectError> {
        let path = path.as_ref();
        let image = self.image.as_deref().ok_or(DetectError::NoImage)?;
        std::fs::write(path, image).map_err(|source| DetectError::Output {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("saved annotated image ({} bytes) to {}", image.len(), path.display());
        Ok(())
    }
}
