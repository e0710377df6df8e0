//! Client for the person detection REST service.
//!
//! The service finds people in an image and answers with a list of
//! detections, optionally with an annotated copy of the image. This crate
//! wraps its endpoints in a blocking client whose detection calls always
//! return a result value, never an error or a panic.
//!
//! # Module Structure
//!
//! - `client`: `DetectionClient` and the request/response codecs
//! - `config`: `ClientConfig` (base URL, timeouts; file + env loading)
//! - `result`: `Detection`, `DetectionResult`, `DetectionResultWithImage`
//! - `error`: `DetectError` and its `ErrorKind` tag

pub mod client;
pub mod config;
pub mod error;
pub mod result;
mod upload;

pub use client::{DetectionClient, HealthStatus, ServiceInfo};
pub use config::ClientConfig;
pub use error::{DetectError, ErrorKind};
pub use result::{Detection, DetectionResult, DetectionResultWithImage};
