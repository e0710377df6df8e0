//! Error taxonomy for the detection client.
//!
//! Detection calls never return these directly; they are folded into the
//! result values in [`crate::result`]. `save_image`, `health` and `info`
//! surface them as `Err`.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source image missing or unreadable.
    Input,
    /// Connection refused, timeout, interrupted stream.
    Transport,
    /// Non-200 status from the service.
    Protocol,
    /// 200 status, but the service reported `exito: false`.
    Application,
    /// Body is not the JSON shape we expect.
    Decode,
    /// Saving the annotated image failed.
    Output,
}

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("failed to read image {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {endpoint} failed: {detail}")]
    Transport { endpoint: String, detail: String },

    #[error("{}", protocol_message(*status, message.as_deref()))]
    Protocol { status: u16, message: Option<String> },

    #[error("{0}")]
    Application(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("no image available to save")]
    NoImage,

    #[error("failed to write image {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DetectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DetectError::Input { .. } => ErrorKind::Input,
            DetectError::Transport { .. } => ErrorKind::Transport,
            DetectError::Protocol { .. } => ErrorKind::Protocol,
            DetectError::Application(_) => ErrorKind::Application,
            DetectError::Decode(_) => ErrorKind::Decode,
            DetectError::NoImage | DetectError::Output { .. } => ErrorKind::Output,
        }
    }
}

// The service's own error text is shown verbatim when it sent one.
fn protocol_message(status: u16, message: Option<&str>) -> String {
    match message {
        Some(message) => message.to_string(),
        None => format!("service returned HTTP {status} with an undecodable error body"),
    }
}
