use thiserror::Error;

use crate::hands::SessionError;

/// Everything that can end a task early.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("could not acquire a browser session: {0}")]
    SessionAcquisition(#[source] SessionError),
    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: SessionError,
    },
    #[error("screenshot capture failed at step {step}: {source}")]
    Capture {
        step: usize,
        #[source]
        source: SessionError,
    },
    #[error("model response at step {step} is not a JSON action: {text}")]
    MalformedResponse { step: usize, text: String },
    #[error("model request failed: {0:#}")]
    Model(#[source] anyhow::Error),
    #[error("session failed at step {step} while running `{action}`: {source}")]
    Session {
        step: usize,
        action: String,
        #[source]
        source: SessionError,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}
