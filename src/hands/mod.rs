//! The browser side of the agent: a [`Session`] is one remote or local
//! browser the agent can look at and act on.

pub mod chrome;
pub mod hosted;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{PixelPoint, Viewport};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("backend reported status `{status}`: {}", .message.as_deref().unwrap_or("no details"))]
    Rejected {
        status: String,
        message: Option<String>,
    },
    #[error("backend response is missing {0}")]
    MissingPayload(&'static str),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0:#}")]
    Backend(#[from] anyhow::Error),
}

impl SessionError {
    /// A rejection means the backend answered and said no; everything else is
    /// a transport or browser failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, SessionError::Rejected { .. })
    }
}

/// One captured frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Screenshot {
    /// `http(s)://` or `data:` URL the model can fetch.
    pub image_url: String,
    pub viewport: Viewport,
}

/// A live browser owned by exactly one agent run.
#[async_trait]
pub trait Session: Send {
    fn id(&self) -> &str;

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;
    async fn screenshot(&mut self) -> Result<Screenshot, SessionError>;

    async fn click(&mut self, at: PixelPoint) -> Result<(), SessionError>;
    async fn double_click(&mut self, at: PixelPoint) -> Result<(), SessionError>;
    async fn right_click(&mut self, at: PixelPoint) -> Result<(), SessionError>;
    async fn type_text(&mut self, text: &str) -> Result<(), SessionError>;
    /// Press every key together, then release.
    async fn hotkey(&mut self, keys: &[String]) -> Result<(), SessionError>;
    async fn scroll(&mut self, dx: i64, dy: i64) -> Result<(), SessionError>;
    async fn drag(&mut self, from: PixelPoint, to: PixelPoint) -> Result<(), SessionError>;

    async fn wait(&mut self, duration: Duration) -> Result<(), SessionError> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    /// Release the browser. Called once per session.
    async fn close(&mut self) -> Result<(), SessionError>;
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn create(&self) -> Result<Box<dyn Session>, SessionError>;
}
