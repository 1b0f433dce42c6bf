//! Sessions backed by a hosted computer API: the browser runs remotely and
//! every capability is one JSON request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{Screenshot, Session, SessionError, SessionProvider};
use crate::types::{PixelPoint, Viewport};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Reply to every executed action.
#[derive(Debug, Default, Deserialize)]
pub struct ActionReply {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub page_context: Option<PageContext>,
}

#[derive(Debug, Deserialize)]
pub struct PageContext {
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl ActionReply {
    fn into_success(self) -> Result<Self, SessionError> {
        if self.status.eq_ignore_ascii_case("success") {
            Ok(self)
        } else {
            Err(SessionError::Rejected {
                status: self.status,
                message: self.error_message,
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateReply {
    #[serde(alias = "computer_id")]
    id: String,
}

pub struct HostedProvider {
    client: Client,
    base_url: String,
    api_key: String,
    kind: String,
}

impl HostedProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            kind: "browser".to_string(),
        })
    }
}

#[async_trait]
impl SessionProvider for HostedProvider {
    async fn create(&self) -> Result<Box<dyn Session>, SessionError> {
        info!("[Hands] Creating hosted {} session...", self.kind);
        let response = self
            .client
            .post(format!("{}/computers", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "kind": self.kind }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Rejected {
                status: status.to_string(),
                message: Some(body),
            });
        }

        let created: CreateReply = response.json().await?;
        info!("[Hands] Session {} ready.", created.id);

        Ok(Box::new(HostedSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            id: created.id,
        }))
    }
}

pub struct HostedSession {
    client: Client,
    base_url: String,
    api_key: String,
    id: String,
}

impl HostedSession {
    async fn execute(&self, action: Value) -> Result<ActionReply, SessionError> {
        debug!("[Hands] {} <- {}", self.id, action);
        let response = self
            .client
            .post(format!("{}/computers/{}/execute", self.base_url, self.id))
            .bearer_auth(&self.api_key)
            .json(&json!({ "action": action }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Rejected {
                status: status.to_string(),
                message: Some(body),
            });
        }

        response.json::<ActionReply>().await?.into_success()
    }
}

#[async_trait]
impl Session for HostedSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.execute(json!({ "type": "navigate", "url": url }))
            .await
            .map(drop)
    }

    async fn screenshot(&mut self) -> Result<Screenshot, SessionError> {
        let reply = self.execute(json!({ "type": "screenshot" })).await?;
        let image_url = reply
            .result
            .as_ref()
            .and_then(|r| r.get("screenshot_url"))
            .and_then(Value::as_str)
            .ok_or(SessionError::MissingPayload("result.screenshot_url"))?
            .to_string();
        let page = reply
            .page_context
            .ok_or(SessionError::MissingPayload("page_context"))?;

        Ok(Screenshot {
            image_url,
            viewport: Viewport {
                width: page.viewport_width,
                height: page.viewport_height,
            },
        })
    }

    async fn click(&mut self, at: PixelPoint) -> Result<(), SessionError> {
        self.execute(json!({ "type": "click", "x": at.x, "y": at.y }))
            .await
            .map(drop)
    }

    async fn double_click(&mut self, at: PixelPoint) -> Result<(), SessionError> {
        self.execute(json!({ "type": "double_click", "x": at.x, "y": at.y }))
            .await
            .map(drop)
    }

    async fn right_click(&mut self, at: PixelPoint) -> Result<(), SessionError> {
        self.execute(json!({ "type": "right_click", "x": at.x, "y": at.y }))
            .await
            .map(drop)
    }

    async fn type_text(&mut self, text: &str) -> Result<(), SessionError> {
        self.execute(json!({ "type": "type", "text": text }))
            .await
            .map(drop)
    }

    async fn hotkey(&mut self, keys: &[String]) -> Result<(), SessionError> {
        self.execute(json!({ "type": "hotkey", "keys": keys }))
            .await
            .map(drop)
    }

    async fn scroll(&mut self, dx: i64, dy: i64) -> Result<(), SessionError> {
        self.execute(json!({ "type": "scroll", "dx": dx, "dy": dy }))
            .await
            .map(drop)
    }

    async fn drag(&mut self, from: PixelPoint, to: PixelPoint) -> Result<(), SessionError> {
        self.execute(json!({
            "type": "drag",
            "x1": from.x,
            "y1": from.y,
            "x2": to.x,
            "y2": to.y,
        }))
        .await
        .map(drop)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let response = self
            .client
            .delete(format!("{}/computers/{}", self.base_url, self.id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(
                "[Hands] Closing session {} returned {}",
                self.id,
                response.status()
            );
            return Err(SessionError::Rejected {
                status: response.status().to_string(),
                message: None,
            });
        }
        info!("[Hands] Session {} closed.", self.id);
        Ok(())
    }
}
