#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use screen_pilot::brain::{Conversation, Model};
use screen_pilot::hands::{Screenshot, Session, SessionError, SessionProvider};
use screen_pilot::{AgentOptions, PixelPoint, Viewport};

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn no_delays() -> AgentOptions {
    AgentOptions {
        settle_delay: Duration::ZERO,
        step_delay: Duration::ZERO,
    }
}

/// Which session calls should fail, and how.
#[derive(Clone, Default)]
pub struct Faults {
    pub refuse_create: bool,
    pub reject_navigate: bool,
    /// Screenshot number (1-based) that fails.
    pub capture_fails_at: Option<usize>,
    /// Clicks are rejected by the backend.
    pub reject_clicks: bool,
    /// Typing breaks the transport.
    pub break_typing: bool,
}

pub struct FakeProvider {
    pub log: Log,
    pub faults: Faults,
    pub viewport: Viewport,
    /// Hand out inline `data:` screenshots instead of http URLs.
    pub data_urls: bool,
}

impl FakeProvider {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            faults: Faults::default(),
            viewport: Viewport {
                width: 1280,
                height: 800,
            },
            data_urls: false,
        }
    }

    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn create(&self) -> Result<Box<dyn Session>, SessionError> {
        if self.faults.refuse_create {
            return Err(SessionError::Rejected {
                status: "503".into(),
                message: Some("no capacity".into()),
            });
        }
        self.log.lock().unwrap().push("create".into());
        Ok(Box::new(FakeSession {
            log: self.log.clone(),
            faults: self.faults.clone(),
            viewport: self.viewport,
            data_urls: self.data_urls,
            shots: 0,
        }))
    }
}

pub struct FakeSession {
    log: Log,
    faults: Faults,
    viewport: Viewport,
    data_urls: bool,
    shots: usize,
}

impl FakeSession {
    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Session for FakeSession {
    fn id(&self) -> &str {
        "fake-session"
    }

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.record(format!("navigate {url}"));
        if self.faults.reject_navigate {
            return Err(SessionError::Rejected {
                status: "error".into(),
                message: Some("net::ERR_NAME_NOT_RESOLVED".into()),
            });
        }
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Screenshot, SessionError> {
        self.shots += 1;
        self.record(format!("screenshot {}", self.shots));
        if self.faults.capture_fails_at == Some(self.shots) {
            return Err(SessionError::MissingPayload("result.screenshot_url"));
        }
        let image_url = if self.data_urls {
            let frame = format!("frame-{}", self.shots);
            format!("data:image/png;base64,{}", STANDARD.encode(frame))
        } else {
            format!("https://shots.test/{}.png", self.shots)
        };
        Ok(Screenshot {
            image_url,
            viewport: self.viewport,
        })
    }

    async fn click(&mut self, at: PixelPoint) -> Result<(), SessionError> {
        self.record(format!("click {} {}", at.x, at.y));
        if self.faults.reject_clicks {
            return Err(SessionError::Rejected {
                status: "error".into(),
                message: Some("element detached".into()),
            });
        }
        Ok(())
    }

    async fn double_click(&mut self, at: PixelPoint) -> Result<(), SessionError> {
        self.record(format!("double_click {} {}", at.x, at.y));
        Ok(())
    }

    async fn right_click(&mut self, at: PixelPoint) -> Result<(), SessionError> {
        self.record(format!("right_click {} {}", at.x, at.y));
        Ok(())
    }

    async fn type_text(&mut self, text: &str) -> Result<(), SessionError> {
        self.record(format!("type {text}"));
        if self.faults.break_typing {
            return Err(SessionError::Backend(anyhow!("connection reset")));
        }
        Ok(())
    }

    async fn hotkey(&mut self, keys: &[String]) -> Result<(), SessionError> {
        self.record(format!("hotkey {}", keys.join("+")));
        Ok(())
    }

    async fn scroll(&mut self, dx: i64, dy: i64) -> Result<(), SessionError> {
        self.record(format!("scroll {dx} {dy}"));
        Ok(())
    }

    async fn drag(&mut self, from: PixelPoint, to: PixelPoint) -> Result<(), SessionError> {
        self.record(format!("drag {} {} {} {}", from.x, from.y, to.x, to.y));
        Ok(())
    }

    async fn wait(&mut self, duration: Duration) -> Result<(), SessionError> {
        self.record(format!("wait {}ms", duration.as_millis()));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.record("close".into());
        Ok(())
    }
}

/// Replays canned decisions; repeats the last one once the script runs out.
pub struct ScriptedModel {
    replies: VecDeque<String>,
    last: Option<String>,
    /// Conversation length seen by each request.
    pub seen: Arc<Mutex<Vec<usize>>>,
    pub fail: bool,
    /// Panic instead of answering.
    pub panic: bool,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            last: None,
            seen: Arc::default(),
            fail: false,
            panic: false,
        }
    }
}

#[async_trait]
impl Model for ScriptedModel {
    async fn decide(&mut self, conversation: &Conversation) -> Result<String> {
        self.seen.lock().unwrap().push(conversation.len());
        if self.panic {
            panic!("model crashed");
        }
        if self.fail {
            return Err(anyhow!("model unavailable"));
        }
        if let Some(reply) = self.replies.pop_front() {
            self.last = Some(reply.clone());
            return Ok(reply);
        }
        self.last
            .clone()
            .ok_or_else(|| anyhow!("script is empty"))
    }
}

pub fn entries(log: &Log, prefix: &str) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with(prefix))
        .cloned()
        .collect()
}
