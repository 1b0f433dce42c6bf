use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;

/// Write-only store for per-step screenshots:
/// `{root}/{session_id}/step_{NNN}.png`.
pub struct ScreenshotStore {
    root: PathBuf,
    client: Client,
}

impl ScreenshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            client: Client::new(),
        }
    }

    pub fn path_for(&self, session_id: &str, step: usize) -> PathBuf {
        self.root
            .join(sanitize(session_id))
            .join(format!("step_{step:03}.png"))
    }

    pub async fn save(&self, session_id: &str, step: usize, image_url: &str) -> Result<PathBuf> {
        let bytes = self.fetch(image_url).await?;
        let path = self.path_for(session_id, step);
        write_file(&path, &bytes).await?;
        Ok(path)
    }

    async fn fetch(&self, image_url: &str) -> Result<Vec<u8>> {
        if let Some(rest) = image_url.strip_prefix("data:") {
            let (_, payload) = rest
                .split_once(";base64,")
                .ok_or_else(|| anyhow!("unsupported data URL encoding"))?;
            return Ok(STANDARD.decode(payload)?);
        }

        let response = self.client.get(image_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("downloading screenshot returned {}", status));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

/// Session ids come from the backend; keep them to one path component.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
