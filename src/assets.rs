use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use std::path::PathBuf;
use uuid::Uuid;

/// Upload collaborator: turns inline image content into a durable,
/// retrievable URL before the message is appended. A failure here aborts
/// the send.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// `data` is base64 image content, with or without a `data:` URI prefix.
    async fn upload(&self, data: &str) -> Result<String>;
}

/// Local-disk asset store; files are served back under `/assets`.
pub struct DiskAssets {
    root: PathBuf,
    public_base: String,
}

impl DiskAssets {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).context("Failed to create assets directory")?;
        Ok(Self {
            root,
            public_base: public_base.into(),
        })
    }
}

/// Split an optional `data:image/<ext>;base64,` prefix off the payload.
fn split_data_uri(data: &str) -> (String, &str) {
    if let Some(rest) = data.strip_prefix("data:") {
        if let Some((meta, payload)) = rest.split_once(',') {
            let ext: String = meta
                .split(';')
                .next()
                .and_then(|mime| mime.strip_prefix("image/"))
                .unwrap_or("")
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            let ext = if ext.is_empty() { "bin".to_string() } else { ext };
            return (ext, payload);
        }
    }
    ("bin".to_string(), data)
}

#[async_trait]
impl AssetStore for DiskAssets {
    async fn upload(&self, data: &str) -> Result<String> {
        let (ext, payload) = split_data_uri(data);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .context("Invalid base64 image payload")?;
        if bytes.is_empty() {
            bail!("Empty image payload");
        }

        let name = format!("{}.{}", Uuid::new_v4().simple(), ext);
        let path = self.root.join(&name);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write asset {}", path.display()))?;

        Ok(format!(
            "{}/assets/{}",
            self.public_base.trim_end_matches('/'),
            name
        ))
    }
}
