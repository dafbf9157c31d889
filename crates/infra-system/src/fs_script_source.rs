// Filesystem script source
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use guestctl_core::port::ScriptSource;

/// Reads provisioning scripts from the host filesystem
pub struct FsScriptSource;

#[async_trait]
impl ScriptSource for FsScriptSource {
    async fn load(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        let body = tokio::fs::read(path).await?;
        debug!(path = %path.display(), bytes = body.len(), "Loaded script");
        Ok(body)
    }
}
