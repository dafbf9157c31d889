// Script Source Port
// Where provisioning scripts are read from before being sent to the guest

use async_trait::async_trait;
use std::path::Path;

/// Script source interface
#[async_trait]
pub trait ScriptSource: Send + Sync {
    /// Read the full script body
    async fn load(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// In-memory scripts keyed by path
    #[derive(Default)]
    pub struct InMemoryScripts {
        scripts: HashMap<PathBuf, Vec<u8>>,
    }

    impl InMemoryScripts {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_script(mut self, path: impl Into<PathBuf>, body: &str) -> Self {
            self.scripts.insert(path.into(), body.as_bytes().to_vec());
            self
        }
    }

    #[async_trait]
    impl ScriptSource for InMemoryScripts {
        async fn load(&self, path: &Path) -> std::io::Result<Vec<u8>> {
            self.scripts.get(path).cloned().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no script at {}", path.display()),
                )
            })
        }
    }
}
