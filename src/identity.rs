//! Local persistence of the device's player identifier.
//!
//! One small JSON file holding the id handed out at registration, so a
//! restarted client rejoins the lobby as the same player. Any key-value
//! persistence would do; this one is deliberately plain.

use crate::session::PlayerId;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Failure reading or writing the identity file.
#[derive(Debug, Clone, Display, Error)]
#[display("identity store error: {message}")]
pub struct IdentityError {
    /// Description of the failure.
    #[error(not(source))]
    pub message: String,
}

impl IdentityError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IdentityRecord {
    player_id: Option<PlayerId>,
}

/// File-backed local identity store.
#[derive(Debug, Clone)]
pub struct IdentityFile {
    path: PathBuf,
}

impl IdentityFile {
    /// Creates a store backed by the given file path. The file is only
    /// created on the first write.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the stored player id, or `None` if never registered.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn local_player_id(&self) -> Result<Option<PlayerId>, IdentityError> {
        if !self.path.exists() {
            debug!("No identity file yet");
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| IdentityError::new(format!("failed to read identity file: {}", e)))?;
        let record: IdentityRecord = serde_json::from_str(&content)
            .map_err(|e| IdentityError::new(format!("malformed identity file: {}", e)))?;
        Ok(record.player_id)
    }

    /// Stores the player id, replacing any previous one.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn set_local_player_id(&self, id: PlayerId) -> Result<(), IdentityError> {
        let record = IdentityRecord {
            player_id: Some(id),
        };
        let content = serde_json::to_string_pretty(&record)
            .map_err(|e| IdentityError::new(format!("failed to encode identity: {}", e)))?;
        std::fs::write(&self.path, content)
            .map_err(|e| IdentityError::new(format!("failed to write identity file: {}", e)))?;
        info!("Local player id stored");
        Ok(())
    }

    /// Forgets the stored identity. A missing file already counts as
    /// cleared.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn clear(&self) -> Result<(), IdentityError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Local identity cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IdentityError::new(format!(
                "failed to remove identity file: {}",
                e
            ))),
        }
    }
}
