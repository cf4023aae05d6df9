use thiserror::Error;
use tracing::warn;

use super::domain::{EnrollmentDraft, TrackId};

/// Key under which the draft blob is stored.
pub const DRAFT_KEY: &str = "enrollment";
/// Key under which the admin console persists its authenticated flag.
pub const ADMIN_FLAG_KEY: &str = "admin_auth";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("state storage unavailable: {0}")]
    Unavailable(String),
    #[error("state blob could not be encoded: {0}")]
    Encode(String),
}

/// Durable key/value storage for session state. Synchronous by contract:
/// when `set` returns, the value has been written.
pub trait StateStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Reads and writes the draft blob under its fixed key. A missing blob and
/// an unreadable blob both fall back to a fresh draft; the unreadable case
/// is logged, never fatal.
pub struct DraftVault<S> {
    storage: S,
    default_track: TrackId,
}

impl<S: StateStorage> DraftVault<S> {
    pub fn new(storage: S, default_track: TrackId) -> Self {
        Self {
            storage,
            default_track,
        }
    }

    pub fn load(&self) -> Result<EnrollmentDraft, StorageError> {
        match self.storage.get(DRAFT_KEY)? {
            None => Ok(self.default_draft()),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(draft) => Ok(draft),
                Err(error) => {
                    warn!(%error, "stored enrollment draft is unreadable; starting fresh");
                    Ok(self.default_draft())
                }
            },
        }
    }

    pub fn save(&self, draft: &EnrollmentDraft) -> Result<(), StorageError> {
        let blob = serde_json::to_string(draft)
            .map_err(|error| StorageError::Encode(error.to_string()))?;
        self.storage.set(DRAFT_KEY, &blob)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(DRAFT_KEY)
    }

    pub fn default_draft(&self) -> EnrollmentDraft {
        EnrollmentDraft::fresh(self.default_track.clone())
    }
}
