use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::domain::RosterEntry;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("roster endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("roster payload malformed: {0}")]
    Malformed(String),
}

/// Source of the published student roster.
#[async_trait]
pub trait RosterGateway: Send + Sync {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, RosterError>;
}

struct CachedRoster {
    fetched_at: Instant,
    entries: Vec<RosterEntry>,
}

/// Roster lookups with an explicit time-bounded cache in front of the
/// gateway. The cache holds the whole sheet; lookups are linear scans over
/// the cached rows.
pub struct RosterDirectory<G> {
    gateway: G,
    ttl: Duration,
    cache: Mutex<Option<CachedRoster>>,
}

impl<G: RosterGateway> RosterDirectory<G> {
    pub fn new(gateway: G, ttl: Duration) -> Self {
        Self {
            gateway,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Drops the cached sheet so the next lookup refetches.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    /// Finds the roster row matching the key pair: exact student number and
    /// case-insensitive email, both trimmed. Empty inputs never match.
    /// Transport failures are logged and reported as no match so the caller
    /// sees the same outcome as an unknown student.
    pub async fn verify(&self, student_number: &str, email: &str) -> Option<RosterEntry> {
        let student_number = student_number.trim();
        let email = email.trim();
        if student_number.is_empty() || email.is_empty() {
            return None;
        }

        match self.entries().await {
            Ok(entries) => entries.into_iter().find(|entry| {
                entry.student_number.trim() == student_number
                    && entry.email.trim().eq_ignore_ascii_case(email)
            }),
            Err(error) => {
                warn!(%error, "roster lookup failed; reporting student as not found");
                None
            }
        }
    }

    async fn entries(&self) -> Result<Vec<RosterEntry>, RosterError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.entries.clone());
            }
        }

        let entries = self.gateway.fetch_roster().await?;
        debug!(rows = entries.len(), "roster sheet refreshed");
        *cache = Some(CachedRoster {
            fetched_at: Instant::now(),
            entries: entries.clone(),
        });
        Ok(entries)
    }
}

/// Row shape of the OpenSheet JSON export. Sparse cells come back as missing
/// keys, so every field defaults to empty.
#[derive(Debug, Deserialize)]
struct SheetRow {
    #[serde(default)]
    student_number: String,
    #[serde(default)]
    email_address: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    section: String,
    #[serde(default)]
    section_id: String,
}

impl From<SheetRow> for RosterEntry {
    fn from(row: SheetRow) -> Self {
        RosterEntry {
            student_number: row.student_number,
            email: row.email_address,
            name: row.name,
            section: row.section,
            section_id: row.section_id,
        }
    }
}

/// Fetches the roster from a spreadsheet published through the OpenSheet
/// JSON endpoint.
pub struct OpenSheetRoster {
    client: reqwest::Client,
    url: String,
}

impl OpenSheetRoster {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl RosterGateway for OpenSheetRoster {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, RosterError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|error| RosterError::Unavailable(error.to_string()))?
            .error_for_status()
            .map_err(|error| RosterError::Unavailable(error.to_string()))?;

        let rows: Vec<SheetRow> = response
            .json()
            .await
            .map_err(|error| RosterError::Malformed(error.to_string()))?;

        Ok(rows.into_iter().map(RosterEntry::from).collect())
    }
}
