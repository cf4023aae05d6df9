use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use super::domain::EnrollmentRecord;
use super::session::{StateStorage, StorageError, ADMIN_FLAG_KEY};
use super::store::{EnrollmentStore, StoreError};

/// The configured admin username/password pair. Compared literally, exactly
/// as the registrar provisions it. Known weakness: nothing is hashed and
/// nothing rate-limits attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("admin is not authenticated")]
    NotAuthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no enrollments to export")]
    NothingToExport,
    #[error("export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A generated spreadsheet download.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentExport {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Case-insensitive substring filter over the fields the registrar searches
/// by: student number, name, and program id. An empty term matches
/// everything.
pub fn filter_records<'r>(records: &'r [EnrollmentRecord], term: &str) -> Vec<&'r EnrollmentRecord> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }
    records
        .iter()
        .filter(|record| {
            record.student_number.to_lowercase().contains(&needle)
                || record.name.to_lowercase().contains(&needle)
                || record.immersion_program.as_str().to_lowercase().contains(&needle)
        })
        .collect()
}

/// Builds the enrollment spreadsheet: one row per record with the program id
/// humanized and the timestamp split into its date and time columns. The
/// file name carries the export date.
pub fn export_csv(records: &[EnrollmentRecord]) -> Result<EnrollmentExport, AdminError> {
    if records.is_empty() {
        return Err(AdminError::NothingToExport);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "Student Number",
            "Full Name",
            "Email",
            "Academic Section",
            "Immersion Program",
            "Enrollment Date",
            "Enrollment Time",
        ])
        .map_err(|error| AdminError::Export(error.to_string()))?;

    for record in records {
        writer
            .write_record([
                record.student_number.as_str(),
                record.name.as_str(),
                record.email.as_str(),
                record.section.as_str(),
                &record.immersion_program.humanized(),
                &record.created_at.format("%-m/%-d/%Y").to_string(),
                &record.created_at.format("%-I:%M:%S %p").to_string(),
            ])
            .map_err(|error| AdminError::Export(error.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| AdminError::Export(error.to_string()))?;

    Ok(EnrollmentExport {
        file_name: format!("enrollments_{}.csv", Utc::now().format("%Y-%m-%d")),
        bytes,
    })
}

/// Browse/search/export/delete view over the enrollment store, gated by a
/// literal credential comparison. The authenticated flag is persisted so a
/// restarted console stays signed in until explicit logout.
pub struct AdminConsole<E, S> {
    store: Arc<E>,
    storage: S,
    credentials: Option<AdminCredentials>,
    authenticated: bool,
    records: Vec<EnrollmentRecord>,
}

impl<E, S> AdminConsole<E, S>
where
    E: EnrollmentStore,
    S: StateStorage,
{
    /// Builds the console, adopting a persisted authenticated flag when one
    /// is present. With no configured credentials every login fails.
    pub fn restore(
        store: Arc<E>,
        storage: S,
        credentials: Option<AdminCredentials>,
    ) -> Result<Self, StorageError> {
        let authenticated = matches!(storage.get(ADMIN_FLAG_KEY)?.as_deref(), Some("true"));
        if credentials.is_none() {
            warn!("admin credentials are not configured; console logins will be rejected");
        }
        Ok(Self {
            store,
            storage,
            credentials,
            authenticated,
            records: Vec::new(),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), AdminError> {
        let matched = self
            .credentials
            .as_ref()
            .map(|configured| configured.username == username && configured.password == password)
            .unwrap_or(false);
        if !matched {
            return Err(AdminError::InvalidCredentials);
        }
        self.storage.set(ADMIN_FLAG_KEY, "true")?;
        self.authenticated = true;
        info!("admin console unlocked");
        Ok(())
    }

    pub fn logout(&mut self) -> Result<(), StorageError> {
        self.storage.remove(ADMIN_FLAG_KEY)?;
        self.authenticated = false;
        self.records.clear();
        Ok(())
    }

    /// Reloads the console cache from the store, newest first.
    pub async fn refresh(&mut self) -> Result<&[EnrollmentRecord], AdminError> {
        self.ensure_authenticated()?;
        self.records = self.store.list_all().await?;
        Ok(&self.records)
    }

    pub fn records(&self) -> &[EnrollmentRecord] {
        &self.records
    }

    pub fn search(&self, term: &str) -> Result<Vec<&EnrollmentRecord>, AdminError> {
        self.ensure_authenticated()?;
        Ok(filter_records(&self.records, term))
    }

    pub fn export(&self) -> Result<EnrollmentExport, AdminError> {
        self.ensure_authenticated()?;
        export_csv(&self.records)
    }

    /// Deletes a record. A store that no longer has the row is treated as
    /// success, so a double-click or a stale cache never surfaces an error;
    /// the cached row is dropped either way.
    pub async fn delete(&mut self, id: i64) -> Result<(), AdminError> {
        self.ensure_authenticated()?;
        match self.store.delete_by_id(id).await {
            Ok(()) | Err(StoreError::NotFound) => {
                self.records.retain(|record| record.id != id);
                Ok(())
            }
            Err(error) => Err(AdminError::Store(error)),
        }
    }

    fn ensure_authenticated(&self) -> Result<(), AdminError> {
        if self.authenticated {
            Ok(())
        } else {
            Err(AdminError::NotAuthenticated)
        }
    }
}
