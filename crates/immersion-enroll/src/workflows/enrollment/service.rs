use std::sync::Arc;

use thiserror::Error;

use super::admin::{export_csv, filter_records, AdminCredentials, AdminError, EnrollmentExport};
use super::capacity::{track_availability, CapacityTally, TrackAvailability};
use super::catalog::TrackCatalog;
use super::domain::{EnrollmentRecord, NewEnrollment, RosterEntry, TrackId};
use super::policy::EnrollmentPolicy;
use super::roster::{RosterDirectory, RosterGateway};
use super::store::{EnrollmentStore, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("track {0} is not in the catalog")]
    UnknownTrack(TrackId),
    #[error("no enrollments to export")]
    NothingToExport,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What an identity check reports back to the credentials step.
#[derive(Debug, Clone)]
pub enum VerificationReport {
    Verified {
        entry: RosterEntry,
        already_enrolled: bool,
    },
    NotFound,
}

/// Stateless composition of the ports behind the HTTP surface: roster
/// lookups, capacity-annotated catalog reads, submissions, and the admin
/// data operations. Wizard state stays with the client; this service only
/// answers its requests.
pub struct EnrollmentService<G, E> {
    roster: Arc<RosterDirectory<G>>,
    store: Arc<E>,
    catalog: TrackCatalog,
    policy: EnrollmentPolicy,
    admin: Option<AdminCredentials>,
}

impl<G, E> EnrollmentService<G, E>
where
    G: RosterGateway,
    E: EnrollmentStore,
{
    pub fn new(
        roster: Arc<RosterDirectory<G>>,
        store: Arc<E>,
        catalog: TrackCatalog,
        policy: EnrollmentPolicy,
        admin: Option<AdminCredentials>,
    ) -> Self {
        Self {
            roster,
            store,
            catalog,
            policy,
            admin,
        }
    }

    pub fn catalog(&self) -> &TrackCatalog {
        &self.catalog
    }

    /// Roster match plus the advisory duplicate guard. Roster transport
    /// failures have already degraded to "not found" inside the directory;
    /// a failing duplicate guard propagates, since reporting a student as
    /// enrollable without it would invite duplicates.
    pub async fn verify_identity(
        &self,
        student_number: &str,
        email: &str,
    ) -> Result<VerificationReport, ServiceError> {
        match self.roster.verify(student_number, email).await {
            None => Ok(VerificationReport::NotFound),
            Some(entry) => {
                let already_enrolled = self
                    .store
                    .exists_by_student_number(student_number.trim())
                    .await?;
                Ok(VerificationReport::Verified {
                    entry,
                    already_enrolled,
                })
            }
        }
    }

    /// The catalog annotated against a fresh occupancy snapshot.
    pub async fn track_availability(
        &self,
        section_id: Option<&str>,
    ) -> Result<Vec<TrackAvailability>, ServiceError> {
        let counts = self.store.counts_by_track().await?;
        let tally = CapacityTally::from_counts(counts);
        Ok(track_availability(
            &self.catalog,
            section_id,
            &tally,
            self.policy.capacity_ceiling,
        ))
    }

    /// Persists a submission. The track must exist in the catalog; capacity
    /// is not re-checked here (the pre-submission tally is advisory, and the
    /// store enforces nothing).
    pub async fn submit(
        &self,
        enrollment: NewEnrollment,
    ) -> Result<EnrollmentRecord, ServiceError> {
        if !self.catalog.contains(&enrollment.immersion_program) {
            return Err(ServiceError::UnknownTrack(enrollment.immersion_program));
        }
        Ok(self.store.insert(enrollment).await?)
    }

    /// Literal comparison against the configured pair; unconfigured
    /// credentials reject everything.
    pub fn check_admin_login(&self, username: &str, password: &str) -> bool {
        self.admin
            .as_ref()
            .map(|configured| configured.username == username && configured.password == password)
            .unwrap_or(false)
    }

    pub async fn admin_enrollments(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<EnrollmentRecord>, ServiceError> {
        let records = self.store.list_all().await?;
        Ok(match search {
            Some(term) if !term.trim().is_empty() => filter_records(&records, term)
                .into_iter()
                .cloned()
                .collect(),
            _ => records,
        })
    }

    pub async fn admin_export(&self) -> Result<EnrollmentExport, ServiceError> {
        let records = self.store.list_all().await?;
        export_csv(&records).map_err(|error| match error {
            AdminError::NothingToExport => ServiceError::NothingToExport,
            other => ServiceError::Store(StoreError::Malformed(other.to_string())),
        })
    }

    /// Deletes by id; a record that is already gone counts as deleted.
    pub async fn admin_delete(&self, id: i64) -> Result<(), ServiceError> {
        match self.store.delete_by_id(id).await {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(error) => Err(ServiceError::Store(error)),
        }
    }
}
