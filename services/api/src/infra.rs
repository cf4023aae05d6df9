use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use immersion_enroll::workflows::enrollment::{
    EnrollmentRecord, EnrollmentStore, NewEnrollment, OpenSheetRoster, RosterEntry, RosterError,
    RosterGateway, StateStorage, StorageError, StoreError, SupabaseEnrollmentStore, TrackId,
};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Roster source picked at startup: the published sheet when `ROSTER_URL` is
/// configured, the built-in fixture rows otherwise.
pub(crate) enum RosterBackend {
    Sheet(OpenSheetRoster),
    Fixture(FixtureRoster),
}

#[async_trait]
impl RosterGateway for RosterBackend {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, RosterError> {
        match self {
            RosterBackend::Sheet(sheet) => sheet.fetch_roster().await,
            RosterBackend::Fixture(fixture) => fixture.fetch_roster().await,
        }
    }
}

/// Enrollment table picked at startup: the hosted Supabase table when
/// configured, a process-local store otherwise.
pub(crate) enum StoreBackend {
    Supabase(SupabaseEnrollmentStore),
    InMemory(InMemoryEnrollmentStore),
}

#[async_trait]
impl EnrollmentStore for StoreBackend {
    async fn insert(&self, enrollment: NewEnrollment) -> Result<EnrollmentRecord, StoreError> {
        match self {
            StoreBackend::Supabase(store) => store.insert(enrollment).await,
            StoreBackend::InMemory(store) => store.insert(enrollment).await,
        }
    }

    async fn exists_by_student_number(&self, student_number: &str) -> Result<bool, StoreError> {
        match self {
            StoreBackend::Supabase(store) => store.exists_by_student_number(student_number).await,
            StoreBackend::InMemory(store) => store.exists_by_student_number(student_number).await,
        }
    }

    async fn counts_by_track(&self) -> Result<BTreeMap<TrackId, u32>, StoreError> {
        match self {
            StoreBackend::Supabase(store) => store.counts_by_track().await,
            StoreBackend::InMemory(store) => store.counts_by_track().await,
        }
    }

    async fn list_all(&self) -> Result<Vec<EnrollmentRecord>, StoreError> {
        match self {
            StoreBackend::Supabase(store) => store.list_all().await,
            StoreBackend::InMemory(store) => store.list_all().await,
        }
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        match self {
            StoreBackend::Supabase(store) => store.delete_by_id(id).await,
            StoreBackend::InMemory(store) => store.delete_by_id(id).await,
        }
    }
}

/// Development roster with a handful of known students.
pub(crate) struct FixtureRoster;

#[async_trait]
impl RosterGateway for FixtureRoster {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, RosterError> {
        Ok(fixture_roster())
    }
}

pub(crate) fn fixture_roster() -> Vec<RosterEntry> {
    vec![
        roster_entry(
            "12345",
            "maria.santos@school.edu",
            "Maria Santos",
            "12 - Newton",
            "film-photo",
        ),
        roster_entry(
            "67890",
            "jose.ramirez@school.edu",
            "Jose Ramirez",
            "12 - Faraday",
            "electrical",
        ),
        roster_entry(
            "00000000015",
            "leo.cruz@school.edu",
            "Leo Cruz",
            "12 - Curie",
            "data-viz",
        ),
    ]
}

fn roster_entry(
    student_number: &str,
    email: &str,
    name: &str,
    section: &str,
    section_id: &str,
) -> RosterEntry {
    RosterEntry {
        student_number: student_number.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        section: section.to_string(),
        section_id: section_id.to_string(),
    }
}

#[derive(Default)]
struct StoreState {
    records: Vec<EnrollmentRecord>,
    next_id: i64,
}

/// Process-local enrollment table. Like the hosted one, it enforces no
/// uniqueness constraint on the student number.
#[derive(Default, Clone)]
pub(crate) struct InMemoryEnrollmentStore {
    state: Arc<Mutex<StoreState>>,
}

#[async_trait]
impl EnrollmentStore for InMemoryEnrollmentStore {
    async fn insert(&self, enrollment: NewEnrollment) -> Result<EnrollmentRecord, StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.next_id += 1;
        let record = EnrollmentRecord {
            id: state.next_id,
            student_number: enrollment.student_number,
            name: enrollment.name,
            email: enrollment.email,
            section: enrollment.section,
            immersion_program: enrollment.immersion_program,
            created_at: Utc::now(),
        };
        state.records.push(record.clone());
        Ok(record)
    }

    async fn exists_by_student_number(&self, student_number: &str) -> Result<bool, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .records
            .iter()
            .any(|record| record.student_number == student_number))
    }

    async fn counts_by_track(&self) -> Result<BTreeMap<TrackId, u32>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        let mut counts = BTreeMap::new();
        for record in &state.records {
            *counts.entry(record.immersion_program.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn list_all(&self) -> Result<Vec<EnrollmentRecord>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        let mut records = state.records.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let before = state.records.len();
        state.records.retain(|record| record.id != id);
        if state.records.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Process-local session storage for the CLI demo.
#[derive(Default, Clone)]
pub(crate) struct InMemoryStateStorage {
    cells: Arc<Mutex<HashMap<String, String>>>,
}

impl StateStorage for InMemoryStateStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .cells
            .lock()
            .expect("storage mutex poisoned")
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.cells
            .lock()
            .expect("storage mutex poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.cells
            .lock()
            .expect("storage mutex poisoned")
            .remove(key);
        Ok(())
    }
}
