use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::enrollment::catalog::TrackCatalog;
use crate::workflows::enrollment::domain::{EnrollmentRecord, NewEnrollment, RosterEntry, TrackId};
use crate::workflows::enrollment::policy::EnrollmentPolicy;
use crate::workflows::enrollment::roster::{RosterDirectory, RosterError, RosterGateway};
use crate::workflows::enrollment::service::EnrollmentService;
use crate::workflows::enrollment::session::{StateStorage, StorageError};
use crate::workflows::enrollment::store::{EnrollmentStore, StoreError};
use crate::workflows::enrollment::verify::WizardSession;
use crate::workflows::enrollment::wizard::{EnrollmentWizard, VerificationOutcome};
use crate::workflows::enrollment::AdminCredentials;

pub(super) fn maria() -> RosterEntry {
    RosterEntry {
        student_number: "12345".to_string(),
        email: "maria.santos@example.edu".to_string(),
        name: "Maria Santos".to_string(),
        section: "12 - Newton".to_string(),
        section_id: "film-photo".to_string(),
    }
}

pub(super) fn leo() -> RosterEntry {
    RosterEntry {
        student_number: "00000000015".to_string(),
        email: "leo.cruz@example.edu".to_string(),
        name: "Leo Cruz".to_string(),
        section: "12 - Faraday".to_string(),
        section_id: "electrical".to_string(),
    }
}

pub(super) fn catalog() -> TrackCatalog {
    TrackCatalog::standard()
}

pub(super) fn policy() -> EnrollmentPolicy {
    EnrollmentPolicy::default()
}

pub(super) fn credentials() -> AdminCredentials {
    AdminCredentials {
        username: "registrar".to_string(),
        password: "open-sesame".to_string(),
    }
}

pub(super) fn timestamp(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 8, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn record(id: i64, student_number: &str, name: &str, program: &str) -> EnrollmentRecord {
    EnrollmentRecord {
        id,
        student_number: student_number.to_string(),
        name: name.to_string(),
        email: format!("{student_number}@example.edu"),
        section: "12 - Newton".to_string(),
        immersion_program: TrackId::new(program),
        created_at: timestamp((id % 60) as u32),
    }
}

/// Wizard over fresh in-memory storage.
pub(super) fn new_wizard() -> (EnrollmentWizard<MemoryStorage>, MemoryStorage) {
    let storage = MemoryStorage::default();
    let wizard = EnrollmentWizard::restore(storage.clone(), catalog(), policy())
        .expect("restore wizard");
    (wizard, storage)
}

/// Wizard with an applied roster match for `entry`, still on the
/// credentials step.
pub(super) fn verified_wizard(entry: &RosterEntry) -> (EnrollmentWizard<MemoryStorage>, MemoryStorage) {
    let (mut wizard, storage) = new_wizard();
    wizard
        .set_student_number(&entry.student_number)
        .expect("set student number");
    wizard.set_email(&entry.email).expect("set email");
    wizard
        .apply_verification(
            wizard.generation(),
            VerificationOutcome::Match {
                entry: entry.clone(),
                already_enrolled: false,
            },
        )
        .expect("apply verification");
    (wizard, storage)
}

pub(super) fn directory(roster: MemoryRoster) -> Arc<RosterDirectory<MemoryRoster>> {
    Arc::new(RosterDirectory::new(roster, policy().roster_cache_ttl))
}

pub(super) fn session_with(
    storage: MemoryStorage,
    roster: MemoryRoster,
    store: MemoryStore,
) -> WizardSession<MemoryRoster, MemoryStore, MemoryStorage> {
    WizardSession::restore(
        storage,
        catalog(),
        policy(),
        directory(roster),
        Arc::new(store),
    )
    .expect("restore session")
}

pub(super) fn service_with(
    roster: MemoryRoster,
    store: MemoryStore,
) -> Arc<EnrollmentService<MemoryRoster, MemoryStore>> {
    Arc::new(EnrollmentService::new(
        directory(roster),
        Arc::new(store),
        catalog(),
        policy(),
        Some(credentials()),
    ))
}

#[derive(Default, Clone)]
pub(super) struct MemoryStorage {
    cells: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub(super) fn raw(&self, key: &str) -> Option<String> {
        self.cells
            .lock()
            .expect("storage mutex poisoned")
            .get(key)
            .cloned()
    }

    pub(super) fn put_raw(&self, key: &str, value: &str) {
        self.cells
            .lock()
            .expect("storage mutex poisoned")
            .insert(key.to_string(), value.to_string());
    }
}

impl StateStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.raw(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.put_raw(key, value);
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

/// Reads come back empty, writes fail.
pub(super) struct FailingStorage;

impl StateStorage for FailingStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage offline".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRoster {
    rows: Arc<Mutex<Vec<RosterEntry>>>,
    fetches: Arc<AtomicUsize>,
}

impl MemoryRoster {
    pub(super) fn with_rows(rows: Vec<RosterEntry>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(super) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(super) fn replace_rows(&self, rows: Vec<RosterEntry>) {
        *self.rows.lock().expect("roster mutex poisoned") = rows;
    }
}

#[async_trait]
impl RosterGateway for MemoryRoster {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, RosterError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().expect("roster mutex poisoned").clone())
    }
}

#[derive(Default, Clone)]
pub(super) struct FailingRoster {
    fetches: Arc<AtomicUsize>,
}

impl FailingRoster {
    pub(super) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RosterGateway for FailingRoster {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, RosterError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Err(RosterError::Unavailable("sheet offline".to_string()))
    }
}

#[derive(Default)]
struct StoreState {
    records: Vec<EnrollmentRecord>,
    next_id: i64,
}

/// In-memory stand-in for the hosted table, with switches to fail inserts
/// or reads on demand.
#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    inserts: Arc<Mutex<Vec<NewEnrollment>>>,
    insert_failure: Arc<AtomicBool>,
    read_failure: Arc<AtomicBool>,
}

impl MemoryStore {
    pub(super) fn seed(&self, student_number: &str, name: &str, program: &str) -> EnrollmentRecord {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.next_id += 1;
        let record = EnrollmentRecord {
            id: state.next_id,
            student_number: student_number.to_string(),
            name: name.to_string(),
            email: format!("{student_number}@example.edu"),
            section: "12 - Newton".to_string(),
            immersion_program: TrackId::new(program),
            created_at: timestamp((state.next_id % 60) as u32),
        };
        state.records.push(record.clone());
        record
    }

    pub(super) fn fill_track(&self, program: &str, count: u32) {
        for index in 0..count {
            self.seed(&format!("9{index:07}"), "Seed Student", program);
        }
    }

    pub(super) fn inserts(&self) -> Vec<NewEnrollment> {
        self.inserts.lock().expect("store mutex poisoned").clone()
    }

    pub(super) fn records(&self) -> Vec<EnrollmentRecord> {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .records
            .clone()
    }

    pub(super) fn fail_inserts(&self) {
        self.insert_failure.store(true, Ordering::SeqCst);
    }

    pub(super) fn fail_reads(&self) {
        self.read_failure.store(true, Ordering::SeqCst);
    }

    fn offline() -> StoreError {
        StoreError::Unavailable("database offline".to_string())
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn insert(&self, enrollment: NewEnrollment) -> Result<EnrollmentRecord, StoreError> {
        if self.insert_failure.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        self.inserts
            .lock()
            .expect("store mutex poisoned")
            .push(enrollment.clone());
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.next_id += 1;
        let record = EnrollmentRecord {
            id: state.next_id,
            student_number: enrollment.student_number,
            name: enrollment.name,
            email: enrollment.email,
            section: enrollment.section,
            immersion_program: enrollment.immersion_program,
            created_at: timestamp((state.next_id % 60) as u32),
        };
        state.records.push(record.clone());
        Ok(record)
    }

    async fn exists_by_student_number(&self, student_number: &str) -> Result<bool, StoreError> {
        if self.read_failure.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .records
            .iter()
            .any(|record| record.student_number == student_number))
    }

    async fn counts_by_track(&self) -> Result<BTreeMap<TrackId, u32>, StoreError> {
        if self.read_failure.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        let state = self.state.lock().expect("store mutex poisoned");
        let mut counts = BTreeMap::new();
        for record in &state.records {
            *counts.entry(record.immersion_program.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn list_all(&self) -> Result<Vec<EnrollmentRecord>, StoreError> {
        if self.read_failure.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        let state = self.state.lock().expect("store mutex poisoned");
        let mut records = state.records.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        if self.read_failure.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        let mut state = self.state.lock().expect("store mutex poisoned");
        let before = state.records.len();
        state.records.retain(|record| record.id != id);
        if state.records.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
