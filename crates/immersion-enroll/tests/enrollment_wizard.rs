use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use immersion_enroll::workflows::enrollment::{
    EnrollmentPolicy, EnrollmentRecord, EnrollmentStore, NewEnrollment, ReceiptRenderer,
    ReceiptView, RosterDirectory, RosterEntry, RosterError, RosterGateway, SessionError,
    StateStorage, StorageError, StoreError, TextReceipt, TrackCatalog, TrackId,
    VerificationStatus, WizardSession, WizardStep,
};

#[derive(Default, Clone)]
struct MemoryStorage {
    cells: Arc<Mutex<HashMap<String, String>>>,
}

impl StateStorage for MemoryStorage {
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

struct StaticRoster {
    rows: Vec<RosterEntry>,
}

#[async_trait]
impl RosterGateway for StaticRoster {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, RosterError> {
        Ok(self.rows.clone())
    }
}

#[derive(Default, Clone)]
struct MemoryStore {
    records: Arc<Mutex<Vec<EnrollmentRecord>>>,
    next_id: Arc<AtomicUsize>,
    insert_calls: Arc<AtomicUsize>,
    fail_next_insert: Arc<AtomicBool>,
}

impl MemoryStore {
    fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }

    fn records(&self) -> Vec<EnrollmentRecord> {
        self.records.lock().expect("store mutex poisoned").clone()
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn insert(&self, enrollment: NewEnrollment) -> Result<EnrollmentRecord, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("database offline".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        let record = EnrollmentRecord {
            id,
            student_number: enrollment.student_number,
            name: enrollment.name,
            email: enrollment.email,
            section: enrollment.section,
            immersion_program: enrollment.immersion_program,
            created_at: Utc
                .with_ymd_and_hms(2025, 9, 1, 8, 30, 0)
                .single()
                .expect("valid timestamp"),
        };
        self.records
            .lock()
            .expect("store mutex poisoned")
            .push(record.clone());
        Ok(record)
    }

    async fn exists_by_student_number(&self, student_number: &str) -> Result<bool, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("store mutex poisoned")
            .iter()
            .any(|record| record.student_number == student_number))
    }

    async fn counts_by_track(&self) -> Result<BTreeMap<TrackId, u32>, StoreError> {
        let mut counts = BTreeMap::new();
        for record in self.records.lock().expect("store mutex poisoned").iter() {
            *counts.entry(record.immersion_program.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn list_all(&self) -> Result<Vec<EnrollmentRecord>, StoreError> {
        let mut records = self.records.lock().expect("store mutex poisoned").clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("store mutex poisoned");
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn maria() -> RosterEntry {
    RosterEntry {
        student_number: "12345".to_string(),
        email: "maria.santos@example.edu".to_string(),
        name: "Maria Santos".to_string(),
        section: "12 - Newton".to_string(),
        section_id: "film-photo".to_string(),
    }
}

fn session(
    storage: MemoryStorage,
    store: MemoryStore,
) -> WizardSession<StaticRoster, MemoryStore, MemoryStorage> {
    let policy = EnrollmentPolicy::default();
    let roster = Arc::new(RosterDirectory::new(
        StaticRoster { rows: vec![maria()] },
        policy.roster_cache_ttl,
    ));
    WizardSession::restore(
        storage,
        TrackCatalog::standard(),
        policy,
        roster,
        Arc::new(store),
    )
    .expect("session restores")
}

async fn verify(session: &mut WizardSession<StaticRoster, MemoryStore, MemoryStorage>) {
    session
        .edit_student_number("12345")
        .await
        .expect("edit student number");
    session
        .edit_email("maria.santos@example.edu")
        .await
        .expect("edit email");
    tokio::time::sleep(Duration::from_millis(810)).await;
}

#[tokio::test(start_paused = true)]
async fn student_completes_an_enrollment_end_to_end() {
    let store = MemoryStore::default();
    let mut session = session(MemoryStorage::default(), store.clone());

    verify(&mut session).await;
    assert_eq!(session.status().await, VerificationStatus::Verified);
    assert_eq!(session.draft().await.profile.full_name, "Maria Santos");

    let availability = session
        .advance_to_track_selection()
        .await
        .expect("advance to tracks");
    let own = availability
        .iter()
        .find(|entry| entry.track.id.as_str() == "film-photo")
        .expect("own section listed");
    assert!(own.is_own_section);
    assert!(!own.selectable());

    assert!(!session
        .select_track(&TrackId::new("film-photo"))
        .await
        .expect("own section selection is a noop"));
    assert!(session
        .select_track(&TrackId::new("psychology"))
        .await
        .expect("selection sticks"));

    session.advance_to_review().await.expect("advance to review");
    session.set_affirmed(true).await;
    let record = session.submit().await.expect("submission succeeds");

    assert_eq!(store.insert_calls(), 1);
    assert_eq!(record.student_number, "12345");
    assert_eq!(record.name, "Maria Santos");
    assert_eq!(record.email, "maria.santos@example.edu");
    assert_eq!(record.section, "12 - Newton");
    assert_eq!(record.immersion_program, TrackId::new("psychology"));

    let draft = session.draft().await;
    assert_eq!(draft.step, WizardStep::Success);

    let catalog = TrackCatalog::standard();
    let track = catalog
        .get(&TrackId::new("psychology"))
        .expect("track in catalog");
    let view = ReceiptView::compose(&draft, track).expect("receipt composes");
    let artifact = TextReceipt.render(&view).expect("receipt renders");
    assert_eq!(artifact.file_name, "immersion-track-psychology.txt");
    let body = String::from_utf8(artifact.bytes).expect("utf8 receipt");
    assert!(body.contains("Maria Santos"));
    assert!(body.contains("Mind Talks: Psychology & Life"));
}

#[tokio::test(start_paused = true)]
async fn interrupted_session_resumes_where_it_stopped() {
    let storage = MemoryStorage::default();
    let store = MemoryStore::default();

    {
        let mut first = session(storage.clone(), store.clone());
        verify(&mut first).await;
        first
            .advance_to_track_selection()
            .await
            .expect("advance to tracks");
        first
            .select_track(&TrackId::new("psychology"))
            .await
            .expect("selection sticks");
    }

    let resumed = session(storage, store);
    let draft = resumed.draft().await;
    assert_eq!(draft.step, WizardStep::TrackSelection);
    assert_eq!(draft.selected_track_id, Some(TrackId::new("psychology")));
    assert_eq!(draft.profile.student_number, "12345");

    assert_eq!(resumed.status().await, VerificationStatus::Pending);
    tokio::time::sleep(Duration::from_millis(810)).await;
    assert_eq!(resumed.status().await, VerificationStatus::Verified);
    assert_eq!(resumed.draft().await.profile.full_name, "Maria Santos");
}

#[tokio::test(start_paused = true)]
async fn failed_submission_leaves_the_wizard_in_review() {
    let store = MemoryStore::default();
    let mut session = session(MemoryStorage::default(), store.clone());

    verify(&mut session).await;
    session
        .advance_to_track_selection()
        .await
        .expect("advance to tracks");
    session
        .select_track(&TrackId::new("psychology"))
        .await
        .expect("selection sticks");
    session.advance_to_review().await.expect("advance to review");
    session.set_affirmed(true).await;

    store.fail_next_insert();
    match session.submit().await {
        Err(SessionError::Store(StoreError::Unavailable(_))) => {}
        other => panic!("expected a store error, got {other:?}"),
    }
    let draft = session.draft().await;
    assert_eq!(draft.step, WizardStep::Review);
    assert_eq!(draft.selected_track_id, Some(TrackId::new("psychology")));
    assert!(store.records().is_empty());

    session.submit().await.expect("retry succeeds");
    assert_eq!(session.draft().await.step, WizardStep::Success);
    assert_eq!(store.insert_calls(), 2);
    assert_eq!(store.records().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn reset_after_success_starts_a_clean_draft() {
    let store = MemoryStore::default();
    let mut session = session(MemoryStorage::default(), store.clone());

    verify(&mut session).await;
    session
        .advance_to_track_selection()
        .await
        .expect("advance to tracks");
    session.advance_to_review().await.expect("advance to review");
    session.set_affirmed(true).await;
    session.submit().await.expect("submission succeeds");

    session.reset().await.expect("reset");

    let draft = session.draft().await;
    assert_eq!(draft.step, WizardStep::Credentials);
    assert!(draft.profile.student_number.is_empty());
    assert!(draft.profile.full_name.is_empty());
    assert_eq!(draft.selected_track_id, Some(TrackId::new("ai")));
    assert_eq!(session.status().await, VerificationStatus::Idle);
}
