use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::warn;

use super::capacity::{CapacityTally, TrackAvailability};
use super::catalog::TrackCatalog;
use super::domain::{EnrollmentDraft, EnrollmentRecord, TrackId};
use super::policy::EnrollmentPolicy;
use super::roster::{RosterDirectory, RosterGateway};
use super::session::{StateStorage, StorageError};
use super::store::{EnrollmentStore, StoreError};
use super::wizard::{EditEffect, EnrollmentWizard, VerificationOutcome, WizardError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs roster verification on a trailing debounce timer. Each `schedule`
/// call aborts the task still waiting out its window, so a burst of edits
/// dispatches exactly one lookup, with the final values. Results carry the
/// generation they were scheduled under; the wizard drops the ones that
/// arrive after a newer edit.
pub struct DebouncedVerifier<G, E, S> {
    wizard: Arc<Mutex<EnrollmentWizard<S>>>,
    roster: Arc<RosterDirectory<G>>,
    store: Arc<E>,
    window: Duration,
    pending: Option<AbortHandle>,
}

impl<G, E, S> DebouncedVerifier<G, E, S> {
    pub fn new(
        wizard: Arc<Mutex<EnrollmentWizard<S>>>,
        roster: Arc<RosterDirectory<G>>,
        store: Arc<E>,
        window: Duration,
    ) -> Self {
        Self {
            wizard,
            roster,
            store,
            window,
            pending: None,
        }
    }

    /// Aborts the pending lookup, if any. Called on every reschedule and
    /// when the session goes away.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<G, E, S> DebouncedVerifier<G, E, S>
where
    G: RosterGateway + 'static,
    E: EnrollmentStore + 'static,
    S: StateStorage + 'static,
{
    pub fn schedule(&mut self, generation: u64, student_number: String, email: String) {
        self.cancel();

        let wizard = Arc::clone(&self.wizard);
        let roster = Arc::clone(&self.roster);
        let store = Arc::clone(&self.store);
        let window = self.window;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;

            let outcome = match roster.verify(&student_number, &email).await {
                None => VerificationOutcome::NoMatch,
                Some(entry) => {
                    match store.exists_by_student_number(student_number.trim()).await {
                        Ok(already_enrolled) => VerificationOutcome::Match {
                            entry,
                            already_enrolled,
                        },
                        Err(error) => VerificationOutcome::CheckFailed(error.to_string()),
                    }
                }
            };

            let mut wizard = wizard.lock().await;
            if let Err(error) = wizard.apply_verification(generation, outcome) {
                warn!(%error, "failed to persist verification result");
            }
        });
        self.pending = Some(handle.abort_handle());
    }
}

impl<G, E, S> Drop for DebouncedVerifier<G, E, S> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Drives one enrollment session end to end: forwards edits to the wizard,
/// keeps the debounced verifier scheduled, refreshes the capacity tally on
/// track-selection entry, and runs the submission protocol against the
/// store.
pub struct WizardSession<G, E, S> {
    wizard: Arc<Mutex<EnrollmentWizard<S>>>,
    verifier: DebouncedVerifier<G, E, S>,
    store: Arc<E>,
}

impl<G, E, S> WizardSession<G, E, S>
where
    G: RosterGateway + 'static,
    E: EnrollmentStore + 'static,
    S: StateStorage + 'static,
{
    /// Restores the session from storage. A resumed draft that already has
    /// both key fields re-verifies immediately, since verification state is
    /// never persisted.
    pub fn restore(
        storage: S,
        catalog: TrackCatalog,
        policy: EnrollmentPolicy,
        roster: Arc<RosterDirectory<G>>,
        store: Arc<E>,
    ) -> Result<Self, StorageError> {
        let window = policy.verify_debounce;
        let mut wizard = EnrollmentWizard::restore(storage, catalog, policy)?;

        let resume = wizard.begin_verification().map(|generation| {
            let profile = &wizard.draft().profile;
            (
                generation,
                profile.student_number.clone(),
                profile.email.clone(),
            )
        });

        let wizard = Arc::new(Mutex::new(wizard));
        let mut verifier = DebouncedVerifier::new(
            Arc::clone(&wizard),
            roster,
            Arc::clone(&store),
            window,
        );
        if let Some((generation, student_number, email)) = resume {
            verifier.schedule(generation, student_number, email);
        }

        Ok(Self {
            wizard,
            verifier,
            store,
        })
    }

    pub async fn edit_student_number(&mut self, value: &str) -> Result<(), WizardError> {
        self.forward_edit(|wizard| wizard.set_student_number(value))
            .await
    }

    pub async fn edit_email(&mut self, value: &str) -> Result<(), WizardError> {
        self.forward_edit(|wizard| wizard.set_email(value)).await
    }

    async fn forward_edit<F>(&mut self, edit: F) -> Result<(), WizardError>
    where
        F: FnOnce(&mut EnrollmentWizard<S>) -> Result<EditEffect, StorageError>,
    {
        let due = {
            let mut wizard = self.wizard.lock().await;
            match edit(&mut wizard)? {
                EditEffect::Unchanged => return Ok(()),
                EditEffect::VerificationIdle => None,
                EditEffect::VerificationDue(generation) => {
                    let profile = &wizard.draft().profile;
                    Some((
                        generation,
                        profile.student_number.clone(),
                        profile.email.clone(),
                    ))
                }
            }
        };

        match due {
            Some((generation, student_number, email)) => {
                self.verifier.schedule(generation, student_number, email);
            }
            None => self.verifier.cancel(),
        }
        Ok(())
    }

    pub async fn advance_to_track_selection(&self) -> Result<Vec<TrackAvailability>, WizardError> {
        {
            let mut wizard = self.wizard.lock().await;
            wizard.advance_to_track_selection()?;
        }
        Ok(self.activate_track_selection().await)
    }

    /// Refreshes the occupancy tally and returns the annotated catalog. A
    /// store failure degrades to an empty tally with a warning so the
    /// catalog still renders; staleness until the next activation is
    /// accepted.
    pub async fn activate_track_selection(&self) -> Vec<TrackAvailability> {
        let tally = match self.store.counts_by_track().await {
            Ok(counts) => CapacityTally::from_counts(counts),
            Err(error) => {
                warn!(%error, "capacity counts unavailable; treating tracks as open");
                CapacityTally::default()
            }
        };
        let mut wizard = self.wizard.lock().await;
        wizard.set_capacity(tally);
        wizard.available_tracks()
    }

    pub async fn select_track(&self, id: &TrackId) -> Result<bool, WizardError> {
        self.wizard.lock().await.select_track(id)
    }

    pub async fn advance_to_review(&self) -> Result<(), WizardError> {
        self.wizard.lock().await.advance_to_review()
    }

    pub async fn back_to_credentials(&self) -> Result<(), WizardError> {
        self.wizard.lock().await.back_to_credentials()
    }

    pub async fn back_to_track_selection(&self) -> Result<(), WizardError> {
        self.wizard.lock().await.back_to_track_selection()
    }

    pub async fn set_affirmed(&self, affirmed: bool) {
        self.wizard.lock().await.set_affirmed(affirmed);
    }

    /// Review -> Success. The insert happens between the payload check and
    /// the step commit; when it fails, the wizard stays in Review with the
    /// draft untouched. Submissions are not idempotent, so the caller must
    /// surface the failure instead of retrying silently.
    pub async fn submit(&mut self) -> Result<EnrollmentRecord, SessionError> {
        let payload = {
            let wizard = self.wizard.lock().await;
            wizard.prepare_submission()?
        };

        let record = self.store.insert(payload).await?;

        let mut wizard = self.wizard.lock().await;
        wizard.complete_submission()?;
        Ok(record)
    }

    pub async fn reset(&mut self) -> Result<(), StorageError> {
        self.verifier.cancel();
        self.wizard.lock().await.reset()
    }

    pub async fn draft(&self) -> EnrollmentDraft {
        self.wizard.lock().await.draft().clone()
    }

    pub async fn status(&self) -> super::wizard::VerificationStatus {
        self.wizard.lock().await.status().clone()
    }

    pub async fn already_enrolled(&self) -> bool {
        self.wizard.lock().await.already_enrolled()
    }

    /// Shared handle to the underlying wizard, for callers that need direct
    /// access in tests or rendering code.
    pub fn wizard(&self) -> Arc<Mutex<EnrollmentWizard<S>>> {
        Arc::clone(&self.wizard)
    }
}
