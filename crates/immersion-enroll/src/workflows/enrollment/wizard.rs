use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use super::capacity::{track_availability, CapacityTally, TrackAvailability};
use super::catalog::TrackCatalog;
use super::domain::{EnrollmentDraft, NewEnrollment, RosterEntry, TrackId, WizardStep};
use super::policy::EnrollmentPolicy;
use super::session::{DraftVault, StateStorage, StorageError};

/// Outcome of the most recent identity check for the current key pair.
/// `Failed` carries a duplicate-guard transport error; roster transport
/// failures surface as `NotFound` (the lookup degrades them before they get
/// here).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    Idle,
    Pending,
    Verified,
    NotFound,
    Failed(String),
}

/// Result of a scheduled identity check, handed back to the wizard together
/// with the generation it was scheduled under.
#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    Match {
        entry: RosterEntry,
        already_enrolled: bool,
    },
    NoMatch,
    CheckFailed(String),
}

/// What a key-field edit asks the scheduler to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditEffect {
    /// The field value did not change; leave any pending lookup alone.
    Unchanged,
    /// The pair is incomplete; cancel any pending lookup.
    VerificationIdle,
    /// Both key fields are set; schedule a lookup under this generation.
    VerificationDue(u64),
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("identity has not been verified yet")]
    VerificationPending,
    #[error("student was not found on the roster")]
    NotFound,
    #[error("identity verification failed: {0}")]
    VerificationFailed(String),
    #[error("student is already enrolled")]
    AlreadyEnrolled,
    #[error("no track is selected")]
    NoTrackSelected,
    #[error("track {0} is not in the catalog")]
    UnknownTrack(TrackId),
    #[error("students may not choose their own section's track")]
    OwnSectionTrack,
    #[error("track {0} is at capacity")]
    TrackFull(TrackId),
    #[error("submission requires the accuracy affirmation")]
    NotAffirmed,
    #[error("enrollment is already complete")]
    EnrollmentComplete,
    #[error("expected step {expected:?}, wizard is on {actual:?}")]
    WrongStep {
        expected: WizardStep,
        actual: WizardStep,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The four-step enrollment state machine. Owns the draft and mirrors every
/// draft mutation to the vault synchronously before committing it in memory,
/// so a crashed session resumes exactly where it stopped and a failed write
/// never leaves memory ahead of storage.
///
/// Verification runs outside the wizard (it involves network calls); the
/// wizard hands out a generation number with each key-field edit and ignores
/// results that come back under an older generation.
pub struct EnrollmentWizard<S> {
    vault: DraftVault<S>,
    catalog: TrackCatalog,
    policy: EnrollmentPolicy,
    draft: EnrollmentDraft,
    status: VerificationStatus,
    already_enrolled: bool,
    affirmed: bool,
    capacity: CapacityTally,
    generation: u64,
}

impl<S: StateStorage> EnrollmentWizard<S> {
    /// Restores the wizard from storage, falling back to a fresh draft when
    /// nothing usable is stored. Verification state is not persisted; a
    /// resumed session re-verifies its key pair.
    pub fn restore(
        storage: S,
        catalog: TrackCatalog,
        policy: EnrollmentPolicy,
    ) -> Result<Self, StorageError> {
        let vault = DraftVault::new(storage, catalog.default_track_id());
        let draft = vault.load()?;
        Ok(Self {
            vault,
            catalog,
            policy,
            draft,
            status: VerificationStatus::Idle,
            already_enrolled: false,
            affirmed: false,
            capacity: CapacityTally::default(),
            generation: 0,
        })
    }

    pub fn draft(&self) -> &EnrollmentDraft {
        &self.draft
    }

    pub fn step(&self) -> WizardStep {
        self.draft.step
    }

    pub fn status(&self) -> &VerificationStatus {
        &self.status
    }

    pub fn already_enrolled(&self) -> bool {
        self.already_enrolled
    }

    pub fn affirmed(&self) -> bool {
        self.affirmed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn catalog(&self) -> &TrackCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> &EnrollmentPolicy {
        &self.policy
    }

    /// Marks the current key pair as pending and returns the generation a
    /// scheduled lookup must present. Used when resuming a stored draft that
    /// already carries both key fields.
    pub fn begin_verification(&mut self) -> Option<u64> {
        if !self.draft.profile.has_key_pair() {
            return None;
        }
        self.generation += 1;
        self.status = VerificationStatus::Pending;
        Some(self.generation)
    }

    pub fn set_student_number(&mut self, value: &str) -> Result<EditEffect, StorageError> {
        if self.draft.profile.student_number.trim() == value.trim() {
            return Ok(EditEffect::Unchanged);
        }
        let mut draft = self.draft.clone();
        draft.profile.student_number = value.to_string();
        self.commit_key_edit(draft)
    }

    pub fn set_email(&mut self, value: &str) -> Result<EditEffect, StorageError> {
        if self.draft.profile.email.trim() == value.trim() {
            return Ok(EditEffect::Unchanged);
        }
        let mut draft = self.draft.clone();
        draft.profile.email = value.to_string();
        self.commit_key_edit(draft)
    }

    /// Shared tail of a key-field edit: stale derived identity is cleared
    /// before the write so it can never survive an edit, and the generation
    /// moves so in-flight lookups for the old pair are orphaned.
    fn commit_key_edit(&mut self, mut draft: EnrollmentDraft) -> Result<EditEffect, StorageError> {
        draft.profile.clear_derived();
        self.vault.save(&draft)?;
        self.draft = draft;
        self.already_enrolled = false;
        self.generation += 1;
        if self.draft.profile.has_key_pair() {
            self.status = VerificationStatus::Pending;
            Ok(EditEffect::VerificationDue(self.generation))
        } else {
            self.status = VerificationStatus::Idle;
            Ok(EditEffect::VerificationIdle)
        }
    }

    /// Installs a verification result. Results scheduled under an older
    /// generation are dropped silently; the edit that bumped the generation
    /// already reset the status.
    pub fn apply_verification(
        &mut self,
        generation: u64,
        outcome: VerificationOutcome,
    ) -> Result<(), StorageError> {
        if generation != self.generation {
            debug!(
                stale = generation,
                current = self.generation,
                "discarding stale verification result"
            );
            return Ok(());
        }

        let mut draft = self.draft.clone();
        match outcome {
            VerificationOutcome::Match {
                entry,
                already_enrolled,
            } => {
                draft.profile.adopt_roster_entry(&entry);
                self.vault.save(&draft)?;
                self.draft = draft;
                self.already_enrolled = already_enrolled;
                self.status = VerificationStatus::Verified;
            }
            VerificationOutcome::NoMatch => {
                draft.profile.clear_derived();
                self.vault.save(&draft)?;
                self.draft = draft;
                self.already_enrolled = false;
                self.status = VerificationStatus::NotFound;
            }
            VerificationOutcome::CheckFailed(message) => {
                draft.profile.clear_derived();
                self.vault.save(&draft)?;
                self.draft = draft;
                self.already_enrolled = false;
                self.status = VerificationStatus::Failed(message);
            }
        }
        Ok(())
    }

    /// Installs the occupancy snapshot fetched on track-selection entry.
    pub fn set_capacity(&mut self, tally: CapacityTally) {
        self.capacity = tally;
    }

    pub fn capacity(&self) -> &CapacityTally {
        &self.capacity
    }

    /// The catalog annotated against the current tally and the student's own
    /// section.
    pub fn available_tracks(&self) -> Vec<TrackAvailability> {
        let own = self.draft.profile.section_id.as_str();
        track_availability(
            &self.catalog,
            (!own.is_empty()).then_some(own),
            &self.capacity,
            self.policy.capacity_ceiling,
        )
    }

    /// Records a track choice. Unknown ids are an error; own-section and
    /// full tracks are a quiet no-op (`Ok(false)`), matching how the closed
    /// entries behave as disabled choices rather than failures.
    pub fn select_track(&mut self, id: &TrackId) -> Result<bool, WizardError> {
        if !self.catalog.contains(id) {
            return Err(WizardError::UnknownTrack(id.clone()));
        }
        if self.draft.profile.section_id == id.as_str()
            || self.capacity.count(id) >= self.policy.capacity_ceiling
        {
            return Ok(false);
        }

        let mut draft = self.draft.clone();
        draft.selected_track_id = Some(id.clone());
        self.vault.save(&draft)?;
        self.draft = draft;
        Ok(true)
    }

    /// The Review-step affirmation checkbox. Not persisted; a resumed
    /// session re-affirms.
    pub fn set_affirmed(&mut self, affirmed: bool) {
        self.affirmed = affirmed;
    }

    /// Credentials -> TrackSelection. Requires an applied roster match for
    /// the current pair and no existing record for the student number.
    pub fn advance_to_track_selection(&mut self) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Credentials)?;
        match &self.status {
            VerificationStatus::Verified => {}
            VerificationStatus::Idle | VerificationStatus::Pending => {
                return Err(WizardError::VerificationPending)
            }
            VerificationStatus::NotFound => return Err(WizardError::NotFound),
            VerificationStatus::Failed(message) => {
                return Err(WizardError::VerificationFailed(message.clone()))
            }
        }
        if self.already_enrolled {
            return Err(WizardError::AlreadyEnrolled);
        }
        self.commit_step(WizardStep::TrackSelection)?;
        Ok(())
    }

    /// TrackSelection -> Review. Requires a selected track that is known,
    /// not the student's own section, and under the ceiling. Stamps the
    /// enrollment timestamp on first entry.
    pub fn advance_to_review(&mut self) -> Result<(), WizardError> {
        self.expect_step(WizardStep::TrackSelection)?;
        let id = self
            .draft
            .selected_track_id
            .clone()
            .ok_or(WizardError::NoTrackSelected)?;
        if !self.catalog.contains(&id) {
            return Err(WizardError::UnknownTrack(id));
        }
        if self.draft.profile.section_id == id.as_str() {
            return Err(WizardError::OwnSectionTrack);
        }
        if self.capacity.count(&id) >= self.policy.capacity_ceiling {
            return Err(WizardError::TrackFull(id));
        }

        let mut draft = self.draft.clone();
        draft.step = WizardStep::Review;
        if draft.profile.enrolled_at.is_none() {
            draft.profile.enrolled_at = Some(Utc::now());
        }
        self.vault.save(&draft)?;
        self.draft = draft;
        Ok(())
    }

    /// TrackSelection -> Credentials. Never resets entered data.
    pub fn back_to_credentials(&mut self) -> Result<(), WizardError> {
        self.expect_step(WizardStep::TrackSelection)?;
        self.commit_step(WizardStep::Credentials)?;
        Ok(())
    }

    /// Review -> TrackSelection. Never resets entered data.
    pub fn back_to_track_selection(&mut self) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Review)?;
        self.commit_step(WizardStep::TrackSelection)?;
        Ok(())
    }

    /// Builds the store payload for the current draft. Pure: the wizard only
    /// moves to `Success` once the caller reports the insert succeeded, so a
    /// failed submission leaves the draft untouched in Review.
    pub fn prepare_submission(&self) -> Result<NewEnrollment, WizardError> {
        self.expect_step(WizardStep::Review)?;
        if !self.affirmed {
            return Err(WizardError::NotAffirmed);
        }
        let id = self
            .draft
            .selected_track_id
            .clone()
            .ok_or(WizardError::NoTrackSelected)?;
        Ok(NewEnrollment {
            student_number: self.draft.profile.student_number.clone(),
            name: self.draft.profile.full_name.clone(),
            email: self.draft.profile.email.clone(),
            section: self.draft.profile.section.clone(),
            immersion_program: id,
        })
    }

    /// Commits the step change after a successful insert. `Success` is
    /// terminal; there is no transition back into the draft.
    pub fn complete_submission(&mut self) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Review)?;
        self.commit_step(WizardStep::Success)?;
        Ok(())
    }

    /// Starts a new session after a completed enrollment: clears the stored
    /// blob and reinstalls the defaults.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.vault.clear()?;
        let fresh = self.vault.default_draft();
        self.vault.save(&fresh)?;
        self.draft = fresh;
        self.status = VerificationStatus::Idle;
        self.already_enrolled = false;
        self.affirmed = false;
        self.capacity = CapacityTally::default();
        self.generation += 1;
        Ok(())
    }

    fn expect_step(&self, expected: WizardStep) -> Result<(), WizardError> {
        match self.draft.step {
            actual if actual == expected => Ok(()),
            WizardStep::Success => Err(WizardError::EnrollmentComplete),
            actual => Err(WizardError::WrongStep { expected, actual }),
        }
    }

    fn commit_step(&mut self, step: WizardStep) -> Result<(), StorageError> {
        let mut draft = self.draft.clone();
        draft.step = step;
        self.vault.save(&draft)?;
        self.draft = draft;
        Ok(())
    }
}
