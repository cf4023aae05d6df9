//! Work immersion enrollment: the four-step wizard, roster verification,
//! capacity gating, submission, receipts, and the registrar's admin console.
//!
//! The wizard core (`wizard`, `capacity`, `catalog`) is synchronous and owns
//! no I/O; the ports (`roster`, `store`, `session`) put the hosted roster
//! sheet, the enrollment table, and the session blob behind traits; `verify`
//! adds the debounced lookup scheduling on top; `service` and `router`
//! expose the server-side surface.

pub mod admin;
pub mod capacity;
pub mod catalog;
pub mod domain;
pub mod policy;
pub mod receipt;
pub mod roster;
pub mod router;
pub mod service;
pub mod session;
pub mod store;
pub mod verify;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use admin::{
    export_csv, filter_records, AdminConsole, AdminCredentials, AdminError, EnrollmentExport,
};
pub use capacity::{track_availability, CapacityTally, TrackAvailability};
pub use catalog::TrackCatalog;
pub use domain::{
    EnrollmentDraft, EnrollmentRecord, NewEnrollment, RosterEntry, StudentProfile, Track,
    TrackIcon, TrackId, WizardStep,
};
pub use policy::EnrollmentPolicy;
pub use receipt::{ReceiptArtifact, ReceiptError, ReceiptRenderer, ReceiptView, TextReceipt};
pub use roster::{OpenSheetRoster, RosterDirectory, RosterError, RosterGateway};
pub use router::enrollment_router;
pub use service::{EnrollmentService, ServiceError, VerificationReport};
pub use session::{DraftVault, StateStorage, StorageError, ADMIN_FLAG_KEY, DRAFT_KEY};
pub use store::{EnrollmentStore, StoreError, SupabaseEnrollmentStore};
pub use verify::{DebouncedVerifier, SessionError, WizardSession};
pub use wizard::{
    EditEffect, EnrollmentWizard, VerificationOutcome, VerificationStatus, WizardError,
};
