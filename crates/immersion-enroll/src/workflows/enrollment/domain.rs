use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier into the static track catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Spreadsheet rendering of the id: dashes become spaces, uppercased
    /// ("film-photo" -> "FILM PHOTO").
    pub fn humanized(&self) -> String {
        self.0.replace('-', " ").to_uppercase()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Glyph shown next to a track in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackIcon {
    Brain,
    Gamepad,
    Users,
    Camera,
    Wind,
    BarChart,
    Map,
    Droplets,
    Lightbulb,
}

impl TrackIcon {
    pub const fn label(self) -> &'static str {
        match self {
            TrackIcon::Brain => "brain",
            TrackIcon::Gamepad => "gamepad",
            TrackIcon::Users => "users",
            TrackIcon::Camera => "camera",
            TrackIcon::Wind => "wind",
            TrackIcon::BarChart => "bar-chart",
            TrackIcon::Map => "map",
            TrackIcon::Droplets => "droplets",
            TrackIcon::Lightbulb => "lightbulb",
        }
    }
}

/// One entry of the immersion track catalog. Immutable for the process
/// lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub description: String,
    pub icon: TrackIcon,
    pub hours: u32,
}

/// Student identity data collected on the credentials step. The derived
/// fields (`full_name`, `section`, `section_id`) come only from a successful
/// roster match for the current key pair; editing either key field clears
/// them until re-verified.
///
/// Serialized with the historical camelCase names so existing draft blobs
/// keep loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    #[serde(default)]
    pub student_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub section_id: String,
    #[serde(default)]
    pub enrolled_at: Option<DateTime<Utc>>,
}

impl StudentProfile {
    pub fn clear_derived(&mut self) {
        self.full_name.clear();
        self.section.clear();
        self.section_id.clear();
    }

    pub fn adopt_roster_entry(&mut self, entry: &RosterEntry) {
        self.full_name = entry.name.clone();
        self.section = entry.section.clone();
        self.section_id = entry.section_id.clone();
    }

    pub fn has_key_pair(&self) -> bool {
        !self.student_number.trim().is_empty() && !self.email.trim().is_empty()
    }
}

/// Position in the four-step wizard. Serialized as the step number for blob
/// compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum WizardStep {
    Credentials,
    TrackSelection,
    Review,
    Success,
}

impl WizardStep {
    pub const fn number(self) -> u8 {
        match self {
            WizardStep::Credentials => 1,
            WizardStep::TrackSelection => 2,
            WizardStep::Review => 3,
            WizardStep::Success => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            WizardStep::Credentials => "credentials",
            WizardStep::TrackSelection => "track_selection",
            WizardStep::Review => "review",
            WizardStep::Success => "success",
        }
    }
}

impl From<WizardStep> for u8 {
    fn from(step: WizardStep) -> u8 {
        step.number()
    }
}

impl TryFrom<u8> for WizardStep {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(WizardStep::Credentials),
            2 => Ok(WizardStep::TrackSelection),
            3 => Ok(WizardStep::Review),
            4 => Ok(WizardStep::Success),
            other => Err(format!("wizard step out of range: {other}")),
        }
    }
}

/// The in-progress enrollment for one session: profile, track choice, and the
/// current step. Mirrored to durable state storage after every mutation so an
/// interrupted session can resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentDraft {
    pub profile: StudentProfile,
    #[serde(default)]
    pub selected_track_id: Option<TrackId>,
    pub step: WizardStep,
}

impl EnrollmentDraft {
    /// A fresh draft: empty profile, the catalog default preselected, step 1.
    pub fn fresh(default_track: TrackId) -> Self {
        Self {
            profile: StudentProfile::default(),
            selected_track_id: Some(default_track),
            step: WizardStep::Credentials,
        }
    }
}

/// One row of the published roster sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub student_number: String,
    pub email: String,
    pub name: String,
    pub section: String,
    pub section_id: String,
}

/// A persisted enrollment as the store returns it. `id` and `created_at` are
/// assigned by the store; records are never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub id: i64,
    pub student_number: String,
    pub name: String,
    pub email: String,
    pub section: String,
    pub immersion_program: TrackId,
    pub created_at: DateTime<Utc>,
}

/// The five-field insert payload sent to the store on submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEnrollment {
    pub student_number: String,
    pub name: String,
    pub email: String,
    pub section: String,
    pub immersion_program: TrackId,
}
