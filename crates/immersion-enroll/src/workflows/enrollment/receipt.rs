use thiserror::Error;

use super::domain::{EnrollmentDraft, Track, TrackId, WizardStep};

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("enrollment is not finalized")]
    NotFinalized,
    #[error("receipt rendering failed: {0}")]
    Render(String),
}

/// Display-ready view of a finalized enrollment: the student fields plus the
/// chosen track and the enrollment timestamp in its two renderings
/// ("September 1, 2025" and "04:30 PM").
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptView {
    pub student_number: String,
    pub full_name: String,
    pub email: String,
    pub section: String,
    pub track_id: TrackId,
    pub track_title: String,
    pub hours: u32,
    pub enrolled_date: String,
    pub enrolled_time: String,
}

impl ReceiptView {
    /// Flattens a post-Success draft and its track into the view. A draft
    /// that has not reached `Success`, or that carries no timestamp, is not
    /// finalized.
    pub fn compose(draft: &EnrollmentDraft, track: &Track) -> Result<Self, ReceiptError> {
        if draft.step != WizardStep::Success {
            return Err(ReceiptError::NotFinalized);
        }
        let enrolled_at = draft.profile.enrolled_at.ok_or(ReceiptError::NotFinalized)?;

        Ok(Self {
            student_number: draft.profile.student_number.clone(),
            full_name: draft.profile.full_name.clone(),
            email: draft.profile.email.clone(),
            section: draft.profile.section.clone(),
            track_id: track.id.clone(),
            track_title: track.title.clone(),
            hours: track.hours,
            enrolled_date: enrolled_at.format("%B %-d, %Y").to_string(),
            enrolled_time: enrolled_at.format("%I:%M %p").to_string(),
        })
    }
}

/// Turns a receipt view into a downloadable artifact. Pure function of its
/// input; rendering failures never touch wizard state.
pub trait ReceiptRenderer {
    fn render(&self, view: &ReceiptView) -> Result<ReceiptArtifact, ReceiptError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptArtifact {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Plain-text confirmation card, named after the chosen track.
pub struct TextReceipt;

impl ReceiptRenderer for TextReceipt {
    fn render(&self, view: &ReceiptView) -> Result<ReceiptArtifact, ReceiptError> {
        let body = [
            "WORK IMMERSION ENROLLMENT CONFIRMATION".to_string(),
            String::new(),
            format!("Student Number: {}", view.student_number),
            format!("Full Name:      {}", view.full_name),
            format!("Email:          {}", view.email),
            format!("Section:        {}", view.section),
            String::new(),
            format!("Immersion Track: {}", view.track_title),
            format!("Required Hours:  {}", view.hours),
            format!("Enrollment Date: {}", view.enrolled_date),
            format!("Enrollment Time: {}", view.enrolled_time),
            String::new(),
            "Keep a copy for your records.".to_string(),
        ]
        .join("\n");

        Ok(ReceiptArtifact {
            file_name: format!("immersion-track-{}.txt", view.track_id),
            media_type: "text/plain; charset=utf-8".to_string(),
            bytes: body.into_bytes(),
        })
    }
}
