use std::collections::BTreeMap;

use super::catalog::TrackCatalog;
use super::domain::{EnrollmentRecord, Track, TrackId};

/// Per-track occupancy derived from the full enrollment record set.
/// Recomputed on demand; never maintained incrementally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapacityTally {
    counts: BTreeMap<TrackId, u32>,
}

impl CapacityTally {
    pub fn from_counts(counts: BTreeMap<TrackId, u32>) -> Self {
        Self { counts }
    }

    pub fn from_records(records: &[EnrollmentRecord]) -> Self {
        let mut counts = BTreeMap::new();
        for record in records {
            *counts.entry(record.immersion_program.clone()).or_insert(0) += 1;
        }
        Self { counts }
    }

    /// Occupancy for a track; tracks with no records count as zero.
    pub fn count(&self, id: &TrackId) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// A catalog entry annotated with the occupancy flags a student sees on the
/// track selection step. Full and own-section tracks stay in the sequence for
/// transparency; `selectable` tells them apart from open choices.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackAvailability {
    pub track: Track,
    pub enrolled: u32,
    pub ceiling: u32,
    pub is_own_section: bool,
    pub is_full: bool,
}

impl TrackAvailability {
    pub fn selectable(&self) -> bool {
        !self.is_own_section && !self.is_full
    }
}

/// Annotates every catalog entry, preserving catalog order. A student may not
/// choose the track matching their own section, and a track at or above the
/// ceiling is closed.
pub fn track_availability(
    catalog: &TrackCatalog,
    own_section_id: Option<&str>,
    tally: &CapacityTally,
    ceiling: u32,
) -> Vec<TrackAvailability> {
    catalog
        .tracks()
        .iter()
        .map(|track| {
            let enrolled = tally.count(&track.id);
            let is_own_section = own_section_id
                .map(|own| !own.is_empty() && own == track.id.as_str())
                .unwrap_or(false);
            TrackAvailability {
                track: track.clone(),
                enrolled,
                ceiling,
                is_own_section,
                is_full: enrolled >= ceiling,
            }
        })
        .collect()
}
