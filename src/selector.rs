//! Ventilation episode selection
//!
//! Only the first recorded episode of each encounter is considered, and only
//! when that episode ended in a successful extubation.

use crate::types::VentilationEvent;
use std::collections::HashSet;

/// Result of selecting first successful episodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// One event per encounter, in order of first appearance
    pub events: Vec<VentilationEvent>,
    /// Distinct encounters seen in the input
    pub encounters_seen: usize,
    /// Encounters whose first episode was unsuccessful
    pub unsuccessful: usize,
}

/// Picks the first episode per encounter and keeps the successful ones
pub struct EventSelector;

impl EventSelector {
    pub fn select(events: &[VentilationEvent]) -> Selection {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut selection = Selection::default();

        for event in events {
            if !seen.insert(event.encounter.as_str()) {
                continue;
            }
            if event.success {
                selection.events.push(event.clone());
            } else {
                selection.unsuccessful += 1;
            }
        }

        selection.encounters_seen = seen.len();

        tracing::info!(
            encounters = selection.encounters_seen,
            selected = selection.events.len(),
            "selected first successful ventilation episodes"
        );

        selection
    }
}
