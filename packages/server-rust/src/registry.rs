//! Routine registry: maps exposed method names to backing identities.
//!
//! Loaded once at startup from configured entries and read-only afterwards.
//! A missed lookup is a normal, expected outcome (unknown method).

use std::collections::HashMap;

use procgate_core::RoutineIdentity;

use crate::config::RoutineEntry;

/// Read-only name → identity lookup for exposed routines.
#[derive(Debug, Default)]
pub struct RoutineRegistry {
    routines: HashMap<String, RoutineIdentity>,
}

impl RoutineRegistry {
    /// Builds the registry from configured entries. A method name appearing
    /// twice keeps the last entry.
    #[must_use]
    pub fn from_entries(entries: &[RoutineEntry]) -> Self {
        let routines = entries
            .iter()
            .map(|e| {
                (
                    e.method.clone(),
                    RoutineIdentity::new(e.nsp.clone(), e.proc.clone()),
                )
            })
            .collect();
        Self { routines }
    }

    /// Looks up the backing identity for a method name.
    #[must_use]
    pub fn lookup(&self, method: &str) -> Option<RoutineIdentity> {
        self.routines.get(method).cloned()
    }

    /// Number of exposed routines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routines.len()
    }

    /// True when no routines are exposed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}
