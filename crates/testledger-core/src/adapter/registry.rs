//! Adapter registry -- the ordered list of adapters used for detection and
//! name lookup.
//!
//! Order matters: when a project carries artifacts of more than one
//! framework, the first registered adapter that detects wins.

use std::path::Path;

use tracing::debug;

use super::{Adapter, Detection};

/// Ordered collection of [`Adapter`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterRegistry {
    adapters: Vec<Adapter>,
}

impl Default for AdapterRegistry {
    /// webdriverio, playwright, cypress.
    fn default() -> Self {
        Self {
            adapters: Adapter::ALL.to_vec(),
        }
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// First adapter, in registry order, whose detection succeeds in `dir`.
    pub fn detect_framework(&self, dir: &Path) -> Option<(Adapter, Detection)> {
        self.adapters.iter().find_map(|&adapter| {
            let detection = adapter.detect(dir);
            debug!(adapter = %adapter, detected = detection.detected, "framework detection");
            detection.detected.then_some((adapter, detection))
        })
    }

    /// Look up an adapter by canonical name or alias, case-insensitively.
    ///
    /// Returns `None` for unknown names.
    pub fn resolve(&self, name: &str) -> Option<Adapter> {
        let normalized = name.trim().to_ascii_lowercase();
        self.adapters.iter().copied().find(|adapter| {
            adapter.name() == normalized || adapter.aliases().contains(&normalized.as_str())
        })
    }

    /// Canonical names in registry order.
    pub fn list(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }
}
