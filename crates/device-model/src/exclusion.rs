//! User-maintained list of hidden devices.

use serde::{Deserialize, Serialize};

/// Pseudo-device standing for the platform's default input.
pub const DEFAULT_DEVICE_ID: &str = "default";

/// Pseudo-device standing for the platform's communications input.
pub const COMMUNICATIONS_DEVICE_ID: &str = "communications";

/// Whether `id` names one of the implicit, always-excluded pseudo-devices.
pub fn is_pseudo_device(id: &str) -> bool {
    id == DEFAULT_DEVICE_ID || id == COMMUNICATIONS_DEVICE_ID
}

/// Ordered set of excluded device identifiers.
///
/// The pseudo-devices are excluded implicitly and are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ExclusionList {
    ids: Vec<String>,
}

impl ExclusionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw ids, dropping duplicates and pseudo-devices while
    /// keeping first-seen order.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::new();
        for id in ids {
            list.insert(id);
        }
        list
    }

    /// Add an id. Returns `false` if it was already excluded.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Remove an id. Returns `false` if it was not listed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        self.ids.len() != before
    }

    /// Whether a device must be hidden, including the implicit pseudo-devices.
    pub fn contains(&self, id: &str) -> bool {
        is_pseudo_device(id) || self.ids.iter().any(|existing| existing == id)
    }

    /// Explicitly listed ids, in insertion order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

impl From<Vec<String>> for ExclusionList {
    fn from(ids: Vec<String>) -> Self {
        Self::from_ids(ids)
    }
}

impl From<ExclusionList> for Vec<String> {
    fn from(list: ExclusionList) -> Self {
        list.ids
    }
}
