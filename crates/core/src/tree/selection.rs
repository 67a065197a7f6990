#![forbid(unsafe_code)]

use std::collections::BTreeSet;

/// Multi-select state: a set of ids plus one primary id.
///
/// The primary is always a member of the set. When it leaves the set it is
/// reassigned to the smallest remaining id; it is `None` only when the set is
/// empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<String>,
    primary: Option<String>,
}

impl Selection {
    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Plain click replaces the selection; additive (shift) click toggles
    /// membership of `id`.
    pub fn click(&mut self, id: &str, additive: bool) {
        if !additive {
            self.ids.clear();
            self.ids.insert(id.to_string());
            self.primary = Some(id.to_string());
            return;
        }
        if self.ids.remove(id) {
            self.repair_primary();
        } else {
            self.ids.insert(id.to_string());
            self.primary = Some(id.to_string());
        }
    }

    pub fn remove(&mut self, id: &str) {
        if self.ids.remove(id) {
            self.repair_primary();
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.ids.retain(|id| keep(id));
        self.repair_primary();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.primary = None;
    }

    fn repair_primary(&mut self) {
        let still_member = self
            .primary
            .as_deref()
            .is_some_and(|primary| self.ids.contains(primary));
        if !still_member {
            self.primary = self.ids.iter().next().cloned();
        }
    }
}
