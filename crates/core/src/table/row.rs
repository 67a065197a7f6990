#![forbid(unsafe_code)]

use super::{COLUMN_COUNT, MAX_WHY_LEVELS};
use crate::graph::{ActionItem, EvidenceStatus, NodeType};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One root-to-leaf path of the tree.
///
/// Ancestors fill the chain columns: the root is `failure_mode_top`, depth `k`
/// is `why_k`. The leaf's own statement is `leaf_label`. Rows have no
/// identity beyond `leaf_id` plus `path_ids`; identical label chains are
/// legitimate duplicates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableRow {
    pub failure_mode_top: String,
    pub whys: [Option<String>; MAX_WHY_LEVELS],
    pub leaf_id: String,
    pub leaf_label: String,
    pub leaf_type: Option<NodeType>,
    /// Node ids from the root down to and including the leaf.
    pub path_ids: Vec<String>,
    pub severity: Option<u8>,
    pub occurrence: Option<u8>,
    pub detection: Option<u8>,
    pub rpn: Option<u32>,
    pub ap_category: Option<String>,
    pub ap_priority: Option<u32>,
    pub ap_color: Option<String>,
    pub units: Option<String>,
    pub specification: Option<String>,
    pub notes: Option<String>,
    pub evidence_status: Option<EvidenceStatus>,
    pub action: Option<ActionItem>,
    /// Ancestor levels deeper than `why_9` that were left out of the row.
    pub truncated_levels: usize,
}

impl TableRow {
    /// `why_level` for 1..=9.
    pub fn why(&self, level: usize) -> Option<&str> {
        if level == 0 {
            return None;
        }
        self.whys.get(level - 1).and_then(|v| v.as_deref())
    }

    /// Chain column `index`: 0 is `failure_mode_top`, `k` is `why_k`.
    pub fn column(&self, index: usize) -> Option<&str> {
        match index {
            0 => Some(self.failure_mode_top.as_str()),
            i if i < COLUMN_COUNT => self.why(i),
            _ => None,
        }
    }

    /// Chain cells in column order, as handed to table edits as row context.
    pub fn chain_cells(&self) -> Vec<Option<String>> {
        (0..COLUMN_COUNT)
            .map(|i| self.column(i).map(str::to_string))
            .collect()
    }

    fn action_field(&self, pick: impl Fn(&ActionItem) -> &Option<String>) -> Option<&str> {
        self.action.as_ref().and_then(|a| pick(a).as_deref())
    }

    /// Free-text fields searched by the table filter.
    pub(crate) fn searchable(&self) -> impl Iterator<Item = &str> {
        let chain = (0..COLUMN_COUNT).filter_map(move |i| self.column(i));
        let leaf = std::iter::once(self.leaf_label.as_str());
        let extra = [
            self.units.as_deref(),
            self.specification.as_deref(),
            self.action_field(|a| &a.investigation_item),
            self.action_field(|a| &a.investigation_method),
            self.action_field(|a| &a.criteria),
            self.action_field(|a| &a.evidence_type),
            self.action_field(|a| &a.person_name),
            self.action_field(|a| &a.remarks),
        ];
        chain.chain(leaf).chain(extra.into_iter().flatten())
    }
}

const WHY_KEYS: [&str; MAX_WHY_LEVELS] = [
    "why_1", "why_2", "why_3", "why_4", "why_5", "why_6", "why_7", "why_8", "why_9",
];

// Flat wire shape with why_1..why_9 keys. Unset values serialize as null.
impl Serialize for TableRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("failure_mode_top", &self.failure_mode_top)?;
        for (key, value) in WHY_KEYS.iter().zip(&self.whys) {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("leaf_id", &self.leaf_id)?;
        map.serialize_entry("leaf_label", &self.leaf_label)?;
        map.serialize_entry("node_type", &self.leaf_type)?;
        map.serialize_entry("path_ids", &self.path_ids)?;
        map.serialize_entry("severity", &self.severity)?;
        map.serialize_entry("occurrence", &self.occurrence)?;
        map.serialize_entry("detection", &self.detection)?;
        map.serialize_entry("rpn", &self.rpn)?;
        map.serialize_entry("ap_category", &self.ap_category)?;
        map.serialize_entry("ap_priority", &self.ap_priority)?;
        map.serialize_entry("ap_color", &self.ap_color)?;
        map.serialize_entry("units", &self.units)?;
        map.serialize_entry("specification", &self.specification)?;
        map.serialize_entry("notes", &self.notes)?;
        map.serialize_entry("evidence_status", &self.evidence_status)?;
        map.serialize_entry(
            "investigation_item",
            &self.action_field(|a| &a.investigation_item),
        )?;
        map.serialize_entry(
            "investigation_method",
            &self.action_field(|a| &a.investigation_method),
        )?;
        map.serialize_entry("criteria", &self.action_field(|a| &a.criteria))?;
        map.serialize_entry("evidence_type", &self.action_field(|a| &a.evidence_type))?;
        map.serialize_entry("person_name", &self.action_field(|a| &a.person_name))?;
        map.serialize_entry("due_date", &self.action_field(|a| &a.due_date))?;
        map.serialize_entry("remarks", &self.action_field(|a| &a.remarks))?;
        map.serialize_entry("action_status", &self.action_field(|a| &a.status))?;
        map.serialize_entry("truncated_levels", &self.truncated_levels)?;
        map.end()
    }
}
