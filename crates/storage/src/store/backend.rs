#![forbid(unsafe_code)]

use super::{IdKind, SqliteStore, StoreError};
use fta_core::graph::{TreeOp, TreeSnapshot};
use fta_core::ids::AnalysisId;
use fta_core::session::TreeBackend;

impl TreeBackend for SqliteStore {
    type Error = StoreError;

    fn load_tree(&mut self, analysis: &AnalysisId) -> Result<TreeSnapshot, StoreError> {
        self.tree_load(analysis)
    }

    fn allocate_node_id(&mut self, analysis: &AnalysisId) -> Result<String, StoreError> {
        self.allocate_id(analysis, IdKind::Node)
    }

    fn allocate_edge_id(&mut self, analysis: &AnalysisId) -> Result<String, StoreError> {
        self.allocate_id(analysis, IdKind::Edge)
    }

    fn persist(&mut self, analysis: &AnalysisId, ops: &[TreeOp]) -> Result<(), StoreError> {
        self.tree_apply_ops(analysis, ops).map(|_| ())
    }
}
