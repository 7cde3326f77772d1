//! Kind tag to capability table lookup.

use std::sync::Arc;

use ensnode_error::{EnsError, Result};
use ensnode_types::ImplKind;
use hashbrown::HashMap;
use tracing::debug;

use crate::kinds::fault::FaultOps;
use crate::kinds::field::FieldOps;
use crate::kinds::gen_kw::GenKwOps;
use crate::kinds::static_kw::StaticKwOps;
use crate::kinds::summary::SummaryOps;
use crate::ops::NodeOps;

/// Explicit registry of capability tables, passed by reference to whoever
/// constructs or loads nodes.
#[derive(Debug, Default, Clone)]
pub struct NodeRegistry {
    tables: HashMap<ImplKind, Arc<dyn NodeOps>>,
}

impl NodeRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every kind this crate implements.
    #[must_use]
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StaticKwOps));
        registry.register(Arc::new(FieldOps));
        registry.register(Arc::new(GenKwOps));
        registry.register(Arc::new(FaultOps));
        registry.register(Arc::new(SummaryOps));
        registry
    }

    /// Bind `ops` to its kind, returning any table it replaces.
    pub fn register(&mut self, ops: Arc<dyn NodeOps>) -> Option<Arc<dyn NodeOps>> {
        let kind = ops.kind();
        debug!(kind = %kind, "capability table registered");
        self.tables.insert(kind, ops)
    }

    /// Capability table for `kind`; `UnknownKind` if none is registered.
    pub fn ops(&self, kind: ImplKind) -> Result<Arc<dyn NodeOps>> {
        self.tables
            .get(&kind)
            .cloned()
            .ok_or(EnsError::UnknownKind { tag: kind.tag() })
    }

    /// Resolve a persisted tag.
    pub fn kind_for_tag(&self, tag: i32) -> Result<ImplKind> {
        ImplKind::from_tag(tag)
            .filter(|kind| self.tables.contains_key(kind))
            .ok_or(EnsError::UnknownKind { tag })
    }

    #[must_use]
    pub fn contains(&self, kind: ImplKind) -> bool {
        self.tables.contains_key(&kind)
    }

    /// Registered kinds in tag order.
    #[must_use]
    pub fn kinds(&self) -> Vec<ImplKind> {
        let mut kinds: Vec<ImplKind> = self.tables.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_covers_all_kinds() {
        let registry = NodeRegistry::with_builtin_kinds();
        assert_eq!(registry.kinds(), ImplKind::ALL.to_vec());
        for kind in ImplKind::ALL {
            assert_eq!(registry.ops(kind).unwrap().kind(), kind);
        }
    }

    #[test]
    fn empty_registry_reports_unknown_kind() {
        let registry = NodeRegistry::new();
        assert!(matches!(
            registry.ops(ImplKind::Field),
            Err(EnsError::UnknownKind { tag: 104 })
        ));
        assert!(matches!(
            NodeRegistry::with_builtin_kinds().kind_for_tag(999),
            Err(EnsError::UnknownKind { tag: 999 })
        ));
    }

    #[test]
    fn register_replaces_existing_table() {
        let mut registry = NodeRegistry::with_builtin_kinds();
        assert!(registry.register(Arc::new(GenKwOps)).is_some());
        assert_eq!(registry.kinds().len(), ImplKind::ALL.len());
    }
}
