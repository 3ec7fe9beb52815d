//! Directory of status lists keyed by list id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{StatusError, StatusResult};
use crate::list::RevocationList;

/// Thread-safe, cloneable directory of lists. Each list guards its own
/// bitmap; the map lock is held only for lookup and registration.
#[derive(Debug, Clone, Default)]
pub struct RevocationRegistry {
    lists: Arc<RwLock<HashMap<String, Arc<RevocationList>>>>,
}

impl RevocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a list. Fails if a list with the same id is already present.
    pub fn register(&self, list: RevocationList) -> StatusResult<Arc<RevocationList>> {
        let mut lists = self.lists.write();
        if lists.contains_key(list.id()) {
            return Err(StatusError::DuplicateList(list.id().to_string()));
        }
        let list = Arc::new(list);
        lists.insert(list.id().to_string(), Arc::clone(&list));
        tracing::info!(
            list_id = list.id(),
            issuer_id = list.issuer_id(),
            size = list.size(),
            "status list registered"
        );
        Ok(list)
    }

    pub fn get(&self, id: &str) -> Option<Arc<RevocationList>> {
        self.lists.read().get(id).cloned()
    }

    fn require(&self, id: &str) -> StatusResult<Arc<RevocationList>> {
        self.get(id)
            .ok_or_else(|| StatusError::UnknownList(id.to_string()))
    }

    /// Whether `index` of list `list_id` is revoked.
    pub fn check_status(&self, list_id: &str, index: u64) -> StatusResult<bool> {
        Ok(self.require(list_id)?.is_revoked(index))
    }

    pub fn revoke(&self, list_id: &str, index: u64) -> StatusResult<()> {
        self.require(list_id)?.revoke(index)
    }

    pub fn unrevoke(&self, list_id: &str, index: u64) -> StatusResult<()> {
        self.require(list_id)?.unrevoke(index)
    }

    /// Lists owned by `issuer_id`, sorted by id.
    pub fn lists_for_issuer(&self, issuer_id: &str) -> Vec<Arc<RevocationList>> {
        let mut lists: Vec<_> = self
            .lists
            .read()
            .values()
            .filter(|l| l.issuer_id() == issuer_id)
            .cloned()
            .collect();
        lists.sort_by(|a, b| a.id().cmp(b.id()));
        lists
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lists.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lists.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_register_and_check_status() {
        let registry = RevocationRegistry::new();
        registry
            .register(RevocationList::new("list-1", "0xissuer", 64).unwrap())
            .unwrap();
        registry.revoke("list-1", 9).unwrap();
        assert!(registry.check_status("list-1", 9).unwrap());
        assert!(!registry.check_status("list-1", 10).unwrap());
        registry.unrevoke("list-1", 9).unwrap();
        assert!(!registry.check_status("list-1", 9).unwrap());
    }

    #[test]
    fn test_unknown_list() {
        let registry = RevocationRegistry::new();
        assert_eq!(
            registry.check_status("missing", 0).unwrap_err(),
            StatusError::UnknownList("missing".into())
        );
        assert!(registry.revoke("missing", 0).is_err());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = RevocationRegistry::new();
        registry
            .register(RevocationList::new("list-1", "0xissuer", 64).unwrap())
            .unwrap();
        let err = registry
            .register(RevocationList::new("list-1", "0xother", 64).unwrap())
            .unwrap_err();
        assert_eq!(err, StatusError::DuplicateList("list-1".into()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("list-1").unwrap().issuer_id(), "0xissuer");
    }

    #[test]
    fn test_registered_handle_is_shared() {
        let registry = RevocationRegistry::new();
        let handle = registry
            .register(RevocationList::new("list-1", "0xissuer", 64).unwrap())
            .unwrap();
        handle.revoke(3).unwrap();
        assert!(registry.check_status("list-1", 3).unwrap());
        let clone = registry.clone();
        assert!(clone.check_status("list-1", 3).unwrap());
    }

    #[test]
    fn test_lists_for_issuer() {
        let registry = RevocationRegistry::new();
        for (id, issuer) in [("b", "0xa"), ("a", "0xa"), ("c", "0xb")] {
            registry
                .register(RevocationList::new(id, issuer, 8).unwrap())
                .unwrap();
        }
        let ids: Vec<String> = registry
            .lists_for_issuer("0xa")
            .iter()
            .map(|l| l.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(registry.lists_for_issuer("0xz").is_empty());
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = RevocationRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    let list = RevocationList::new(format!("list-{}", i), "0xissuer", 8).unwrap();
                    registry.register(list).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 8);
    }
}
