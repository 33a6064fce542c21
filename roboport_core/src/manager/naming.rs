//! Naming service
//!
//! Maps hierarchical names to hosted instances so remote clients can find
//! them. Paths follow `{host}.host_cxt/{instance}.rtc`.

use crate::error::{RoboportError, RoboportResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One bound name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingEntry {
    pub path: String,
    pub instance: String,
    pub type_name: String,
}

pub struct NamingService {
    host: String,
    entries: RwLock<BTreeMap<String, NamingEntry>>,
}

impl NamingService {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Directory path for `instance` on this host
    pub fn path_for(&self, instance: &str) -> String {
        format!("{}.host_cxt/{}.rtc", self.host, instance)
    }

    pub fn bind(&self, instance: &str, type_name: &str) -> RoboportResult<NamingEntry> {
        let entry = NamingEntry {
            path: self.path_for(instance),
            instance: instance.to_string(),
            type_name: type_name.to_string(),
        };

        let mut entries = self.entries.write();
        if entries.contains_key(&entry.path) {
            return Err(RoboportError::DuplicateInstance(instance.to_string()));
        }
        entries.insert(entry.path.clone(), entry.clone());
        log::debug!("Bound {}", entry.path);
        Ok(entry)
    }

    pub fn unbind(&self, instance: &str) -> Option<NamingEntry> {
        let removed = self.entries.write().remove(&self.path_for(instance));
        if let Some(entry) = &removed {
            log::debug!("Unbound {}", entry.path);
        }
        removed
    }

    /// Resolve a full path or a bare instance name
    pub fn resolve(&self, name: &str) -> RoboportResult<NamingEntry> {
        let entries = self.entries.read();
        entries
            .get(name)
            .or_else(|| entries.get(&self.path_for(name)))
            .cloned()
            .ok_or_else(|| RoboportError::NotFound(format!("name '{}'", name)))
    }

    /// Entries whose path starts with `prefix`, sorted by path
    pub fn list(&self, prefix: &str) -> Vec<NamingEntry> {
        self.entries
            .read()
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_resolve_unbind() {
        let naming = NamingService::new("robot1");
        let entry = naming.bind("scanner", "RangeSensor").unwrap();
        assert_eq!(entry.path, "robot1.host_cxt/scanner.rtc");

        assert_eq!(naming.resolve("scanner").unwrap(), entry);
        assert_eq!(naming.resolve("robot1.host_cxt/scanner.rtc").unwrap(), entry);

        assert_eq!(naming.unbind("scanner"), Some(entry));
        assert!(matches!(
            naming.resolve("scanner"),
            Err(RoboportError::NotFound(_))
        ));
        assert_eq!(naming.unbind("scanner"), None);
    }

    #[test]
    fn test_duplicate_bind() {
        let naming = NamingService::new("h");
        naming.bind("a", "T").unwrap();
        assert!(matches!(
            naming.bind("a", "T"),
            Err(RoboportError::DuplicateInstance(_))
        ));
    }

    #[test]
    fn test_list_by_prefix() {
        let naming = NamingService::new("h");
        for name in ["nav", "scanner", "scan_filter"] {
            naming.bind(name, "T").unwrap();
        }

        let scans: Vec<_> = naming
            .list("h.host_cxt/scan")
            .into_iter()
            .map(|e| e.instance)
            .collect();
        assert_eq!(scans, vec!["scan_filter", "scanner"]);
        assert_eq!(naming.list("").len(), 3);
        assert!(naming.list("other").is_empty());
    }
}
