use std::collections::BTreeMap;

/// User-set key/value facts injected into the system prompt.
///
/// Only explicit `set`/`remove`/`clear` calls mutate it; nothing in the turn
/// machinery writes here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStore {
    entries: BTreeMap<String, String>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous value for `key`, if any.
    pub fn set(&mut self, key: &str, value: &str) -> Result<Option<String>, String> {
        let key = key.trim();
        if key.is_empty() {
            return Err("Context key cannot be empty.".to_string());
        }
        Ok(self.entries.insert(key.to_string(), value.trim().to_string()))
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key.trim())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Entries sorted by key.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_and_reports_previous() {
        let mut store = ContextStore::new();
        assert_eq!(store.set("project", "termpal").expect("set"), None);
        assert_eq!(
            store.set(" project ", " other ").expect("set"),
            Some("termpal".to_string())
        );
        assert_eq!(store.get("project"), Some("other"));
        assert!(store.set("  ", "x").is_err());
    }

    #[test]
    fn entries_are_sorted_and_clear_wipes() {
        let mut store = ContextStore::new();
        store.set("zeta", "1").expect("set");
        store.set("alpha", "2").expect("set");
        let keys: Vec<_> = store.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);

        store.clear();
        assert!(store.is_empty());
    }
}
