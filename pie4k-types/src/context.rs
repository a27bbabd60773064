//! Global context (C10): a process-wide, provider-partitioned key/value
//! registry populated once at startup from parsed CLI arguments.
//!
//! The original service exposed this as callback-style "providers" that
//! inspected raw argv themselves. Per DESIGN.md this is rearchitected as a
//! builder that eagerly produces `{provider_name, parsed_config}` pairs at
//! startup (typically straight from a `clap` struct); [`GlobalContext`]
//! itself is just the immutable-after-populate lookup table.

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct GlobalContext {
    providers: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl GlobalContext {
    pub fn new() -> GlobalContext {
        GlobalContext::default()
    }

    /// Register a provider's already-parsed key/value snapshot. Overwrites
    /// any previous registration under the same name.
    pub fn register(&self, provider_name: impl Into<String>, values: HashMap<String, String>) {
        let mut guard = self.providers.write().expect("global context lock poisoned");
        guard.insert(provider_name.into(), values);
    }

    pub fn get(&self, provider_name: &str, key: &str) -> Option<String> {
        let guard = self.providers.read().expect("global context lock poisoned");
        guard.get(provider_name).and_then(|m| m.get(key)).cloned()
    }

    pub fn get_bool(&self, provider_name: &str, key: &str) -> bool {
        self.get(provider_name, key)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    }
}

/// The global context key C6 (the operations tracker) reads to learn whether
/// the user passed `--force`.
pub const OPERATIONS_TRACKER_PROVIDER: &str = "OperationsTracker";
pub const FORCE_KEY: &str = "force";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_provider_is_readable() {
        let ctx = GlobalContext::new();
        let mut values = HashMap::new();
        values.insert(FORCE_KEY.to_string(), "true".to_string());
        ctx.register(OPERATIONS_TRACKER_PROVIDER, values);
        assert!(ctx.get_bool(OPERATIONS_TRACKER_PROVIDER, FORCE_KEY));
        assert_eq!(ctx.get("missing", "key"), None);
    }

    #[test]
    fn unset_flag_defaults_false() {
        let ctx = GlobalContext::new();
        assert!(!ctx.get_bool(OPERATIONS_TRACKER_PROVIDER, FORCE_KEY));
    }
}
