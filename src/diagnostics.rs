//! De-duplicated diagnostics
//!
//! Per-frame code paths hit the same missing shader or mesh every frame.
//! [`WarnOnce`] keeps the set of keys already reported so each problem is
//! logged a single time per owner.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct WarnOnce {
    seen: HashSet<String>,
}

impl WarnOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `message` at warn level the first time `key` is seen.
    /// Returns true when the message was emitted.
    pub fn warn(&mut self, key: &str, message: impl FnOnce() -> String) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string());
        log::warn!("{}", message());
        true
    }

    /// Same as [`warn`](Self::warn) at error level
    pub fn error(&mut self, key: &str, message: impl FnOnce() -> String) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string());
        log::error!("{}", message());
        true
    }

    pub fn reported(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warns_once_per_key() {
        let mut diag = WarnOnce::new();
        assert!(diag.warn("shader:blur", || "missing blur".into()));
        assert!(!diag.warn("shader:blur", || "missing blur".into()));
        assert!(diag.error("gbuffer", || "gbuffer failed".into()));
        assert!(diag.reported("shader:blur"));
        assert_eq!(diag.count(), 2);
    }
}
