//! Non-fatal operator advisories
//!
//! An advisory never changes control flow. Each message is logged at warn
//! level and kept so the caller can report it alongside the result.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// Collector for advisories raised during a run
#[derive(Debug, Clone, Default)]
pub struct Advisories {
    messages: Arc<Mutex<Vec<String>>>,
}

impl Advisories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise an advisory
    pub fn warn<S: Into<String>>(&self, message: S) {
        let message = message.into();
        warn!("{}", message);
        self.messages.lock().push(message);
    }

    /// Advisories raised so far, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Whether any advisory contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.lock().iter().any(|m| m.contains(needle))
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisories_are_shared_between_clones() {
        let advisories = Advisories::new();
        let clone = advisories.clone();
        clone.warn("Usage of httpapi is considered experimental");

        assert_eq!(
            advisories.messages(),
            vec!["Usage of httpapi is considered experimental".to_string()]
        );
        assert!(advisories.contains("experimental"));
        assert!(!advisories.is_empty());
    }
}
