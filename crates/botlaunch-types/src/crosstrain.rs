//! Cross-training configuration.
//!
//! Built fresh per publish from the dialog graph and language files,
//! consumed once by the cross-train merge, then discarded.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// The shared intent name injected into every cross-trained model so a
/// global recognizer can route between dialogs consistently.
pub const INTERRUPTION_INTENT: &str = "_Interruption";

/// Mapping of which trigger recognizers defer to which others.
///
/// BTree collections keep serialization deterministic, which in turn keeps
/// the generated recognizer assets stable across publishes of an unchanged
/// project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossTrainConfig {
    /// Dialog ids not reachable from any other dialog's nested path.
    pub root_dialogs: BTreeSet<String>,
    /// Trigger identifier -> the set of trigger identifiers it defers to.
    pub trigger_rules: BTreeMap<String, BTreeSet<String>>,
    /// Name of the injected interruption intent.
    pub intent_name: String,
}

impl CrossTrainConfig {
    pub fn new() -> Self {
        Self {
            root_dialogs: BTreeSet::new(),
            trigger_rules: BTreeMap::new(),
            intent_name: INTERRUPTION_INTENT.to_string(),
        }
    }

    /// Whether `dialog` was classified as a root dialog.
    pub fn is_root(&self, dialog: &str) -> bool {
        self.root_dialogs.contains(dialog)
    }

    /// The triggers `trigger` defers to, empty when it defers to nothing.
    pub fn deferred(&self, trigger: &str) -> impl Iterator<Item = &str> {
        self.trigger_rules
            .get(trigger)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_is_empty_for_unknown_trigger() {
        let config = CrossTrainConfig::new();
        assert_eq!(config.deferred("nope").count(), 0);
    }

    #[test]
    fn json_roundtrip_is_deterministic() {
        let mut config = CrossTrainConfig::new();
        config.root_dialogs.insert("main".to_string());
        config
            .trigger_rules
            .entry("main".to_string())
            .or_default()
            .extend(["weather".to_string(), "greet".to_string()]);

        let a = serde_json::to_string(&config).unwrap();
        let parsed: CrossTrainConfig = serde_json::from_str(&a).unwrap();
        let b = serde_json::to_string(&parsed).unwrap();
        assert_eq!(a, b);
        assert!(parsed.is_root("main"));
        // BTreeSet ordering
        let deferred: Vec<&str> = parsed.deferred("main").collect();
        assert_eq!(deferred, vec!["greet", "weather"]);
    }
}
