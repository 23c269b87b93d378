//! Cross-train configuration builder.
//!
//! Walks every dialog's trigger list, classifies dialogs as root or nested
//! (root = not housed under another dialog's local `dialogs/` sub-path),
//! and derives which triggers defer to which others. A dialog reached from
//! a parent's intent trigger defers to the parent's *other* intent
//! triggers, so the injected interruption intent lets the active child
//! recognize an utterance that should route back up.

use std::collections::BTreeMap;
use std::path::Path;

use botlaunch_types::crosstrain::CrossTrainConfig;
use botlaunch_types::error::PublishError;
use botlaunch_types::project::ProjectFile;
use serde_json::Value;

/// An intent trigger and the child dialogs it begins.
#[derive(Debug, Clone)]
struct IntentTrigger {
    intent: String,
    children: Vec<String>,
}

/// Build the cross-train configuration from the project's dialog files.
pub fn build_config(files: &[ProjectFile]) -> Result<CrossTrainConfig, PublishError> {
    let mut config = CrossTrainConfig::new();
    let mut triggers_by_dialog: BTreeMap<String, Vec<IntentTrigger>> = BTreeMap::new();

    for file in files.iter().filter(|f| f.is_dialog()) {
        let dialog_id = file.stem().to_string();
        let doc: Value = serde_json::from_str(&file.content).map_err(|e| {
            PublishError::CrossTrain {
                file: file.relative_path.clone(),
                reason: format!("invalid dialog json: {e}"),
            }
        })?;

        if !is_nested_path(&file.relative_path) {
            config.root_dialogs.insert(dialog_id.clone());
        }

        triggers_by_dialog.insert(dialog_id, intent_triggers(&doc));
    }

    // A child begun from trigger (P, I) defers to every other intent
    // trigger of P.
    for (parent, triggers) in &triggers_by_dialog {
        for trigger in triggers {
            for child in &trigger.children {
                if !triggers_by_dialog.contains_key(child) {
                    continue;
                }
                let deferred = config.trigger_rules.entry(child.clone()).or_default();
                for other in triggers {
                    if other.intent != trigger.intent {
                        deferred.insert(format!("{parent}.{}", other.intent));
                    }
                }
            }
        }
    }

    Ok(config)
}

/// Whether the file lives under a `dialogs/` sub-path of another dialog.
fn is_nested_path(relative_path: &str) -> bool {
    Path::new(relative_path)
        .components()
        .any(|c| c.as_os_str() == "dialogs")
}

/// Extract the intent triggers of a dialog document, with the child
/// dialogs each trigger's actions begin.
fn intent_triggers(doc: &Value) -> Vec<IntentTrigger> {
    let mut result = Vec::new();
    let Some(triggers) = doc.get("triggers").and_then(Value::as_array) else {
        return result;
    };

    for trigger in triggers {
        if trigger.get("$kind").and_then(Value::as_str) != Some("Microsoft.OnIntent") {
            continue;
        }
        let Some(intent) = trigger.get("intent").and_then(Value::as_str) else {
            continue;
        };
        let mut children = Vec::new();
        collect_begun_dialogs(trigger, &mut children);
        result.push(IntentTrigger {
            intent: intent.to_string(),
            children,
        });
    }

    result
}

/// Recursively scan actions for `Microsoft.BeginDialog` references.
fn collect_begun_dialogs(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            if map.get("$kind").and_then(Value::as_str) == Some("Microsoft.BeginDialog") {
                if let Some(dialog) = map.get("dialog").and_then(Value::as_str) {
                    out.push(dialog.to_string());
                }
            }
            for value in map.values() {
                collect_begun_dialogs(value, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_begun_dialogs(item, out);
            }
        }
        _ => {}
    }
}
