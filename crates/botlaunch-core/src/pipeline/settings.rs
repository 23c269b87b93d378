//! Settings merging for the deployable bundle.
//!
//! Three sources feed the settings payload the runtime reads at start-up:
//! settings bundled with the runtime template, the publish profile's
//! settings, and extras generated during the publish (recognizer model
//! references). Precedence: profile > extra > bundled.

use serde_json::{Map, Value};

/// Deep-merge `overlay` into `base`. Objects merge key-by-key; any other
/// value in `overlay` replaces the one in `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        // Null overlays do not erase existing values.
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Merge the three settings sources at the documented precedence.
pub fn merge_settings(bundled: Value, profile: Value, extra: Value) -> Value {
    let merged = deep_merge(normalize(bundled), normalize(extra));
    deep_merge(merged, normalize(profile))
}

/// Treat a null/absent source as an empty object so merging is total.
fn normalize(value: Value) -> Value {
    match value {
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}
