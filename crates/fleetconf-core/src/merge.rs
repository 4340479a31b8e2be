//! Deep merge of configuration documents.
//!
//! `merge(base, overlay, options)` combines two trees without touching
//! either input. The overlay wins on conflicts, with three refinements:
//!
//! - An explicit `null` in the overlay either keeps the base value or deletes
//!   the key, depending on [`MergeOptions::null_deletes`].
//! - Objects merge member by member. Base members keep their position;
//!   overlay-only members are appended in overlay order.
//! - Arrays are replaced wholesale, or matched element-by-element on an
//!   identity field when [`MergeOptions::arrays_by_id`] is set.
//!
//! Anything else (scalars, type mismatches) is a straight replacement.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Rules applied by [`merge`].
///
/// Construct with [`MergeOptions::new`]; deserialization goes through the
/// same validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawMergeOptions")]
pub struct MergeOptions {
    null_deletes: bool,
    arrays_by_id: bool,
    id_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawMergeOptions {
    null_deletes: bool,
    arrays_by_id: bool,
    id_key: String,
}

impl Default for RawMergeOptions {
    fn default() -> Self {
        let defaults = MergeOptions::default();
        Self {
            null_deletes: defaults.null_deletes,
            arrays_by_id: defaults.arrays_by_id,
            id_key: defaults.id_key,
        }
    }
}

impl TryFrom<RawMergeOptions> for MergeOptions {
    type Error = ConfigError;

    fn try_from(raw: RawMergeOptions) -> Result<Self, Self::Error> {
        MergeOptions::new(raw.null_deletes, raw.arrays_by_id, &raw.id_key)
    }
}

impl MergeOptions {
    /// Build merge options.
    ///
    /// Fails when arrays are matched by id but no id key is given.
    pub fn new(null_deletes: bool, arrays_by_id: bool, id_key: &str) -> Result<Self, ConfigError> {
        if arrays_by_id && id_key.is_empty() {
            return Err(ConfigError::MergeConfig(
                "arraysById requires a non-empty idKey".to_string(),
            ));
        }
        Ok(Self {
            null_deletes,
            arrays_by_id,
            id_key: id_key.to_string(),
        })
    }

    /// Whether an explicit `null` in the overlay removes the key.
    pub fn null_deletes(&self) -> bool {
        self.null_deletes
    }

    /// Whether arrays are merged by element identity.
    pub fn arrays_by_id(&self) -> bool {
        self.arrays_by_id
    }

    /// Member name used as element identity.
    pub fn id_key(&self) -> &str {
        &self.id_key
    }
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            null_deletes: false,
            arrays_by_id: true,
            id_key: "id".to_string(),
        }
    }
}

/// Merge `overlay` on top of `base`, returning a new tree.
pub fn merge(base: &Value, overlay: &Value, options: &MergeOptions) -> Value {
    match merge_value(base, overlay, options) {
        Some(value) => value,
        // Nothing to delete at the root.
        None => Value::Null,
    }
}

/// `None` means "remove this member from the parent".
fn merge_value(base: &Value, overlay: &Value, options: &MergeOptions) -> Option<Value> {
    match (base, overlay) {
        (_, Value::Null) => {
            if options.null_deletes {
                None
            } else {
                Some(base.clone())
            }
        }
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            Some(Value::Object(merge_objects(base_map, overlay_map, options)))
        }
        (Value::Array(base_items), Value::Array(overlay_items)) if options.arrays_by_id => Some(
            Value::Array(merge_arrays_by_id(base_items, overlay_items, options)),
        ),
        _ => Some(overlay.clone()),
    }
}

fn merge_objects(
    base: &Map<String, Value>,
    overlay: &Map<String, Value>,
    options: &MergeOptions,
) -> Map<String, Value> {
    let mut merged = Map::new();

    for (key, base_value) in base {
        match overlay.get(key) {
            Some(overlay_value) => {
                if let Some(value) = merge_value(base_value, overlay_value, options) {
                    merged.insert(key.clone(), value);
                }
            }
            None => {
                merged.insert(key.clone(), base_value.clone());
            }
        }
    }

    for (key, overlay_value) in overlay {
        if base.contains_key(key) {
            continue;
        }
        if overlay_value.is_null() && options.null_deletes {
            continue;
        }
        merged.insert(key.clone(), overlay_value.clone());
    }

    merged
}

fn merge_arrays_by_id(base: &[Value], overlay: &[Value], options: &MergeOptions) -> Vec<Value> {
    let mut merged: Vec<Value> = base.to_vec();
    let mut appended = Vec::new();

    for item in overlay {
        let target = element_id(item, options.id_key()).and_then(|id| {
            base.iter()
                .position(|candidate| element_id(candidate, options.id_key()) == Some(id))
        });

        match target {
            Some(index) => {
                // Matched elements are objects with a non-null id, so the
                // recursive merge always yields a value.
                if let Some(value) = merge_value(&merged[index], item, options) {
                    merged[index] = value;
                }
            }
            None => appended.push(item.clone()),
        }
    }

    merged.extend(appended);
    merged
}

fn element_id<'a>(item: &'a Value, id_key: &str) -> Option<&'a Value> {
    item.as_object()
        .and_then(|map| map.get(id_key))
        .filter(|id| !id.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::document::{parse, serialize};

    fn by_id() -> MergeOptions {
        MergeOptions::new(false, true, "id").unwrap()
    }

    fn wholesale() -> MergeOptions {
        MergeOptions::new(false, false, "").unwrap()
    }

    fn deleting() -> MergeOptions {
        MergeOptions::new(true, true, "id").unwrap()
    }

    #[test]
    fn test_options_reject_empty_id_key() {
        let err = MergeOptions::new(false, true, "").unwrap_err();
        assert!(matches!(err, ConfigError::MergeConfig(_)));
        assert!(MergeOptions::new(true, false, "").is_ok());
    }

    #[test]
    fn test_options_deserialize_validates() {
        let opts: MergeOptions = serde_json::from_value(json!({"nullDeletes": true})).unwrap();
        assert!(opts.null_deletes());
        assert!(opts.arrays_by_id());
        assert_eq!(opts.id_key(), "id");

        let bad = serde_json::from_value::<MergeOptions>(json!({"arraysById": true, "idKey": ""}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_empty_overlay_is_identity() {
        let doc = json!({"a": 1, "b": {"c": [1, 2]}, "d": null, "e": [{"id": 1}]});
        for opts in [by_id(), wholesale(), deleting()] {
            assert_eq!(merge(&doc, &json!({}), &opts), doc);
        }
    }

    #[test]
    fn test_empty_base_is_identity_without_null_deletes() {
        let doc = json!({"a": 1, "b": {"c": [1, 2]}, "d": null, "e": [{"id": 1}, 3]});
        assert_eq!(merge(&json!({}), &doc, &by_id()), doc);
        assert_eq!(merge(&json!({}), &doc, &wholesale()), doc);
    }

    #[test]
    fn test_null_deletes_removes_key() {
        assert_eq!(merge(&json!({"a": 1}), &json!({"a": null}), &deleting()), json!({}));
    }

    #[test]
    fn test_null_retains_base_without_null_deletes() {
        assert_eq!(merge(&json!({"a": 1}), &json!({"a": null}), &by_id()), json!({"a": 1}));
    }

    #[test]
    fn test_null_only_in_overlay() {
        assert_eq!(merge(&json!({}), &json!({"a": null}), &deleting()), json!({}));
        assert_eq!(merge(&json!({}), &json!({"a": null}), &by_id()), json!({"a": null}));
    }

    #[test]
    fn test_nested_null_delete() {
        let base = json!({"wifi": {"ssid": "x", "pass": "y"}});
        let overlay = json!({"wifi": {"pass": null}});
        assert_eq!(merge(&base, &overlay, &deleting()), json!({"wifi": {"ssid": "x"}}));
    }

    #[test]
    fn test_arrays_by_id() {
        let base = json!({"items": [{"id": 1, "v": "x"}]});
        let overlay = json!({"items": [{"id": 1, "v": "y"}, {"id": 2, "v": "z"}]});
        assert_eq!(
            merge(&base, &overlay, &by_id()),
            json!({"items": [{"id": 1, "v": "y"}, {"id": 2, "v": "z"}]})
        );
    }

    #[test]
    fn test_arrays_wholesale() {
        let base = json!({"items": [{"id": 1, "v": "x"}, {"id": 3, "v": "w"}]});
        let overlay = json!({"items": [{"id": 1, "v": "y"}, {"id": 2, "v": "z"}]});
        assert_eq!(
            merge(&base, &overlay, &wholesale()),
            json!({"items": [{"id": 1, "v": "y"}, {"id": 2, "v": "z"}]})
        );
    }

    #[test]
    fn test_arrays_by_id_keeps_base_order() {
        let base = json!([{"id": "a", "n": 1}, {"id": "b", "n": 2}, {"id": "c", "n": 3}]);
        let overlay = json!([{"id": "d", "n": 4}, {"id": "c", "n": 30}, {"id": "a", "n": 10}]);
        assert_eq!(
            merge(&base, &overlay, &by_id()),
            json!([{"id": "a", "n": 10}, {"id": "b", "n": 2}, {"id": "c", "n": 30}, {"id": "d", "n": 4}])
        );
    }

    #[test]
    fn test_arrays_by_id_elements_without_id_are_appended() {
        let base = json!([{"name": "anon"}, {"id": 1, "v": "x"}]);
        let overlay = json!([{"name": "anon"}, 7, {"id": null, "v": "n"}, {"id": 1, "extra": true}]);
        assert_eq!(
            merge(&base, &overlay, &by_id()),
            json!([
                {"name": "anon"},
                {"id": 1, "v": "x", "extra": true},
                {"name": "anon"},
                7,
                {"id": null, "v": "n"}
            ])
        );
    }

    #[test]
    fn test_arrays_by_id_distinguishes_id_types() {
        let base = json!([{"id": 1, "v": "num"}]);
        let overlay = json!([{"id": "1", "v": "str"}]);
        assert_eq!(
            merge(&base, &overlay, &by_id()),
            json!([{"id": 1, "v": "num"}, {"id": "1", "v": "str"}])
        );
    }

    #[test]
    fn test_arrays_by_id_custom_key() {
        let opts = MergeOptions::new(false, true, "sensor").unwrap();
        let base = json!({"w1": [{"sensor": "28ff", "name": "inside"}]});
        let overlay = json!({"w1": [{"sensor": "28ff", "name": "attic"}]});
        assert_eq!(
            merge(&base, &overlay, &opts),
            json!({"w1": [{"sensor": "28ff", "name": "attic"}]})
        );
    }

    #[test]
    fn test_nested_arrays_by_id_recurse() {
        let base = json!({"zones": [{"id": "z1", "probes": [{"id": "p1", "offset": 0}]}]});
        let overlay = json!({"zones": [{"id": "z1", "probes": [{"id": "p1", "offset": 2}, {"id": "p2"}]}]});
        assert_eq!(
            merge(&base, &overlay, &by_id()),
            json!({"zones": [{"id": "z1", "probes": [{"id": "p1", "offset": 2}, {"id": "p2"}]}]})
        );
    }

    #[test]
    fn test_type_mismatch_replaces() {
        let base = json!({"a": {"nested": true}, "b": [1, 2], "c": "text"});
        let overlay = json!({"a": [1], "b": {"x": 1}, "c": 5});
        assert_eq!(merge(&base, &overlay, &by_id()), overlay);
    }

    #[test]
    fn test_overlay_keys_appended_after_base_keys() {
        let base = parse(r#"{"b":1,"a":2}"#).unwrap();
        let overlay = parse(r#"{"z":0,"a":3,"c":4}"#).unwrap();
        let merged = merge(&base, &overlay, &by_id());
        assert_eq!(serialize(&merged), r#"{"b":1,"a":3,"z":0,"c":4}"#);
    }

    #[test]
    fn test_inputs_are_untouched() {
        let base = json!({"a": {"b": 1}, "l": [{"id": 1, "v": 1}]});
        let overlay = json!({"a": {"b": null, "c": 2}, "l": [{"id": 1, "v": 2}]});
        let (base_before, overlay_before) = (base.clone(), overlay.clone());
        let _ = merge(&base, &overlay, &deleting());
        assert_eq!(base, base_before);
        assert_eq!(overlay, overlay_before);
    }

    #[test]
    fn test_root_null_overlay() {
        let base = json!({"a": 1});
        assert_eq!(merge(&base, &Value::Null, &by_id()), base);
        assert_eq!(merge(&base, &Value::Null, &deleting()), Value::Null);
    }

    #[test]
    fn test_precedence_is_not_symmetric() {
        let global = json!({"mode": "ap", "items": [{"id": 1, "v": "global"}]});
        let instance = json!({"mode": "station", "items": [{"id": 1, "v": "instance"}]});
        let merged = merge(&global, &instance, &by_id());
        assert_eq!(merged["mode"], "station");
        assert_eq!(merged["items"][0]["v"], "instance");

        let reversed = merge(&instance, &global, &by_id());
        assert_ne!(serialize(&merged), serialize(&reversed));
    }
}
