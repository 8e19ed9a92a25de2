//! Structural diff and patch over JSON state trees.

use super::path::{Path, PathSegment};
use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A value that exists in the target but not the base.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Addition {
    pub path: Path,
    pub value: Value,
}

/// A leaf whose value changed between base and target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub path: Path,
    pub old_value: Value,
    pub new_value: Value,
}

/// The structural difference between two states.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaPatch {
    pub additions: Vec<Addition>,
    pub modifications: Vec<Modification>,
    pub deletions: Vec<Path>,
}

impl DeltaPatch {
    /// Returns `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.modifications.is_empty() && self.deletions.is_empty()
    }

    /// Number of entries across all three lists.
    pub fn total_changes(&self) -> usize {
        self.additions.len() + self.modifications.len() + self.deletions.len()
    }
}

/// Compute the patch that turns `base` into `target`.
///
/// Objects are compared key by key and recursed into, so a single changed
/// nested field yields one path-qualified modification. Arrays are compared
/// per index: shared indices recurse, indices only in `target` become
/// additions and indices only in `base` become deletions. Anything else that
/// differs (scalars, or a container changing type) is one modification
/// carrying both whole values.
pub fn diff(base: &Value, target: &Value) -> DeltaPatch {
    let mut patch = DeltaPatch::default();
    diff_into(&Path::root(), base, target, &mut patch);
    patch
}

fn diff_into(path: &Path, base: &Value, target: &Value, patch: &mut DeltaPatch) {
    match (base, target) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, old_val) in old {
                match new.get(key) {
                    Some(new_val) => diff_into(&path.key(key.as_str()), old_val, new_val, patch),
                    None => patch.deletions.push(path.key(key.as_str())),
                }
            }

            for (key, new_val) in new {
                if !old.contains_key(key) {
                    patch.additions.push(Addition {
                        path: path.key(key.as_str()),
                        value: new_val.clone(),
                    });
                }
            }
        }

        (Value::Array(old), Value::Array(new)) => {
            let shared = old.len().min(new.len());

            for i in 0..shared {
                diff_into(&path.index(i), &old[i], &new[i], patch);
            }

            for (i, new_val) in new.iter().enumerate().skip(shared) {
                patch.additions.push(Addition {
                    path: path.index(i),
                    value: new_val.clone(),
                });
            }

            for i in shared..old.len() {
                patch.deletions.push(path.index(i));
            }
        }

        _ => {
            if base != target {
                patch.modifications.push(Modification {
                    path: path.clone(),
                    old_value: base.clone(),
                    new_value: target.clone(),
                });
            }
        }
    }
}

/// Apply a patch to `base`, returning the patched copy.
///
/// Modifications are applied first, then deletions in reverse order (trailing
/// array indices are removed highest first), then additions in order. `base`
/// is never mutated; a path that does not fit the tree is an
/// [`StoreError::InvalidPatch`].
pub fn apply(base: &Value, patch: &DeltaPatch) -> Result<Value> {
    let mut state = base.clone();

    for modification in &patch.modifications {
        overwrite_at(&mut state, &modification.path, modification.new_value.clone())?;
    }

    for path in patch.deletions.iter().rev() {
        remove_at(&mut state, path)?;
    }

    for addition in &patch.additions {
        insert_at(&mut state, &addition.path, addition.value.clone())?;
    }

    Ok(state)
}

/// Look up the value at `path`, if present.
pub fn value_at<'a>(state: &'a Value, path: &Path) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(state, |node, segment| match (segment, node) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key),
            (PathSegment::Index(index), Value::Array(arr)) => arr.get(*index),
            _ => None,
        })
}

fn navigate_mut<'a>(state: &'a mut Value, segments: &[PathSegment], path: &Path) -> Result<&'a mut Value> {
    let mut node = state;
    for segment in segments {
        node = match (segment, node) {
            (PathSegment::Key(key), Value::Object(map)) => map
                .get_mut(key)
                .ok_or_else(|| StoreError::InvalidPatch(format!("missing key '{}' in path {}", key, path)))?,
            (PathSegment::Index(index), Value::Array(arr)) => {
                let len = arr.len();
                arr.get_mut(*index).ok_or_else(|| {
                    StoreError::InvalidPatch(format!(
                        "index {} out of bounds (len {}) in path {}",
                        index, len, path
                    ))
                })?
            }
            (segment, _) => {
                return Err(StoreError::InvalidPatch(format!(
                    "segment {:?} does not match container type in path {}",
                    segment, path
                )))
            }
        };
    }
    Ok(node)
}

fn overwrite_at(state: &mut Value, path: &Path, value: Value) -> Result<()> {
    let target = navigate_mut(state, path.segments(), path)?;
    *target = value;
    Ok(())
}

fn insert_at(state: &mut Value, path: &Path, value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        *state = value;
        return Ok(());
    };

    match (last, navigate_mut(state, parents, path)?) {
        (PathSegment::Key(key), Value::Object(map)) => {
            map.insert(key.clone(), value);
            Ok(())
        }
        (PathSegment::Index(index), Value::Array(arr)) => {
            if *index == arr.len() {
                arr.push(value);
            } else if *index < arr.len() {
                arr[*index] = value;
            } else {
                return Err(StoreError::InvalidPatch(format!(
                    "cannot add at index {} past end (len {}) in path {}",
                    index,
                    arr.len(),
                    path
                )));
            }
            Ok(())
        }
        (segment, _) => Err(StoreError::InvalidPatch(format!(
            "segment {:?} does not match container type in path {}",
            segment, path
        ))),
    }
}

fn remove_at(state: &mut Value, path: &Path) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        return Err(StoreError::InvalidPatch("cannot delete the root".to_string()));
    };

    match (last, navigate_mut(state, parents, path)?) {
        (PathSegment::Key(key), Value::Object(map)) => map
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::InvalidPatch(format!("no key to delete at {}", path))),
        (PathSegment::Index(index), Value::Array(arr)) => {
            if *index < arr.len() {
                arr.remove(*index);
                Ok(())
            } else {
                Err(StoreError::InvalidPatch(format!("no index to delete at {}", path)))
            }
        }
        (segment, _) => Err(StoreError::InvalidPatch(format!(
            "segment {:?} does not match container type in path {}",
            segment, path
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_inverse(base: Value, target: Value) {
        let patch = diff(&base, &target);
        let rebuilt = apply(&base, &patch).unwrap();
        assert_eq!(rebuilt, target);
    }

    #[test]
    fn test_identical_states_no_diff() {
        let state = json!({"a": 1, "b": {"c": [1, 2]}});
        assert!(diff(&state, &state).is_empty());
    }

    #[test]
    fn test_top_level_addition() {
        let patch = diff(&json!({"a": 1}), &json!({"a": 1, "b": 2}));
        assert_eq!(patch.additions.len(), 1);
        assert_eq!(patch.additions[0].path.to_string(), "b");
        assert_eq!(patch.additions[0].value, json!(2));
        assert!(patch.modifications.is_empty());
        assert!(patch.deletions.is_empty());
    }

    #[test]
    fn test_nested_field_yields_single_leaf_modification() {
        let base = json!({"config": {"debug": false, "port": 8080, "tags": ["x"]}});
        let target = json!({"config": {"debug": true, "port": 8080, "tags": ["x"]}});

        let patch = diff(&base, &target);
        assert_eq!(patch.total_changes(), 1);
        assert_eq!(patch.modifications[0].path.to_string(), "config.debug");
        assert_eq!(patch.modifications[0].old_value, json!(false));
        assert_eq!(patch.modifications[0].new_value, json!(true));
    }

    #[test]
    fn test_deletion() {
        let patch = diff(&json!({"a": 1, "gone": {"x": 1}}), &json!({"a": 1}));
        assert_eq!(patch.deletions, vec![Path::from("gone")]);
        assert_inverse(json!({"a": 1, "gone": {"x": 1}}), json!({"a": 1}));
    }

    #[test]
    fn test_array_growth_is_per_index_addition() {
        let patch = diff(&json!([1, 2]), &json!([1, 5, 3, 4]));
        assert_eq!(patch.modifications.len(), 1);
        assert_eq!(patch.modifications[0].path.to_string(), "[1]");
        assert_eq!(patch.additions.len(), 2);
        assert_eq!(patch.additions[0].path.to_string(), "[2]");
        assert_eq!(patch.additions[1].path.to_string(), "[3]");
        assert_inverse(json!([1, 2]), json!([1, 5, 3, 4]));
    }

    #[test]
    fn test_array_shrink_removes_trailing_indices() {
        let patch = diff(&json!({"items": [1, 2, 3, 4]}), &json!({"items": [1]}));
        assert_eq!(patch.deletions.len(), 3);
        assert_inverse(json!({"items": [1, 2, 3, 4]}), json!({"items": [1]}));
    }

    #[test]
    fn test_type_change_is_whole_modification() {
        let patch = diff(&json!({"v": {"a": 1}}), &json!({"v": [1, 2]}));
        assert_eq!(patch.total_changes(), 1);
        assert_eq!(patch.modifications[0].new_value, json!([1, 2]));
        assert_inverse(json!({"v": {"a": 1}}), json!({"v": [1, 2]}));
    }

    #[test]
    fn test_root_scalar_change() {
        let patch = diff(&json!(1), &json!("one"));
        assert!(patch.modifications[0].path.is_root());
        assert_inverse(json!(1), json!("one"));
        assert_inverse(json!(null), json!({"a": [1, {"b": null}]}));
    }

    #[test]
    fn test_nested_arrays_of_objects() {
        assert_inverse(
            json!({"rows": [{"id": 1, "v": "a"}, {"id": 2, "v": "b"}, {"id": 3}]}),
            json!({"rows": [{"id": 1, "v": "z"}, {"id": 2, "w": true}]}),
        );
    }

    #[test]
    fn test_apply_does_not_mutate_base() {
        let base = json!({"a": 1});
        let patch = diff(&base, &json!({"a": 2, "b": 3}));
        let _ = apply(&base, &patch).unwrap();
        assert_eq!(base, json!({"a": 1}));
    }

    #[test]
    fn test_apply_rejects_bad_paths() {
        let base = json!({"a": [1, 2]});

        let missing_parent = DeltaPatch {
            additions: vec![Addition {
                path: Path::root().key("nope").key("x"),
                value: json!(1),
            }],
            ..Default::default()
        };
        assert!(matches!(apply(&base, &missing_parent), Err(StoreError::InvalidPatch(_))));

        let wrong_type = DeltaPatch {
            deletions: vec![Path::root().key("a").key("x")],
            ..Default::default()
        };
        assert!(matches!(apply(&base, &wrong_type), Err(StoreError::InvalidPatch(_))));

        let past_end = DeltaPatch {
            additions: vec![Addition {
                path: Path::root().key("a").index(5),
                value: json!(9),
            }],
            ..Default::default()
        };
        assert!(matches!(apply(&base, &past_end), Err(StoreError::InvalidPatch(_))));

        let root_delete = DeltaPatch {
            deletions: vec![Path::root()],
            ..Default::default()
        };
        assert!(matches!(apply(&base, &root_delete), Err(StoreError::InvalidPatch(_))));
    }

    #[test]
    fn test_value_at() {
        let state = json!({"a": {"b": [10, {"c": "deep"}]}});
        let path = Path::root().key("a").key("b").index(1).key("c");
        assert_eq!(value_at(&state, &path), Some(&json!("deep")));
        assert_eq!(value_at(&state, &Path::from("missing")), None);
        assert_eq!(value_at(&state, &Path::root()), Some(&state));
    }
}
