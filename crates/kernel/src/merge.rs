//! Applying one payload's content onto another.

use chronicle_common::ContentPath;
use serde_json::{Map, Value};

use crate::diff::{Alignment, align};

/// A path that cannot be written into the payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("cannot descend into {path}: not an object or list")]
    NotAContainer { path: String },
    #[error("index {index} out of range at {path} (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },
    #[error("{segment:?} is not a list index at {path}")]
    NotAnIndex { path: String, segment: String },
}

/// Merge `target` onto `current`.
///
/// Paths changed in `target` win; paths that exist only in `current` are
/// kept. Lists are aligned the same way the diff aligns them, so elements
/// only `current` has survive in place and a pure reordering takes
/// `target`'s order. Paired elements are merged only when they sit at the
/// same index; a shifted pair takes `target`'s element.
pub fn merge_onto(current: &Value, target: &Value) -> Value {
    match (current, target) {
        (Value::Object(cur), Value::Object(tgt)) => {
            let mut out = cur.clone();
            for (key, tgt_value) in tgt {
                let merged = match cur.get(key) {
                    Some(cur_value) => merge_onto(cur_value, tgt_value),
                    None => tgt_value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        (Value::Array(cur), Value::Array(tgt)) => {
            if is_permutation(cur, tgt) {
                return target.clone();
            }
            let mut out = Vec::with_capacity(cur.len().max(tgt.len()));
            for step in align(cur, tgt) {
                match step {
                    Alignment::Same { old, .. } | Alignment::Removed { old } => {
                        out.push(cur[old].clone());
                    }
                    Alignment::Paired { old, new } if old == new => {
                        out.push(merge_onto(&cur[old], &tgt[new]));
                    }
                    Alignment::Paired { new, .. } => out.push(tgt[new].clone()),
                    Alignment::Added { new } => out.push(tgt[new].clone()),
                }
            }
            Value::Array(out)
        }
        _ => target.clone(),
    }
}

/// Copy only `paths` from `target` into `current`.
///
/// A selected path missing from `target` is removed from the result, so
/// every selected path ends up exactly as `target` has it.
pub fn apply_selected(
    current: &Value,
    target: &Value,
    paths: &[ContentPath],
) -> Result<Value, ApplyError> {
    let mut out = current.clone();
    for path in paths {
        match get_path(target, path) {
            Some(value) => set_path(&mut out, path, value.clone())?,
            None => {
                remove_path(&mut out, path);
            }
        }
    }
    Ok(out)
}

pub fn get_path<'a>(value: &'a Value, path: &ContentPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(value, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Write `new` at `path`, creating missing object levels along the way.
///
/// List indices may address an existing element or append at `len`.
pub fn set_path(value: &mut Value, path: &ContentPath, new: Value) -> Result<(), ApplyError> {
    let Some((last, parents)) = path.segments().split_last() else {
        *value = new;
        return Ok(());
    };
    let mut node = value;
    let mut walked = ContentPath::root();
    for segment in parents {
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => {
                let index = list_index(&walked, segment)?;
                let len = items.len();
                if index == len {
                    items.push(Value::Object(Map::new()));
                }
                items.get_mut(index).ok_or(ApplyError::IndexOutOfRange {
                    path: walked.to_string(),
                    index,
                    len,
                })?
            }
            _ => {
                return Err(ApplyError::NotAContainer {
                    path: walked.to_string(),
                });
            }
        };
        walked = walked.child(segment.as_str());
    }
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => {
            map.insert(last.clone(), new);
            Ok(())
        }
        Value::Array(items) => {
            let index = list_index(&walked, last)?;
            let len = items.len();
            if index < len {
                items[index] = new;
                Ok(())
            } else if index == len {
                items.push(new);
                Ok(())
            } else {
                Err(ApplyError::IndexOutOfRange {
                    path: walked.to_string(),
                    index,
                    len,
                })
            }
        }
        _ => Err(ApplyError::NotAContainer {
            path: walked.to_string(),
        }),
    }
}

/// Remove and return the value at `path`, if present. Removing the root
/// leaves `null` behind.
pub fn remove_path(value: &mut Value, path: &ContentPath) -> Option<Value> {
    let Some((last, parents)) = path.segments().split_last() else {
        return Some(std::mem::take(value));
    };
    let mut node = value;
    for segment in parents {
        node = match node {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match node {
        Value::Object(map) => map.remove(last),
        Value::Array(items) => {
            let index = last.parse::<usize>().ok()?;
            (index < items.len()).then(|| items.remove(index))
        }
        _ => None,
    }
}

fn list_index(at: &ContentPath, segment: &str) -> Result<usize, ApplyError> {
    segment.parse().map_err(|_| ApplyError::NotAnIndex {
        path: at.to_string(),
        segment: segment.to_string(),
    })
}

fn is_permutation(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() || a == b {
        return false;
    }
    let mut remaining: Vec<&Value> = b.iter().collect();
    a.iter().all(|item| {
        remaining
            .iter()
            .position(|candidate| *candidate == item)
            .map(|i| remaining.swap_remove(i))
            .is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> ContentPath {
        ContentPath::parse(raw).unwrap()
    }

    #[test]
    fn merge_keeps_current_only_fields() {
        let current = json!({"title": "Current", "draft": true, "words": ["a"]});
        let target = json!({"title": "Target", "words": ["a", "b"]});
        let merged = merge_onto(&current, &target);
        assert_eq!(
            merged,
            json!({"title": "Target", "draft": true, "words": ["a", "b"]})
        );
    }

    #[test]
    fn merge_keeps_current_only_list_items() {
        let current = json!(["a", "new-in-current", "b"]);
        let target = json!(["a", "b", "c"]);
        assert_eq!(
            merge_onto(&current, &target),
            json!(["a", "new-in-current", "b", "c"])
        );
    }

    #[test]
    fn merge_takes_target_order_for_permutations() {
        let current = json!({"words": ["a", "b", "c"]});
        let target = json!({"words": ["c", "b", "a"]});
        assert_eq!(merge_onto(&current, &target), target);
    }

    #[test]
    fn merge_recurses_only_into_elements_at_the_same_index() {
        let current = json!({"cards": [{"front": "cat", "draft": true}]});
        let target = json!({"cards": [{"front": "dog"}]});
        assert_eq!(
            merge_onto(&current, &target),
            json!({"cards": [{"front": "dog", "draft": true}]})
        );

        let shifted = merge_onto(&json!(["q", "a", {"k": 1}]), &json!(["a", {"k": 2}]));
        assert_eq!(shifted, json!(["q", "a", {"k": 2}]));
    }

    #[test]
    fn merge_of_scalars_takes_target() {
        assert_eq!(merge_onto(&json!(1), &json!("one")), json!("one"));
    }

    #[test]
    fn selective_copies_only_selected_paths() {
        let current = json!({"title": "Changed", "words": ["x"]});
        let target = json!({"title": "Original", "words": ["hello", "world"]});
        let out = apply_selected(&current, &target, &[path("words")]).unwrap();
        assert_eq!(out, json!({"title": "Changed", "words": ["hello", "world"]}));
    }

    #[test]
    fn selective_removes_paths_target_lacks() {
        let current = json!({"title": "t", "extra": 1});
        let target = json!({"title": "t"});
        let out = apply_selected(&current, &target, &[path("/extra")]).unwrap();
        assert_eq!(out, json!({"title": "t"}));
    }

    #[test]
    fn selective_creates_missing_parents() {
        let out = apply_selected(
            &json!({}),
            &json!({"settings": {"timer": 30}}),
            &[path("settings.timer")],
        )
        .unwrap();
        assert_eq!(out, json!({"settings": {"timer": 30}}));
    }

    #[test]
    fn set_path_into_scalar_is_an_error() {
        let mut value = json!({"title": "t"});
        assert_eq!(
            set_path(&mut value, &path("/title/sub"), json!(1)),
            Err(ApplyError::NotAContainer {
                path: "/title".into()
            })
        );
    }

    #[test]
    fn set_path_on_lists() {
        let mut value = json!({"words": ["a"]});
        set_path(&mut value, &path("/words/0"), json!("z")).unwrap();
        set_path(&mut value, &path("/words/1"), json!("y")).unwrap();
        assert_eq!(value, json!({"words": ["z", "y"]}));
        assert!(matches!(
            set_path(&mut value, &path("/words/5"), json!("q")),
            Err(ApplyError::IndexOutOfRange { index: 5, len: 2, .. })
        ));
        assert!(matches!(
            set_path(&mut value, &path("/words/first"), json!("q")),
            Err(ApplyError::NotAnIndex { .. })
        ));
    }

    #[test]
    fn get_and_remove_path() {
        let mut value = json!({"a": {"b": [1, 2, 3]}});
        assert_eq!(get_path(&value, &path("/a/b/1")), Some(&json!(2)));
        assert_eq!(get_path(&value, &path("/a/c")), None);
        assert_eq!(remove_path(&mut value, &path("/a/b/0")), Some(json!(1)));
        assert_eq!(value, json!({"a": {"b": [2, 3]}}));
        assert_eq!(remove_path(&mut value, &path("/missing/x")), None);
    }
}
