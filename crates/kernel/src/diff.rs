//! Structural diff between two payloads.
//!
//! Payloads are walked as trees of objects, lists, and scalars. Lists are
//! aligned on their longest common subsequence so an insertion in the
//! middle reports one addition, not a cascade of modifications, and a pure
//! permutation reports moves.

use chronicle_codec::to_canonical_bytes;
use chronicle_common::{
    ContentPath, DiffKind, DiffSummary, Difference, LineNumbers, Severity, VersionComparison,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

/// Above this many LCS cells, lists are aligned by position instead.
const MAX_ALIGN_CELLS: usize = 4_000_000;

/// Longest preview of a value embedded in a description.
const PREVIEW_CHARS: usize = 40;

/// Paths edited by a concurrent version, as reported by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcurrentEdits {
    paths: Vec<ContentPath>,
}

impl ConcurrentEdits {
    pub fn new(paths: Vec<ContentPath>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[ContentPath] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Whether `path` was touched, at itself, an ancestor, or a descendant.
    pub fn touches(&self, path: &ContentPath) -> bool {
        self.paths.iter().any(|edited| edited.overlaps(path))
    }
}

/// Compute every difference from `source` to `target`.
///
/// Additions are paths only in `target`; deletions are paths only in `source`.
pub fn diff(source: &Value, target: &Value) -> Vec<Difference> {
    let mut out = Vec::new();
    walk(&ContentPath::root(), source, target, false, &mut out);
    out
}

/// Full comparison with summary, similarity, and conflict count.
///
/// Without `concurrent` edit information the conflict count is zero.
pub fn compare(
    source_version: &str,
    target_version: &str,
    source: &Value,
    target: &Value,
    concurrent: Option<&ConcurrentEdits>,
) -> VersionComparison {
    let differences = diff(source, target);
    let summary = DiffSummary::from_differences(&differences);
    let similarity_score = similarity_score(source, target, &differences);
    let conflict_count = concurrent
        .map(|edits| conflicting_paths(&differences, edits).len())
        .unwrap_or(0);
    tracing::debug!(
        source = source_version,
        target = target_version,
        differences = differences.len(),
        conflict_count,
        similarity_score,
        "compared payloads"
    );
    VersionComparison {
        source_version: source_version.to_string(),
        target_version: target_version.to_string(),
        differences,
        summary,
        conflict_count,
        similarity_score,
    }
}

/// High-severity differences whose path overlaps a concurrent edit.
pub fn conflicting_paths(differences: &[Difference], concurrent: &ConcurrentEdits) -> Vec<String> {
    if concurrent.is_empty() {
        return Vec::new();
    }
    differences
        .iter()
        .filter(|d| d.severity == Severity::High)
        .filter(|d| {
            ContentPath::parse(&d.path)
                .map(|path| concurrent.touches(&path))
                .unwrap_or(true)
        })
        .map(|d| d.path.clone())
        .collect()
}

/// `1 - weighted differences / total fields`, clamped to `[0, 1]`.
///
/// Fields are leaves (scalars and empty containers) on both sides. Each
/// difference weighs the leaves it adds or removes; a move weighs one.
pub fn similarity_score(source: &Value, target: &Value, differences: &[Difference]) -> f64 {
    if differences.is_empty() {
        return 1.0;
    }
    let total = (leaf_count(source) + leaf_count(target)) as f64;
    let weighted: usize = differences
        .iter()
        .map(|d| match d.kind {
            DiffKind::Addition => d.new_value.as_ref().map_or(1, leaf_count),
            DiffKind::Deletion => d.old_value.as_ref().map_or(1, leaf_count),
            DiffKind::Modification => {
                d.old_value.as_ref().map_or(1, leaf_count)
                    + d.new_value.as_ref().map_or(1, leaf_count)
            }
            DiffKind::Move => 1,
        })
        .sum();
    (1.0 - weighted as f64 / total).clamp(0.0, 1.0)
}

pub(crate) fn leaf_count(value: &Value) -> usize {
    match value {
        Value::Object(map) if !map.is_empty() => map.values().map(leaf_count).sum(),
        Value::Array(items) if !items.is_empty() => items.iter().map(leaf_count).sum(),
        _ => 1,
    }
}

fn walk(path: &ContentPath, source: &Value, target: &Value, in_list: bool, out: &mut Vec<Difference>) {
    if source == target {
        return;
    }
    match (source, target) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, old_value) in old {
                let child = path.child(key.as_str());
                match new.get(key) {
                    Some(new_value) => walk(&child, old_value, new_value, false, out),
                    None => out.push(deletion(&child, old_value, None)),
                }
            }
            for (key, new_value) in new {
                if !old.contains_key(key) {
                    out.push(addition(&path.child(key.as_str()), new_value, None));
                }
            }
        }
        (Value::Array(old), Value::Array(new)) => walk_list(path, old, new, out),
        _ => out.push(modification(path, source, target, in_list)),
    }
}

fn walk_list(path: &ContentPath, old: &[Value], new: &[Value], out: &mut Vec<Difference>) {
    if let Some(moves) = permutation_moves(old, new) {
        for (from, to) in moves {
            out.push(Difference {
                kind: DiffKind::Move,
                path: path.index(to).to_string(),
                old_value: Some(old[from].clone()),
                new_value: Some(new[to].clone()),
                description: format!(
                    "moved {} from position {} to {}",
                    preview(&new[to]),
                    from + 1,
                    to + 1
                ),
                severity: Severity::Low,
                category: path.category(),
                line_numbers: Some(LineNumbers {
                    old: Some(from + 1),
                    new: Some(to + 1),
                }),
            });
        }
        return;
    }
    for step in align(old, new) {
        match step {
            Alignment::Same { .. } => {}
            Alignment::Paired { old: i, new: j } if i == j => {
                walk(&path.index(j), &old[i], &new[j], true, out);
            }
            Alignment::Paired { old: i, new: j } => {
                out.push(deletion(&path.index(i), &old[i], Some(i)));
                out.push(addition(&path.index(j), &new[j], Some(j)));
            }
            Alignment::Removed { old: i } => {
                out.push(deletion(&path.index(i), &old[i], Some(i)));
            }
            Alignment::Added { new: j } => {
                out.push(addition(&path.index(j), &new[j], Some(j)));
            }
        }
    }
}

fn addition(path: &ContentPath, value: &Value, index: Option<usize>) -> Difference {
    Difference {
        kind: DiffKind::Addition,
        path: path.to_string(),
        old_value: None,
        new_value: Some(value.clone()),
        description: format!("added {} at {path}", preview(value)),
        severity: Severity::Low,
        category: path.category(),
        line_numbers: index.map(|j| LineNumbers {
            old: None,
            new: Some(j + 1),
        }),
    }
}

fn deletion(path: &ContentPath, value: &Value, index: Option<usize>) -> Difference {
    Difference {
        kind: DiffKind::Deletion,
        path: path.to_string(),
        old_value: Some(value.clone()),
        new_value: None,
        description: format!("removed {} at {path}", preview(value)),
        severity: Severity::Low,
        category: path.category(),
        line_numbers: index.map(|i| LineNumbers {
            old: Some(i + 1),
            new: None,
        }),
    }
}

fn modification(path: &ContentPath, old: &Value, new: &Value, in_list: bool) -> Difference {
    let type_changed = type_name(old) != type_name(new);
    let severity = if path.is_root() || type_changed {
        Severity::High
    } else {
        Severity::Medium
    };
    let description = if type_changed {
        format!(
            "changed {path} from {} to {}",
            type_name(old),
            type_name(new)
        )
    } else {
        format!("changed {path} from {} to {}", preview(old), preview(new))
    };
    let line_numbers = in_list
        .then(|| path.segments().last().and_then(|s| s.parse::<usize>().ok()))
        .flatten()
        .map(|j| LineNumbers {
            old: Some(j + 1),
            new: Some(j + 1),
        });
    Difference {
        kind: DiffKind::Modification,
        path: path.to_string(),
        old_value: Some(old.clone()),
        new_value: Some(new.clone()),
        description,
        severity,
        category: path.category(),
        line_numbers,
    }
}

/// One step of a list alignment, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Alignment {
    /// Equal elements matched by the common subsequence.
    Same { old: usize, new: usize },
    /// Differing elements occupying the same gap position.
    Paired { old: usize, new: usize },
    Removed { old: usize },
    Added { new: usize },
}

/// Align two lists on their longest common subsequence.
///
/// Between matches, removed and added elements are paired positionally;
/// the surplus on either side is reported as removed or added. Swapping the
/// arguments yields the mirrored alignment.
pub(crate) fn align(old: &[Value], new: &[Value]) -> Vec<Alignment> {
    let matches = if old.len().saturating_mul(new.len()) > MAX_ALIGN_CELLS {
        positional_matches(old, new)
    } else {
        lcs_matches(old, new)
    };

    let mut out = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0, 0);
    for (mi, mj) in matches
        .into_iter()
        .chain(std::iter::once((old.len(), new.len())))
    {
        let removed: Vec<usize> = (i..mi).collect();
        let added: Vec<usize> = (j..mj).collect();
        let paired = removed.len().min(added.len());
        for k in 0..paired {
            out.push(Alignment::Paired {
                old: removed[k],
                new: added[k],
            });
        }
        out.extend(removed[paired..].iter().map(|&o| Alignment::Removed { old: o }));
        out.extend(added[paired..].iter().map(|&n| Alignment::Added { new: n }));
        if mi < old.len() && mj < new.len() {
            out.push(Alignment::Same { old: mi, new: mj });
        }
        i = mi + 1;
        j = mj + 1;
    }
    out
}

fn lcs_matches(old: &[Value], new: &[Value]) -> Vec<(usize, usize)> {
    let (n, m) = (old.len(), new.len());
    // table[i][j] = LCS length of old[i..] and new[j..]
    let mut table = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if old[i] == new[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }
    let mut matches = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            matches.push((i, j));
            i += 1;
            j += 1;
        } else {
            let skip_old = match table[i + 1][j].cmp(&table[i][j + 1]) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => tie_skips_old(&old[i], &new[j]),
            };
            if skip_old {
                i += 1;
            } else {
                j += 1;
            }
        }
    }
    matches
}

/// Ties skip the element with the smaller canonical encoding, whichever side
/// it is on, so aligning `new` against `old` mirrors aligning `old` against `new`.
fn tie_skips_old(old: &Value, new: &Value) -> bool {
    let key = |v: &Value| to_canonical_bytes(v).unwrap_or_default();
    key(old) <= key(new)
}

fn positional_matches(old: &[Value], new: &[Value]) -> Vec<(usize, usize)> {
    old.iter()
        .zip(new)
        .enumerate()
        .filter(|(_, (a, b))| a == b)
        .map(|(i, _)| (i, i))
        .collect()
}

/// If `new` is a reordering of `old`, the `(from, to)` index of every
/// element whose position changed.
fn permutation_moves(old: &[Value], new: &[Value]) -> Option<Vec<(usize, usize)>> {
    if old.len() != new.len() || old == new {
        return None;
    }
    let key = |v: &Value| to_canonical_bytes(v).unwrap_or_default();
    let mut positions: HashMap<Vec<u8>, VecDeque<usize>> = HashMap::new();
    for (i, item) in old.iter().enumerate() {
        positions.entry(key(item)).or_default().push_back(i);
    }
    let mut moves = Vec::new();
    for (to, item) in new.iter().enumerate() {
        let from = positions.get_mut(&key(item))?.pop_front()?;
        if from != to {
            moves.push((from, to));
        }
    }
    Some(moves)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn preview(value: &Value) -> String {
    match value {
        Value::Object(map) => format!("object with {} fields", map.len()),
        Value::Array(items) => format!("list of {} items", items.len()),
        scalar => {
            let text = scalar.to_string();
            if text.chars().count() > PREVIEW_CHARS {
                let cut: String = text.chars().take(PREVIEW_CHARS).collect();
                format!("{cut}…")
            } else {
                text
            }
        }
    }
}
