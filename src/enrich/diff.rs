//! Before/after diff computation for enrichment runs.
//!
//! Pure function over (before-snapshot, after-record-list). Bookkeeping
//! fields are excluded; long values are truncated for display only, never
//! for classification.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{FieldMap, TeamRecord};

/// Fields tracked for bookkeeping, never reported as data changes.
const EXCLUDED_FIELDS: &[&str] = &["enrichments_applied", "last_enriched"];

/// Display caps: lists collapse past this many elements, strings truncate
/// past this many characters.
const MAX_LIST_DISPLAY: usize = 3;
const MAX_STRING_DISPLAY: usize = 100;

/// Kind of change a field underwent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// One field's change, with display-truncated values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub change_type: ChangeType,
    pub old_value: Value,
    pub new_value: Value,
}

/// All qualifying changes for one team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamDiff {
    pub team_name: String,
    pub changes: Vec<FieldChange>,
    pub fields_added: usize,
    pub fields_modified: usize,
    pub fields_removed: usize,
}

/// Structured before/after comparison for a completed task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentDiff {
    pub teams_changed: usize,
    pub fields_added: usize,
    pub fields_modified: usize,
    /// Per-team diffs, most-changed team first.
    pub team_diffs: Vec<TeamDiff>,
}

/// Compare a pre-enrichment snapshot against the post-enrichment records.
///
/// A missing before-state is treated as a record with no fields, so every
/// populated field becomes "added". Teams with zero qualifying changes are
/// omitted.
pub fn compute_diff(before: &HashMap<String, FieldMap>, after: &[TeamRecord]) -> EnrichmentDiff {
    let mut diff = EnrichmentDiff::default();

    for record in after {
        let old_fields: HashMap<&str, &Value> = before
            .get(&record.name)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(name, value)| (name.as_str(), value))
                    .collect()
            })
            .unwrap_or_default();

        let mut team_diff = TeamDiff {
            team_name: record.name.clone(),
            changes: Vec::new(),
            fields_added: 0,
            fields_modified: 0,
            fields_removed: 0,
        };

        for (field, new_value) in record.field_map() {
            if EXCLUDED_FIELDS.contains(&field.as_str()) {
                continue;
            }

            let old_value = old_fields.get(field.as_str()).copied();
            let old_value = old_value.unwrap_or(&Value::Null);

            let Some(change_type) = classify(old_value, &new_value) else {
                continue;
            };

            match change_type {
                ChangeType::Added => team_diff.fields_added += 1,
                ChangeType::Modified => team_diff.fields_modified += 1,
                ChangeType::Removed => team_diff.fields_removed += 1,
            }

            team_diff.changes.push(FieldChange {
                field,
                change_type,
                old_value: truncate_for_display(old_value),
                new_value: truncate_for_display(&new_value),
            });
        }

        if !team_diff.changes.is_empty() {
            diff.teams_changed += 1;
            diff.fields_added += team_diff.fields_added;
            diff.fields_modified += team_diff.fields_modified;
            diff.team_diffs.push(team_diff);
        }
    }

    diff.team_diffs
        .sort_by(|a, b| b.changes.len().cmp(&a.changes.len()));
    diff
}

/// Classify a field transition; `None` means no reportable change.
fn classify(old: &Value, new: &Value) -> Option<ChangeType> {
    let old_blank = is_blank(old);
    let new_blank = is_blank(new);

    if old_blank && new_blank {
        None
    } else if old_blank {
        Some(ChangeType::Added)
    } else if new_blank {
        Some(ChangeType::Removed)
    } else if old != new {
        Some(ChangeType::Modified)
    } else {
        None
    }
}

/// Null, blank string, and empty collections are equivalent "no value".
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Collapse long values for display. Classification never sees the
/// truncated form.
fn truncate_for_display(value: &Value) -> Value {
    match value {
        Value::Array(items) if items.len() > MAX_LIST_DISPLAY => {
            let mut shown: Vec<Value> = items[..MAX_LIST_DISPLAY].to_vec();
            shown.push(Value::String(format!(
                "+{} more",
                items.len() - MAX_LIST_DISPLAY
            )));
            Value::Array(shown)
        }
        Value::String(s) if s.chars().count() > MAX_STRING_DISPLAY => {
            let truncated: String = s.chars().take(MAX_STRING_DISPLAY).collect();
            Value::String(format!("{truncated}..."))
        }
        other => other.clone(),
    }
}
