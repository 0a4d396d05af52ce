//! Cross-source aggregation
//!
//! Merges channel sets and already-serialized flat records from multiple
//! independent runs into a single deduplicated superset. Callers supply the
//! inputs in a stable, meaningful order (the market loop iterates market
//! codes alphabetically) because later inputs win on key collision and that
//! choice is observable in the combined output.

use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::models::ChannelSet;

/// Merge channel sets in order. Field-level semantics: the first set to
/// mention an id establishes the record, later mentions fill sentinels and
/// overwrite with non-sentinel values. The output holds exactly one entry
/// per distinct id present in any input.
pub fn merge_channel_sets(sets: Vec<ChannelSet>) -> ChannelSet {
    let mut merged = ChannelSet::new();
    for set in sets {
        for (id, channel) in set {
            match merged.entry(id) {
                Entry::Occupied(mut entry) => entry.get_mut().absorb(channel),
                Entry::Vacant(entry) => {
                    entry.insert(channel);
                }
            }
        }
    }
    merged
}

/// Merge flat record lists in order: last-wins full-record replacement.
///
/// Records are keyed by their `id` field, falling back to the display name
/// (`title`, then `name`) for sources that omit identifiers. A record with
/// no usable key cannot collide and is appended as-is. First-seen order is
/// preserved; a replacement keeps its original position.
pub fn merge_records(lists: Vec<Vec<Value>>) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for list in lists {
        for record in list {
            match record_key(&record) {
                Some(key) => match index_by_key.get(&key).copied() {
                    Some(idx) => merged[idx] = record,
                    None => {
                        index_by_key.insert(key, merged.len());
                        merged.push(record);
                    }
                },
                None => merged.push(record),
            }
        }
    }
    merged
}

fn record_key(record: &Value) -> Option<String> {
    for key in ["id", "title", "name"] {
        match record.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}
