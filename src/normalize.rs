//! Channel normalization
//!
//! Turns one or more raw catalog documents (trees of groups containing
//! station records) plus an optional separate category document into a
//! canonical channel set keyed by id. Field extraction is tolerant: ids and
//! numbers may arrive as JSON strings or numbers, and anything missing
//! falls back to its documented sentinel.

use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::GenError;
use crate::models::{Channel, ChannelSet};

/// Outcome of one normalization pass
#[derive(Debug, Default)]
pub struct Normalized {
    pub channels: ChannelSet,
    /// Station records skipped for having no usable identifier
    pub skipped: usize,
}

/// Station id may hide under a handful of upstream spellings
const ID_FIELDS: &[&str] = &["id", "epgId", "epg_id", "epg_channel_id"];

/// Build the channel_id -> group label lookup from a category document
/// declared independently of the channel listing. An unusable document
/// yields an empty map.
pub fn category_map(doc: &Value) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let categories = doc
        .get("data")
        .or_else(|| doc.get("categories"))
        .and_then(Value::as_array);

    for category in categories.into_iter().flatten() {
        let name = match string_field(category, &["name"]) {
            Some(name) => name,
            None => continue,
        };
        let members = category
            .get("live_channels")
            .or_else(|| category.get("channels"))
            .and_then(Value::as_array);
        for member in members.into_iter().flatten() {
            // Members are bare ids or station objects
            let id = value_as_string(member).or_else(|| string_field(member, ID_FIELDS));
            if let Some(id) = id {
                map.insert(id, name.clone());
            }
        }
    }
    map
}

/// Normalize catalog documents in input order. The first document to mention
/// a channel id establishes it; later mentions fill sentinels and overwrite
/// with non-sentinel values, never dropping an id seen earlier.
pub fn normalize(catalogs: &[Value], category_doc: Option<&Value>) -> Normalized {
    let groups_by_channel = category_doc.map(category_map).unwrap_or_default();
    let mut result = Normalized::default();

    for doc in catalogs {
        for (group_name, stations) in iter_groups(doc) {
            for station in stations {
                match station_to_channel(station, group_name.as_deref(), &groups_by_channel) {
                    Ok(channel) => match result.channels.entry(channel.id.clone()) {
                        Entry::Occupied(mut entry) => entry.get_mut().absorb(channel),
                        Entry::Vacant(entry) => {
                            entry.insert(channel);
                        }
                    },
                    Err(e) => {
                        result.skipped += 1;
                        warn!("skipping station record: {e}");
                    }
                }
            }
        }
    }

    debug!(
        channels = result.channels.len(),
        skipped = result.skipped,
        "catalog normalized"
    );
    result
}

/// Walk a catalog document as a sequence of (group name, stations) pairs.
/// Accepts a `groups`/`data` array of group objects, or a flat `data` array
/// of stations with no grouping at all.
fn iter_groups(doc: &Value) -> Vec<(Option<String>, Vec<&Value>)> {
    let entries = doc
        .get("groups")
        .or_else(|| doc.get("data"))
        .and_then(Value::as_array);

    let mut groups: Vec<(Option<String>, Vec<&Value>)> = Vec::new();
    let mut loose_stations: Vec<&Value> = Vec::new();

    for entry in entries.into_iter().flatten() {
        let stations = entry
            .get("stations")
            .or_else(|| entry.get("live_channels"))
            .or_else(|| entry.get("channels"))
            .and_then(Value::as_array);
        match stations {
            Some(stations) => {
                groups.push((string_field(entry, &["name"]), stations.iter().collect()));
            }
            None => loose_stations.push(entry),
        }
    }

    if !loose_stations.is_empty() {
        groups.push((None, loose_stations));
    }
    groups
}

/// Extract one channel from a station record. Only the id is required;
/// everything else degrades to its sentinel.
fn station_to_channel(
    station: &Value,
    group_name: Option<&str>,
    groups_by_channel: &HashMap<String, String>,
) -> Result<Channel, GenError> {
    if !station.is_object() {
        return Err(GenError::Record(format!(
            "station is not an object: {station}"
        )));
    }

    let id = string_field(station, ID_FIELDS)
        .ok_or_else(|| GenError::Record("station has no usable id field".to_string()))?;

    let mut channel = Channel::with_id(&id);
    if let Some(n) = int_field(station, &["numerical_id"]) {
        channel.numerical_id = n;
    }
    if let Some(title) = string_field(station, &["title", "name"]) {
        channel.title = title;
    }
    if let Some(kind) = string_field(station, &["type"]) {
        channel.kind = kind;
    }
    if let Some(ordinal) = int_field(station, &["channel_number", "ordinal"]) {
        channel.ordinal = ordinal;
    }
    channel.languages = languages(station);
    channel.logo = logo(station);
    if let Some(url) = string_field(station, &["url", "stream_url"]) {
        channel.stream_url = Some(url);
    }

    // The standalone category document outranks the enclosing group label
    if let Some(group) = groups_by_channel.get(&id) {
        channel.group = group.clone();
    } else if let Some(group) = group_name {
        channel.group = group.to_string();
    }

    Ok(channel)
}

/// Language ids live in a nested `labels.languages[].id` structure; a
/// missing or malformed nesting yields an empty sequence, never a fault
fn languages(station: &Value) -> Vec<String> {
    station
        .get("labels")
        .and_then(|labels| labels.get("languages"))
        .and_then(Value::as_array)
        .map(|langs| {
            langs
                .iter()
                .filter_map(|lang| string_field(lang, &["id"]))
                .collect()
        })
        .unwrap_or_default()
}

fn logo(station: &Value) -> Option<String> {
    for key in ["image", "logo"] {
        match station.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(obj @ Value::Object(_)) => {
                if let Some(url) = string_field(obj, &["url"]) {
                    return Some(url);
                }
            }
            _ => {}
        }
    }
    None
}

/// First non-empty value among `keys`, accepting strings and numbers
fn string_field(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(value_as_string)
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First value among `keys` readable as an integer, accepting numbers and
/// numeric strings
fn int_field(obj: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().filter_map(|key| obj.get(*key)).find_map(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
