//! Data models for the guide generator

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel for an unknown numeric identifier
pub const UNKNOWN_NUMERIC: i64 = -1;
/// Sentinel for an unknown display ordinal
pub const UNKNOWN_ORDINAL: i64 = -1;
/// Sentinel for a missing display title
pub const NO_TITLE: &str = "no_title";
/// Sentinel for a missing content-type tag
pub const NO_TYPE: &str = "no_type";
/// Sentinel for a channel with no resolved group
pub const NO_CATEGORY: &str = "no_category";

/// Canonical identity of a broadcast channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Stable external identifier - the only dedup/cross-reference key
    pub id: String,
    /// Secondary numeric identifier, -1 when unknown
    pub numerical_id: i64,
    /// Display name, "no_title" when absent upstream
    pub title: String,
    /// Upstream content-type tag, "no_type" when absent
    pub kind: String,
    /// Intended display/sort position, -1 when absent
    pub ordinal: i64,
    /// Resolved category label, "no_category" when no mapping exists
    pub group: String,
    /// Audio/subtitle language ids, upstream order preserved
    pub languages: Vec<String>,
    /// Logo reference, None until resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    /// Playable stream location, None until resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
}

impl Channel {
    /// New channel with every field at its sentinel default
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            numerical_id: UNKNOWN_NUMERIC,
            title: NO_TITLE.to_string(),
            kind: NO_TYPE.to_string(),
            ordinal: UNKNOWN_ORDINAL,
            group: NO_CATEGORY.to_string(),
            languages: Vec::new(),
            logo: None,
            stream_url: None,
        }
    }

    /// Fold a later record for the same id into this one.
    /// Non-sentinel fields from `other` overwrite; a sentinel in `other`
    /// never clobbers a value already resolved here.
    pub fn absorb(&mut self, other: Channel) {
        if other.numerical_id != UNKNOWN_NUMERIC {
            self.numerical_id = other.numerical_id;
        }
        if other.title != NO_TITLE {
            self.title = other.title;
        }
        if other.kind != NO_TYPE {
            self.kind = other.kind;
        }
        if other.ordinal != UNKNOWN_ORDINAL {
            self.ordinal = other.ordinal;
        }
        if other.group != NO_CATEGORY {
            self.group = other.group;
        }
        if !other.languages.is_empty() {
            self.languages = other.languages;
        }
        if other.logo.is_some() {
            self.logo = other.logo;
        }
        if other.stream_url.is_some() {
            self.stream_url = other.stream_url;
        }
    }
}

/// A single scheduled broadcast instance inside a filtered window
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Weak reference to Channel::id - may point at a channel we never saw
    pub channel_id: String,
    pub start: DateTime<FixedOffset>,
    pub stop: DateTime<FixedOffset>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Normalized set of channels keyed by id
pub type ChannelSet = HashMap<String, Channel>;

/// Immutable view handed to the emitters: normalized channels plus the
/// programs of each output window, computed independently from one parsed
/// guide document.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub channels: ChannelSet,
    /// Programs inside the guide window
    pub guide_programs: Vec<Program>,
    /// Programs inside the (shorter) record window
    pub record_programs: Vec<Program>,
}

impl Snapshot {
    /// Channels sorted by ordinal ascending, ties broken by id for a
    /// stable output order
    pub fn channels_by_ordinal(&self) -> Vec<&Channel> {
        let mut list: Vec<&Channel> = self.channels.values().collect();
        list.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.id.cmp(&b.id)));
        list
    }
}
