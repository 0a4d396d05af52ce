//! Flat record emitter and index artifact
//!
//! Emits one self-contained JSON record per channel carrying every resolved
//! attribute plus the near-term programs joined by channel id. The index
//! artifact names the locations of the three produced documents for other
//! tooling; it holds metadata only.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;

use crate::models::{Program, Snapshot};

/// Render one flat record per channel. Channels with no matching programs
/// get an empty program list, not an absent field. Program references to
/// channels outside the set find no join partner and simply do not appear.
pub fn render_records(snapshot: &Snapshot) -> Vec<Value> {
    let mut programs_by_channel: HashMap<&str, Vec<&Program>> = HashMap::new();
    for program in &snapshot.record_programs {
        programs_by_channel
            .entry(program.channel_id.as_str())
            .or_default()
            .push(program);
    }

    snapshot
        .channels_by_ordinal()
        .into_iter()
        .map(|channel| {
            let programs: Vec<Value> = programs_by_channel
                .get(channel.id.as_str())
                .into_iter()
                .flatten()
                .map(|p| {
                    json!({
                        "start": p.start,
                        "stop": p.stop,
                        "title": p.title.clone(),
                        "description": p.description.clone(),
                    })
                })
                .collect();

            let mut record = match serde_json::to_value(channel) {
                Ok(value) => value,
                // Channel serialization cannot fail in practice; degrade to
                // an id-only record rather than dropping the channel
                Err(_) => json!({ "id": channel.id }),
            };
            record["programs"] = Value::Array(programs);
            record
        })
        .collect()
}

/// Serialize records as the flat-record document body
pub fn records_to_json(records: &[Value]) -> String {
    serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string())
}

/// Render the index artifact: artifact locations plus generation timestamp
pub fn render_index(
    playlist: &Path,
    guide: &Path,
    records: &Path,
    generated_at: DateTime<Utc>,
) -> String {
    let index = json!({
        "playlist": playlist.display().to_string(),
        "guide": guide.display().to_string(),
        "records": records.display().to_string(),
        "generated_at": generated_at.to_rfc3339(),
    });
    serde_json::to_string_pretty(&index).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epg::parse_xmltv_time;
    use crate::models::{Channel, Snapshot};
    use chrono::TimeZone;

    fn snapshot() -> Snapshot {
        let mut with_stream = Channel::with_id("a");
        with_stream.title = "Alpha".to_string();
        with_stream.stream_url = Some("http://example.com/a.m3u8".to_string());
        let without_stream = Channel::with_id("b");

        Snapshot {
            channels: [with_stream, without_stream]
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            guide_programs: Vec::new(),
            record_programs: vec![
                Program {
                    channel_id: "a".to_string(),
                    start: parse_xmltv_time("20250101120000 +0000").unwrap(),
                    stop: parse_xmltv_time("20250101130000 +0000").unwrap(),
                    title: Some("Noon News".to_string()),
                    description: None,
                },
                Program {
                    channel_id: "ghost".to_string(),
                    start: parse_xmltv_time("20250101120000 +0000").unwrap(),
                    stop: parse_xmltv_time("20250101130000 +0000").unwrap(),
                    title: None,
                    description: None,
                },
            ],
        }
    }

    #[test]
    fn test_every_channel_gets_a_record() {
        let records = render_records(&snapshot());
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_programs_join_by_channel_id() {
        let records = render_records(&snapshot());
        let a = records.iter().find(|r| r["id"] == "a").unwrap();
        let programs = a["programs"].as_array().unwrap();
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0]["title"], "Noon News");
        assert!(programs[0]["start"].as_str().unwrap().starts_with("2025-01-01T12:00:00"));
    }

    #[test]
    fn test_no_programs_is_empty_list_not_absent() {
        let records = render_records(&snapshot());
        let b = records.iter().find(|r| r["id"] == "b").unwrap();
        assert_eq!(b["programs"], json!([]));
    }

    #[test]
    fn test_unresolved_stream_is_absent_not_placeholder() {
        let records = render_records(&snapshot());
        let b = records.iter().find(|r| r["id"] == "b").unwrap();
        assert!(b.get("stream_url").is_none());
        let a = records.iter().find(|r| r["id"] == "a").unwrap();
        assert_eq!(a["stream_url"], "http://example.com/a.m3u8");
    }

    #[test]
    fn test_empty_snapshot_renders_empty_array() {
        assert_eq!(records_to_json(&render_records(&Snapshot::default())), "[]");
    }

    #[test]
    fn test_index_names_artifacts_and_timestamp() {
        let generated = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let index = render_index(
            Path::new("dist/catalog_it.m3u"),
            Path::new("dist/catalog_it.xml"),
            Path::new("dist/catalog_it.json"),
            generated,
        );
        let parsed: Value = serde_json::from_str(&index).unwrap();
        assert_eq!(parsed["playlist"], "dist/catalog_it.m3u");
        assert_eq!(parsed["guide"], "dist/catalog_it.xml");
        assert_eq!(parsed["records"], "dist/catalog_it.json");
        assert_eq!(parsed["generated_at"], "2025-06-01T08:00:00+00:00");
    }
}
