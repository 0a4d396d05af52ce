//! One market run, end to end
//!
//! Fetches the configured sources concurrently and joins them all before
//! normalization begins, assembles the immutable snapshot, then hands it to
//! the three emitters. Each emitter gets a read-only view and writes a
//! disjoint artifact, so they run on their own scoped threads. A failed
//! write is reported for its artifact without blocking the other two.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{info, warn};

use crate::aggregate;
use crate::config::{Config, Market};
use crate::epg::{self, parser::GuideDoc};
use crate::error::{GenError, Result};
use crate::fetch::SourceClient;
use crate::models::Snapshot;
use crate::normalize;
use crate::{guide, playlist, records};

/// Everything one market run produces in memory, kept for cross-market
/// aggregation after the loop
pub struct MarketOutput {
    pub market_code: String,
    pub snapshot: Snapshot,
    pub records: Vec<Value>,
}

/// Artifact locations for one label ("it", "all", ...)
pub struct ArtifactPaths {
    pub playlist: PathBuf,
    pub guide: PathBuf,
    pub records: PathBuf,
    pub index: PathBuf,
}

pub fn artifact_paths(config: &Config, label: &str) -> ArtifactPaths {
    let file = |ext: &str| {
        config
            .output_dir
            .join(format!("{}_{}.{}", config.file_prefix, label, ext))
    };
    ArtifactPaths {
        playlist: file("m3u"),
        guide: file("xml"),
        records: file("json"),
        index: file("index.json"),
    }
}

/// Run the whole pipeline for one market. Only a primary catalog failure is
/// an error; every secondary source degrades to an empty document.
pub fn run_market(
    client: &SourceClient,
    config: &Config,
    market: &Market,
    now: DateTime<Utc>,
    resolve_streams: bool,
) -> Result<MarketOutput> {
    // Fan out the source fetches; nothing downstream starts until all of
    // them have completed or definitively failed
    let (catalog, categories, guide_doc) = thread::scope(|scope| {
        let catalog = scope.spawn(|| client.fetch_catalog(market));
        let categories = scope.spawn(|| client.fetch_categories(market));
        let guide_doc = scope.spawn(|| client.fetch_guide(market));
        (
            catalog.join().expect("catalog fetch panicked"),
            categories.join().expect("category fetch panicked"),
            guide_doc.join().expect("guide fetch panicked"),
        )
    });

    let catalog = catalog?;

    let categories = match categories {
        Some(Ok(doc)) => Some(doc),
        Some(Err(e)) => {
            warn!("market {}: category source degraded to empty: {e}", market.code);
            None
        }
        None => None,
    };

    let guide_doc = match guide_doc {
        Some(Ok(doc)) => doc,
        Some(Err(e)) => {
            warn!("market {}: guide source degraded to empty: {e}", market.code);
            GuideDoc::default()
        }
        None => GuideDoc::default(),
    };
    if guide_doc.parse_errors > 0 {
        warn!(
            "market {}: guide feed had {} unparsable elements",
            market.code, guide_doc.parse_errors
        );
    }

    let mut snapshot = assemble(
        &[catalog],
        categories.as_ref(),
        &guide_doc,
        now,
        Duration::hours(config.guide_horizon_hours),
        Duration::hours(config.record_horizon_hours),
    );

    if resolve_streams {
        let resolved = client.resolve_streams(market, &mut snapshot.channels);
        info!(
            "market {}: resolved {resolved}/{} streams",
            market.code,
            snapshot.channels.len()
        );
    }

    let record_list = records::render_records(&snapshot);
    let paths = artifact_paths(config, &market.code);
    emit_all(config, &paths, &snapshot, &record_list, now);

    Ok(MarketOutput {
        market_code: market.code.clone(),
        snapshot,
        records: record_list,
    })
}

/// Pure assembly of the normalized snapshot from fetched documents. Both
/// output windows are computed independently from the one parsed guide
/// document, never by filtering an already-filtered list.
pub fn assemble(
    catalogs: &[Value],
    categories: Option<&Value>,
    guide_doc: &GuideDoc,
    now: DateTime<Utc>,
    guide_horizon: Duration,
    record_horizon: Duration,
) -> Snapshot {
    let normalized = normalize::normalize(catalogs, categories);
    let mut channels = normalized.channels;

    // The guide's channel declarations can still contribute a logo for
    // channels the catalog left bare
    for (id, declared) in &guide_doc.channels {
        if let Some(channel) = channels.get_mut(id) {
            if channel.logo.is_none() {
                channel.logo = declared.icon.clone();
            }
        }
    }

    let guide_window = epg::filter_window(&guide_doc.programmes, now, guide_horizon);
    let record_window = epg::filter_window(&guide_doc.programmes, now, record_horizon);
    info!(
        channels = channels.len(),
        guide_programs = guide_window.programs.len(),
        record_programs = record_window.programs.len(),
        dropped = guide_window.dropped,
        "snapshot assembled"
    );

    Snapshot {
        channels,
        guide_programs: guide_window.programs,
        record_programs: record_window.programs,
    }
}

/// Render and write the three artifacts plus the index. Emitters share the
/// read-only snapshot and run concurrently; a write failure is logged per
/// artifact and the rest still land.
pub fn emit_all(
    config: &Config,
    paths: &ArtifactPaths,
    snapshot: &Snapshot,
    record_list: &[Value],
    now: DateTime<Utc>,
) {
    let guide_name = paths
        .guide
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let guide_location = config.guide_location(&guide_name);

    thread::scope(|scope| {
        scope.spawn(|| {
            report(write_artifact(
                &paths.playlist,
                &playlist::render_playlist(snapshot, &guide_location),
            ));
        });
        scope.spawn(|| {
            report(write_artifact(
                &paths.guide,
                &guide::render_guide(snapshot, "guidegen"),
            ));
        });
        scope.spawn(|| {
            report(write_artifact(
                &paths.records,
                &records::records_to_json(record_list),
            ));
        });
    });

    report(write_artifact(
        &paths.index,
        &records::render_index(&paths.playlist, &paths.guide, &paths.records, now),
    ));
}

/// Fold per-market outputs (already in the caller's documented order) into
/// one combined snapshot and record list
pub fn combine(outputs: &[MarketOutput]) -> (Snapshot, Vec<Value>) {
    let channels = aggregate::merge_channel_sets(
        outputs.iter().map(|o| o.snapshot.channels.clone()).collect(),
    );
    let guide_programs = outputs
        .iter()
        .flat_map(|o| o.snapshot.guide_programs.iter().cloned())
        .collect();
    let record_programs = outputs
        .iter()
        .flat_map(|o| o.snapshot.record_programs.iter().cloned())
        .collect();
    let records = aggregate::merge_records(outputs.iter().map(|o| o.records.clone()).collect());

    (
        Snapshot {
            channels,
            guide_programs,
            record_programs,
        },
        records,
    )
}

fn write_artifact(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| GenError::write(path, e))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn report(result: Result<()>) {
    if let Err(e) = result {
        tracing::error!("{e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epg::parser;
    use chrono::TimeZone;
    use serde_json::json;

    fn catalog() -> Value {
        json!({
            "groups": [{
                "name": "News",
                "stations": [
                    { "id": "a", "name": "Alpha", "channel_number": 1, "url": "http://e/a.m3u8" },
                    { "id": "b", "name": "Beta", "channel_number": 2 }
                ]
            }]
        })
    }

    fn guide_xml() -> String {
        r#"<tv>
  <channel id="a"><display-name>Alpha</display-name><icon src="http://e/a.png"/></channel>
  <programme start="20250101063000 +0000" stop="20250101073000 +0000" channel="a"><title>Morning</title></programme>
  <programme start="20250101180000 +0000" stop="20250101190000 +0000" channel="a"><title>Evening</title></programme>
</tv>"#
            .to_string()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_assemble_joins_catalog_and_guide() {
        let doc = parser::parse(&guide_xml());
        let snapshot = assemble(
            &[catalog()],
            None,
            &doc,
            now(),
            Duration::hours(24),
            Duration::hours(6),
        );

        assert_eq!(snapshot.channels.len(), 2);
        // Guide icon fills the catalog's missing logo
        assert_eq!(snapshot.channels["a"].logo.as_deref(), Some("http://e/a.png"));
        // 24h window sees both programs, 6h window only the morning one
        assert_eq!(snapshot.guide_programs.len(), 2);
        assert_eq!(snapshot.record_programs.len(), 1);
        assert_eq!(
            snapshot.record_programs[0].title.as_deref(),
            Some("Morning")
        );
    }

    #[test]
    fn test_assemble_without_guide_yields_zero_programs() {
        let snapshot = assemble(
            &[catalog()],
            None,
            &GuideDoc::default(),
            now(),
            Duration::hours(24),
            Duration::hours(12),
        );
        assert_eq!(snapshot.channels.len(), 2);
        assert!(snapshot.guide_programs.is_empty());
        assert!(snapshot.record_programs.is_empty());

        // The guide artifact still declares every channel
        let xml = guide::render_guide(&snapshot, "guidegen");
        assert!(xml.contains("<channel id=\"a\">"));
        assert!(xml.contains("<channel id=\"b\">"));
        assert!(!xml.contains("<programme"));
    }

    #[test]
    fn test_combine_dedups_across_markets() {
        let first = assemble(
            &[catalog()],
            None,
            &GuideDoc::default(),
            now(),
            Duration::hours(24),
            Duration::hours(12),
        );
        let second_catalog = json!({
            "groups": [{
                "name": "Sport",
                "stations": [{ "id": "a", "name": "Alpha HD" }, { "id": "c", "name": "Gamma" }]
            }]
        });
        let second = assemble(
            &[second_catalog],
            None,
            &GuideDoc::default(),
            now(),
            Duration::hours(24),
            Duration::hours(12),
        );

        let outputs = vec![
            MarketOutput {
                market_code: "at".to_string(),
                records: records::render_records(&first),
                snapshot: first,
            },
            MarketOutput {
                market_code: "it".to_string(),
                records: records::render_records(&second),
                snapshot: second,
            },
        ];

        let (combined, combined_records) = combine(&outputs);
        assert_eq!(combined.channels.len(), 3);
        // Later market won the shared id's non-sentinel fields
        assert_eq!(combined.channels["a"].title, "Alpha HD");
        // Earlier market's stream survives the later sentinel
        assert_eq!(
            combined.channels["a"].stream_url.as_deref(),
            Some("http://e/a.m3u8")
        );
        assert_eq!(combined_records.len(), 3);
    }

    #[test]
    fn test_artifact_paths_layout() {
        let config: Config = serde_json::from_str(
            r#"{
                "source": { "catalog_url": "https://api.example.com/channels" },
                "markets": { "it": 36 },
                "output_dir": "out",
                "file_prefix": "tv"
            }"#,
        )
        .unwrap();
        let paths = artifact_paths(&config, "it");
        assert_eq!(paths.playlist, PathBuf::from("out/tv_it.m3u"));
        assert_eq!(paths.guide, PathBuf::from("out/tv_it.xml"));
        assert_eq!(paths.records, PathBuf::from("out/tv_it.json"));
        assert_eq!(paths.index, PathBuf::from("out/tv_it.index.json"));
    }
}
