//! XMLTV guide emitter
//!
//! Projects the normalized snapshot into an XMLTV document: one channel
//! declaration per unique channel id (with or without a playable stream),
//! then one programme element per filtered program. Timestamps are written
//! in the same tolerant format the window filter parses, so the artifact
//! round-trips through this pipeline's own reader.

use quick_xml::escape::escape;

use crate::epg::format_xmltv_time;
use crate::models::Snapshot;

/// Render the guide document, pretty-printed with 2-space indentation
pub fn render_guide(snapshot: &Snapshot, generator_name: &str) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<tv generator-info-name=\"{}\">\n",
        escape(generator_name)
    ));

    // The channel map guarantees one declaration per id even when the same
    // id arrived from several merged sources
    for channel in snapshot.channels_by_ordinal() {
        out.push_str(&format!("  <channel id=\"{}\">\n", escape(&channel.id)));
        out.push_str(&format!(
            "    <display-name>{}</display-name>\n",
            escape(&channel.title)
        ));
        if let Some(ref logo) = channel.logo {
            out.push_str(&format!("    <icon src=\"{}\"/>\n", escape(logo)));
        }
        out.push_str("  </channel>\n");
    }

    for program in &snapshot.guide_programs {
        out.push_str(&format!(
            "  <programme start=\"{}\" stop=\"{}\" channel=\"{}\">\n",
            format_xmltv_time(&program.start),
            format_xmltv_time(&program.stop),
            escape(&program.channel_id)
        ));
        if let Some(ref title) = program.title {
            out.push_str(&format!("    <title>{}</title>\n", escape(title)));
        }
        if let Some(ref desc) = program.description {
            out.push_str(&format!("    <desc>{}</desc>\n", escape(desc)));
        }
        out.push_str("  </programme>\n");
    }

    out.push_str("</tv>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epg::{self, filter_window, parse_xmltv_time};
    use crate::models::{Channel, Program, Snapshot};
    use chrono::{Duration, TimeZone, Utc};

    fn snapshot_with(channels: Vec<Channel>, programs: Vec<Program>) -> Snapshot {
        Snapshot {
            channels: channels.into_iter().map(|c| (c.id.clone(), c)).collect(),
            guide_programs: programs,
            record_programs: Vec::new(),
        }
    }

    fn program(channel: &str, start: &str, stop: &str) -> Program {
        Program {
            channel_id: channel.to_string(),
            start: parse_xmltv_time(start).unwrap(),
            stop: parse_xmltv_time(stop).unwrap(),
            title: Some("News & Weather".to_string()),
            description: None,
        }
    }

    #[test]
    fn test_channel_without_stream_still_declared() {
        let mut ch = Channel::with_id("a");
        ch.title = "Alpha".to_string();
        assert!(ch.stream_url.is_none());

        let xml = render_guide(&snapshot_with(vec![ch], vec![]), "guidegen");
        assert!(xml.contains("<channel id=\"a\">"));
        assert!(xml.contains("<display-name>Alpha</display-name>"));
    }

    #[test]
    fn test_logo_renders_as_icon() {
        let mut ch = Channel::with_id("a");
        ch.logo = Some("http://example.com/a.png".to_string());
        let xml = render_guide(&snapshot_with(vec![ch], vec![]), "guidegen");
        assert!(xml.contains("<icon src=\"http://example.com/a.png\"/>"));
    }

    #[test]
    fn test_programme_elements_carry_window_times() {
        let xml = render_guide(
            &snapshot_with(
                vec![Channel::with_id("a")],
                vec![program("a", "20250101120000 +0000", "20250101130000 +0000")],
            ),
            "guidegen",
        );
        assert!(xml.contains(
            "<programme start=\"20250101120000 +0000\" stop=\"20250101130000 +0000\" channel=\"a\">"
        ));
        assert!(xml.contains("<title>News &amp; Weather</title>"));
    }

    #[test]
    fn test_empty_snapshot_is_valid_output() {
        let xml = render_guide(&Snapshot::default(), "guidegen");
        assert!(xml.contains("<tv generator-info-name=\"guidegen\">"));
        assert!(xml.contains("</tv>"));
        assert!(!xml.contains("<channel"));
    }

    #[test]
    fn test_emitted_guide_reparses_to_equal_instants() {
        let start = "20250101120000 +0100";
        let stop = "20250101130000 +0100";
        let xml = render_guide(
            &snapshot_with(vec![Channel::with_id("a")], vec![program("a", start, stop)]),
            "guidegen",
        );

        let doc = epg::parser::parse(&xml);
        assert_eq!(doc.programmes.len(), 1);
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 11, 30, 0).unwrap();
        let window = filter_window(&doc.programmes, now, Duration::hours(24));
        assert_eq!(window.programs.len(), 1);
        assert_eq!(window.programs[0].start, parse_xmltv_time(start).unwrap());
        assert_eq!(window.programs[0].stop, parse_xmltv_time(stop).unwrap());
    }
}
