//! Streaming XMLTV reader
//!
//! Parses a guide feed into channel declarations and raw programme entries.
//! Timestamps stay as the strings the feed carried; placing them on the
//! timeline is the window filter's job. Malformed elements are skipped and
//! counted, never fatal - a guide with some unparsable entries beats no
//! guide at all.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::io::BufRead;

/// Channel declaration from the guide feed
#[derive(Debug, Clone)]
pub struct GuideChannel {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
}

/// One programme entry exactly as the feed declared it
#[derive(Debug, Clone, PartialEq)]
pub struct RawProgramme {
    pub channel_id: String,
    pub start: Option<String>,
    pub stop: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Parsed guide document
#[derive(Debug, Clone, Default)]
pub struct GuideDoc {
    /// Channel declarations indexed by id
    pub channels: HashMap<String, GuideChannel>,
    /// Programme entries in feed order
    pub programmes: Vec<RawProgramme>,
    /// Count of XML errors and skipped elements
    pub parse_errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Root,
    Channel,
    Programme,
    Title,
    Desc,
    DisplayName,
}

/// Parse a guide document from an XMLTV string
pub fn parse(xml: &str) -> GuideDoc {
    parse_reader(xml.as_bytes())
}

/// Parse a guide document from a reader - streaming, tolerates large feeds
pub fn parse_reader<R: BufRead>(reader: R) -> GuideDoc {
    let mut xml_reader = Reader::from_reader(reader);
    xml_reader.config_mut().trim_text(true);

    let mut doc = GuideDoc::default();
    let mut buf = Vec::with_capacity(8192);

    let mut state = ParserState::Root;
    let mut current_channel: Option<GuideChannel> = None;
    let mut current_programme: Option<RawProgramme> = None;
    let mut text_buf = String::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.name().as_ref() {
                    b"channel" => {
                        state = ParserState::Channel;
                        let id = get_attribute(e, b"id").unwrap_or_default();
                        current_channel = Some(GuideChannel {
                            id,
                            name: String::new(),
                            icon: None,
                        });
                    }
                    b"programme" => {
                        state = ParserState::Programme;
                        current_programme = Some(RawProgramme {
                            channel_id: get_attribute(e, b"channel").unwrap_or_default(),
                            start: get_attribute(e, b"start"),
                            stop: get_attribute(e, b"stop"),
                            title: None,
                            description: None,
                        });
                    }
                    b"title" if state == ParserState::Programme => {
                        state = ParserState::Title;
                        text_buf.clear();
                    }
                    b"desc" if state == ParserState::Programme => {
                        state = ParserState::Desc;
                        text_buf.clear();
                    }
                    b"display-name" if state == ParserState::Channel => {
                        state = ParserState::DisplayName;
                        text_buf.clear();
                    }
                    b"icon" if state == ParserState::Channel => {
                        if let Some(src) = get_attribute(e, b"src") {
                            if let Some(ref mut chan) = current_channel {
                                chan.icon = Some(src);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(e.as_ref()).to_string();
                match state {
                    ParserState::Title | ParserState::Desc | ParserState::DisplayName => {
                        text_buf.push_str(&decode_xml_entities(&raw));
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                match e.name().as_ref() {
                    b"channel" => {
                        if let Some(channel) = current_channel.take() {
                            if channel.id.is_empty() {
                                doc.parse_errors += 1;
                            } else {
                                doc.channels.insert(channel.id.clone(), channel);
                            }
                        }
                        state = ParserState::Root;
                    }
                    b"programme" => {
                        if let Some(programme) = current_programme.take() {
                            if programme.channel_id.is_empty() {
                                doc.parse_errors += 1;
                            } else {
                                doc.programmes.push(programme);
                            }
                        }
                        state = ParserState::Root;
                    }
                    b"title" => {
                        if let Some(ref mut prog) = current_programme {
                            let title = text_buf.trim().to_string();
                            if !title.is_empty() {
                                prog.title = Some(title);
                            }
                        }
                        state = ParserState::Programme;
                    }
                    b"desc" => {
                        if let Some(ref mut prog) = current_programme {
                            let desc = text_buf.trim().to_string();
                            if !desc.is_empty() {
                                prog.description = Some(desc);
                            }
                        }
                        state = ParserState::Programme;
                    }
                    b"display-name" => {
                        if let Some(ref mut chan) = current_channel {
                            if chan.name.is_empty() {
                                chan.name = text_buf.trim().to_string();
                            }
                        }
                        state = ParserState::Channel;
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => {
                // Skip the malformed element and resume at the root
                doc.parse_errors += 1;
                current_channel = None;
                current_programme = None;
                state = ParserState::Root;
                text_buf.clear();
            }
            _ => {}
        }
        buf.clear();
    }

    doc
}

fn get_attribute(e: &quick_xml::events::BytesStart, name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name {
            let raw = String::from_utf8(attr.value.as_ref().to_vec()).ok()?;
            return Some(decode_xml_entities(&raw));
        }
    }
    None
}

/// Decode the entities the reader leaves in text and attribute content
fn decode_xml_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channels_and_programmes() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="bbc1">
    <display-name>BBC One</display-name>
    <icon src="http://example.com/bbc1.png"/>
  </channel>
  <programme start="20240115120000 +0000" stop="20240115130000 +0000" channel="bbc1">
    <title>News at Noon</title>
    <desc>Daily news broadcast</desc>
  </programme>
</tv>"#;

        let doc = parse(xml);
        assert_eq!(doc.channels.len(), 1);
        let channel = doc.channels.get("bbc1").unwrap();
        assert_eq!(channel.name, "BBC One");
        assert_eq!(channel.icon.as_deref(), Some("http://example.com/bbc1.png"));

        assert_eq!(doc.programmes.len(), 1);
        let prog = &doc.programmes[0];
        assert_eq!(prog.channel_id, "bbc1");
        assert_eq!(prog.start.as_deref(), Some("20240115120000 +0000"));
        assert_eq!(prog.title.as_deref(), Some("News at Noon"));
        assert_eq!(prog.description.as_deref(), Some("Daily news broadcast"));
    }

    #[test]
    fn test_programme_without_timestamps_is_kept_raw() {
        let xml = r#"<tv>
  <programme channel="ch1"><title>Untimed</title></programme>
</tv>"#;
        let doc = parse(xml);
        assert_eq!(doc.programmes.len(), 1);
        assert!(doc.programmes[0].start.is_none());
        assert!(doc.programmes[0].stop.is_none());
    }

    #[test]
    fn test_programme_without_channel_is_counted() {
        let xml = r#"<tv>
  <programme start="20240115120000 +0000" stop="20240115130000 +0000"><title>Orphan</title></programme>
  <programme start="20240115120000 +0000" stop="20240115130000 +0000" channel="ch1"><title>Kept</title></programme>
</tv>"#;
        let doc = parse(xml);
        assert_eq!(doc.programmes.len(), 1);
        assert_eq!(doc.parse_errors, 1);
    }

    #[test]
    fn test_entities_are_decoded() {
        let xml = r#"<tv>
  <channel id="a&amp;e"><display-name>A &amp; E</display-name></channel>
</tv>"#;
        let doc = parse(xml);
        let channel = doc.channels.get("a&e").unwrap();
        assert_eq!(channel.name, "A & E");
    }

    #[test]
    fn test_empty_document_yields_empty_doc() {
        let doc = parse("<tv></tv>");
        assert!(doc.channels.is_empty());
        assert!(doc.programmes.is_empty());
        assert_eq!(doc.parse_errors, 0);
    }
}
