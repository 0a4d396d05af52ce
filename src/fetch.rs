//! Source adapter
//!
//! Fetches the upstream catalog, category and guide documents and resolves
//! per-channel stream locations. Every request runs against a shared agent
//! with explicit connect/read timeouts. Callers get typed results: a fetch
//! or decode failure is distinguishable from a source that legitimately
//! returned zero entries.

use flate2::read::GzDecoder;
use serde_json::{json, Value};
use std::io::Read;
use std::time::Duration;
use tracing::debug;

use crate::config::{expand_template, Market, SourceConfig};
use crate::epg::parser::{self, GuideDoc};
use crate::error::{GenError, Result};
use crate::models::{Channel, ChannelSet};

pub struct SourceClient {
    agent: ureq::Agent,
    source: SourceConfig,
}

impl SourceClient {
    pub fn new(source: SourceConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(source.read_timeout_secs)))
            .timeout_connect(Some(Duration::from_secs(source.connect_timeout_secs)))
            .build()
            .new_agent();
        Self { agent, source }
    }

    /// Fetch the primary catalog document. The caller treats a failure here
    /// as fatal to the market run.
    pub fn fetch_catalog(&self, market: &Market) -> Result<Value> {
        self.get_json(&expand_template(&self.source.catalog_url, market))
    }

    /// Fetch the standalone category document, when configured
    pub fn fetch_categories(&self, market: &Market) -> Option<Result<Value>> {
        let template = self.source.categories_url.as_ref()?;
        Some(self.get_json(&expand_template(template, market)))
    }

    /// Fetch and parse the guide feed, when configured. The payload may be
    /// gzip-compressed on the wire; compression is detected by the payload's
    /// magic bytes, not the URL.
    pub fn fetch_guide(&self, market: &Market) -> Option<Result<GuideDoc>> {
        let template = self.source.guide_url.as_ref()?;
        let url = expand_template(template, market);
        Some(self.get_guide(&url))
    }

    fn get_guide(&self, url: &str) -> Result<GuideDoc> {
        let bytes = self.get_bytes(url)?;
        let bytes = if is_gzip(&bytes) {
            gunzip(&bytes).map_err(|e| GenError::fetch(url, format!("gunzip: {e}")))?
        } else {
            bytes
        };

        let doc = parser::parse_reader(bytes.as_slice());
        // A feed that produced nothing but errors was not XMLTV at all
        if doc.channels.is_empty() && doc.programmes.is_empty() && doc.parse_errors > 0 {
            return Err(GenError::decode(url, "payload is not an XMLTV document"));
        }
        Ok(doc)
    }

    /// Resolve the playable stream for one channel. Failure is the expected
    /// steady state for some channels and yields None, never an error.
    pub fn resolve_stream(&self, market: &Market, channel: &Channel) -> Option<String> {
        let template = self.source.streams_url.as_ref()?;
        let url = expand_template(template, market);

        let body = json!({
            "audio_language": channel.languages.first().cloned().unwrap_or_else(|| "MIS".to_string()),
            "audio_quality": "2.0",
            "classification_id": market.classification_id,
            "content_id": channel.id.clone(),
            "content_type": "live_channels",
            "player": "web:HLS-NONE:NONE",
            "subtitle_language": "MIS",
            "video_type": "stream"
        })
        .to_string();

        let mut request = self
            .agent
            .post(&url)
            .header("User-Agent", &self.source.user_agent)
            .header("Content-Type", "application/json");
        if let Some(origin) = &self.source.origin {
            request = request.header("Origin", origin);
        }
        if let Some(referer) = &self.source.referer {
            request = request.header("Referer", referer);
        }

        let mut response = match request.send(body.as_str()) {
            Ok(response) => response,
            Err(e) => {
                debug!("no stream for {}: {e}", channel.id);
                return None;
            }
        };
        let payload: Value = response
            .body_mut()
            .read_to_string()
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())?;

        extract_stream_url(&payload).map(|url| trim_after_manifest(&url))
    }

    /// Fill `stream_url` for every channel that lacks one; returns how many
    /// got resolved
    pub fn resolve_streams(&self, market: &Market, channels: &mut ChannelSet) -> usize {
        let mut resolved = 0;
        for channel in channels.values_mut() {
            if channel.stream_url.is_some() {
                continue;
            }
            if let Some(url) = self.resolve_stream(market, channel) {
                channel.stream_url = Some(url);
                resolved += 1;
            }
        }
        resolved
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        let text = self.get_text(url)?;
        serde_json::from_str(&text).map_err(|e| GenError::decode(url, e))
    }

    fn get_text(&self, url: &str) -> Result<String> {
        let mut response = self.get(url)?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| GenError::fetch(url, e))
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url)?;
        let mut bytes = Vec::new();
        response
            .into_body()
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| GenError::fetch(url, e))?;
        Ok(bytes)
    }

    fn get(&self, url: &str) -> Result<ureq::http::Response<ureq::Body>> {
        let mut request = self
            .agent
            .get(url)
            .header("User-Agent", &self.source.user_agent);
        if let Some(origin) = &self.source.origin {
            request = request.header("Origin", origin);
        }
        if let Some(referer) = &self.source.referer {
            request = request.header("Referer", referer);
        }

        let response = request.call().map_err(|e| GenError::fetch(url, e))?;
        if response.status() != 200 {
            return Err(GenError::fetch(url, format!("HTTP {}", response.status())));
        }
        Ok(response)
    }
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Stream reply shape: `data.stream_infos[0].url`, every level optional
fn extract_stream_url(payload: &Value) -> Option<String> {
    let url = payload
        .get("data")?
        .get("stream_infos")?
        .as_array()?
        .first()?
        .get("url")?
        .as_str()?;
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

/// Everything past the HLS manifest path is session-specific; keep the URL
/// up to and including its `.m3u8` segment
fn trim_after_manifest(url: &str) -> String {
    match url.find(".m3u8") {
        Some(pos) => url[..pos + ".m3u8".len()].to_string(),
        None => url.to_string(),
    }
}
