//! M3U playlist emitter
//!
//! One two-line entry per channel with a resolved stream, sorted by display
//! ordinal. A channel with no playable stream right now is silently omitted;
//! that is an expected steady-state condition, not an error. The header
//! carries the guide document's location so players can self-discover it.

use crate::models::Snapshot;

/// Render the playlist document
pub fn render_playlist(snapshot: &Snapshot, guide_location: &str) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str(&format!("#EXTM3U x-tvg-url=\"{guide_location}\"\n"));

    for channel in snapshot.channels_by_ordinal() {
        let stream_url = match &channel.stream_url {
            Some(url) => url,
            None => continue,
        };
        out.push_str(&format!(
            "#EXTINF:-1 tvg-id=\"{}\"{} group-title=\"{}\",{}\n",
            channel.id,
            channel
                .logo
                .as_deref()
                .map(|logo| format!(" tvg-logo=\"{logo}\""))
                .unwrap_or_default(),
            channel.group,
            channel.title
        ));
        out.push_str(stream_url);
        out.push('\n');
    }
    out
}
