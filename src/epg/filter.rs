//! Time-window filtering of raw guide entries
//!
//! The filter is a pure function of (programmes, now, horizon): it parses the
//! tolerant XMLTV timestamp format, drops records it cannot place on the
//! timeline, and keeps every program whose live interval intersects
//! [now, now + horizon). It can be invoked any number of times with
//! different horizons over the same parsed document.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};

use crate::epg::parser::RawProgramme;
use crate::models::Program;

/// Timestamp layout written and read by this pipeline: seconds precision
/// plus a numeric UTC offset, e.g. `20251116120000 +0000`.
const XMLTV_TIME_WITH_OFFSET: &str = "%Y%m%d%H%M%S %z";
const XMLTV_TIME_NAIVE: &str = "%Y%m%d%H%M%S";

/// Parse an XMLTV timestamp. A value without an explicit offset is read as
/// UTC - an assumption about the source feed's convention, not a documented
/// contract of the format.
pub fn parse_xmltv_time(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_str(value, XMLTV_TIME_WITH_OFFSET) {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(value, XMLTV_TIME_NAIVE)
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Format an instant in the same layout `parse_xmltv_time` accepts, so a
/// timestamp written by the guide emitter re-parses to an equal instant.
pub fn format_xmltv_time(instant: &DateTime<FixedOffset>) -> String {
    instant.format(XMLTV_TIME_WITH_OFFSET).to_string()
}

/// Result of one window filter pass
#[derive(Debug, Clone, Default)]
pub struct FilteredWindow {
    /// Kept programs, ordered by start ascending (stable per channel)
    pub programs: Vec<Program>,
    /// Records dropped for missing/unparseable timestamps, an inverted
    /// time range, or falling outside the window
    pub dropped: usize,
}

/// Keep every programme whose interval intersects [now, now + horizon).
///
/// A programme is kept iff `stop > now` and `start < now + horizon`:
/// partially-elapsed "currently live" programs stay in, a program stopping
/// exactly at `now` or starting exactly on the horizon boundary stays out.
pub fn filter_window(
    programmes: &[RawProgramme],
    now: DateTime<Utc>,
    horizon: Duration,
) -> FilteredWindow {
    let boundary = now + horizon;
    let mut window = FilteredWindow::default();

    for raw in programmes {
        let parsed = raw
            .start
            .as_deref()
            .and_then(parse_xmltv_time)
            .zip(raw.stop.as_deref().and_then(parse_xmltv_time));

        let (start, stop) = match parsed {
            Some(times) => times,
            None => {
                window.dropped += 1;
                continue;
            }
        };

        // Invalid range: dropped, not an error
        if stop <= start {
            window.dropped += 1;
            continue;
        }

        if stop.with_timezone(&Utc) > now && start.with_timezone(&Utc) < boundary {
            window.programs.push(Program {
                channel_id: raw.channel_id.clone(),
                start,
                stop,
                title: raw.title.clone(),
                description: raw.description.clone(),
            });
        } else {
            window.dropped += 1;
        }
    }

    // Stable sort: equal starts keep upstream order, and the per-channel
    // subsequences come out ordered by start ascending
    window.programs.sort_by_key(|p| p.start.with_timezone(&Utc));
    window
}
