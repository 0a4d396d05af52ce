//! EPG (Electronic Program Guide) module
//!
//! Contains the streaming XMLTV reader and the time-window filter.

pub mod filter;
pub mod parser;

pub use filter::{filter_window, format_xmltv_time, parse_xmltv_time, FilteredWindow};
pub use parser::{GuideChannel, GuideDoc, RawProgramme};
