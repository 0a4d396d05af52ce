//! Error taxonomy for the generator pipeline
//!
//! `Record` failures are always recovered locally - the offending record is
//! dropped and counted, never surfaced as an Err past the stage that saw it.
//! `Fetch`/`Decode` on the primary catalog source abort a market run;
//! on a secondary source they degrade to an empty document with a warning.
//! `Write` is reported per artifact without blocking the remaining ones.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    /// Network failure, timeout, non-2xx status or decompression failure
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Payload fetched but not parseable as the expected structured format
    #[error("decode failed for {url}: {reason}")]
    Decode { url: String, reason: String },

    /// Individual entity missing a required field or with an invalid
    /// time range
    #[error("invalid record: {0}")]
    Record(String),

    /// Artifact could not be persisted
    #[error("write failed for {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl GenError {
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GenError>;
