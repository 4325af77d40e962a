use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

// Literal pattern, so compiling it cannot fail.
static VIDEO_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]v=([^&#]+)").expect("video parameter pattern is valid"));

/// Canonical video identifier pulled out of a watch URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extract the `v=` query parameter from a video reference.
///
/// Partial or malformed input is a normal "no match", not an error.
pub fn extract_video_id(raw: &str) -> Option<VideoId> {
    VIDEO_PARAM
        .captures(raw.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| VideoId(m.as_str().to_string()))
}
