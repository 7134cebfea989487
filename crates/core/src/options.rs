//! Projection of a job's resolved configuration for the factory.
//!
//! Every key is always present. Unset integers become `0`, unset strings
//! become `""`.

use serde::Serialize;

use crate::matching::Requirements;

/// The `options` map returned with a successful poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobOptions {
    /// Browser family, with ` major` and `.minor` appended when requested.
    pub browser: String,
    pub width: i32,
    pub bpp: i32,
    pub js: String,
    pub java: String,
    pub flash: String,
    pub media: String,
}

impl JobOptions {
    pub fn project(req: &Requirements) -> Self {
        Self {
            browser: browser_string(&req.browser_group, req.major, req.minor),
            width: req.width.unwrap_or(0),
            bpp: req.bits_per_pixel.unwrap_or(0),
            js: req.javascript.clone().unwrap_or_default(),
            java: req.java.clone().unwrap_or_default(),
            flash: req.flash.clone().unwrap_or_default(),
            media: req.media.clone().unwrap_or_default(),
        }
    }
}

/// Human-readable browser with optional version, e.g. `Firefox 2.0`.
///
/// A minor version without a major version is ignored.
pub fn browser_string(browser_group: &str, major: Option<i32>, minor: Option<i32>) -> String {
    let mut result = browser_group.to_string();
    if let Some(major) = major {
        result.push_str(&format!(" {major}"));
        if let Some(minor) = minor {
            result.push_str(&format!(".{minor}"));
        }
    }
    result
}
