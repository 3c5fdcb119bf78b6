//! Asset file name parsing.
//!
//! `icon@2x.ios.png` → name `icon`, resolution 2, platform `ios`, type `png`.
//! The scale suffix and platform suffix are both optional.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::platform::platform_extension;

/// Parsed pieces of an asset file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetName {
    /// Base name without scale, platform or extension.
    pub name: String,
    /// `name.type`, the key scale variants share.
    pub asset_name: String,
    pub resolution: f32,
    pub platform: Option<String>,
    #[serde(rename = "type")]
    pub asset_type: String,
}

impl AssetName {
    pub fn parse<S: AsRef<str>>(path: &Path, platforms: &[S]) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let asset_type = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let platform = platform_extension(path, platforms).map(str::to_string);

        let ext = if asset_type.is_empty() {
            String::new()
        } else {
            format!(".{asset_type}")
        };
        let platform_suffix = platform
            .as_deref()
            .map(|p| format!(r"(?:\.{})?", regex::escape(p)))
            .unwrap_or_default();
        let scale = Regex::new(&format!(
            r"@([\d.]+)x{}{}$",
            platform_suffix,
            regex::escape(&ext)
        ))
        .ok();

        let captures = scale.as_ref().and_then(|re| re.captures(&file_name));
        let resolution = captures
            .as_ref()
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f32>().ok())
            .unwrap_or(1.0);

        let stem = match (&captures, &platform) {
            (Some(c), _) => c
                .get(0)
                .map(|m| &file_name[..m.start()])
                .unwrap_or(&file_name),
            (None, Some(p)) => file_name
                .strip_suffix(&format!(".{p}{ext}"))
                .unwrap_or(&file_name),
            (None, None) => file_name.strip_suffix(&ext).unwrap_or(&file_name),
        }
        .to_string();

        Self {
            asset_name: format!("{stem}{ext}"),
            name: stem,
            resolution,
            platform,
            asset_type,
        }
    }
}
