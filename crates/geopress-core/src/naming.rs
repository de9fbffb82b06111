//! Export naming policies for processed artifacts.
//!
//! Pure string transformation with no dependency on pipeline state; the
//! UI/CLI layer applies a policy when it exports compressed files.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Suffix inserted before the extension by the suffix-style policies.
pub const COMPRESSED_SUFFIX: &str = "_compressed";

/// How an exported artifact is named relative to its original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamingPolicy {
    /// Original name unchanged
    Original,
    /// `photo.jpg` -> `photo_compressed.jpg`
    Suffix,
    /// `photo.jpg` -> `compressed_photo.jpg`
    Prefix,
    /// `photo.jpg` -> `compressed/photo.jpg`
    Folder,
    /// `photo.jpg` -> `../photo_compressed.jpg`
    ParentFolder,
}

impl FromStr for NamingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "original" => Ok(NamingPolicy::Original),
            "suffix" => Ok(NamingPolicy::Suffix),
            "prefix" => Ok(NamingPolicy::Prefix),
            "folder" => Ok(NamingPolicy::Folder),
            "parent-folder" | "parent_folder" => Ok(NamingPolicy::ParentFolder),
            other => Err(format!("unknown naming policy: {other}")),
        }
    }
}

/// Apply a naming policy to an original filename.
pub fn export_name(original: &str, policy: NamingPolicy) -> String {
    let (stem, ext) = split_extension(original);
    match policy {
        NamingPolicy::Original => original.to_string(),
        NamingPolicy::Suffix => format!("{stem}{COMPRESSED_SUFFIX}{ext}"),
        NamingPolicy::Prefix => format!("compressed_{original}"),
        NamingPolicy::Folder => format!("compressed/{original}"),
        NamingPolicy::ParentFolder => format!("../{stem}{COMPRESSED_SUFFIX}{ext}"),
    }
}

/// Split a filename at the last dot. The extension keeps its dot; a name
/// without one yields an empty extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => (&name[..idx], &name[idx..]),
        None => (name, ""),
    }
}
