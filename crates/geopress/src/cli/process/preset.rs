//! Built-in compression presets.

use clap::ValueEnum;
use geopress_core::{CompressionProfile, OutputFormat};

/// Named profile presets covering the common use cases.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Small files for web upload: quality 75, 1920x1280, 500 KB target
    Web,
    /// Archival quality: quality 90, 3840x2560, no byte target
    Storage,
    /// The default middle ground: quality 85, 2400x1600, 1.5 MB target
    Balanced,
}

impl Preset {
    pub fn profile(self) -> CompressionProfile {
        match self {
            Preset::Web => {
                CompressionProfile::new(75, 1920, 1280, Some(500 * 1024), OutputFormat::Jpeg)
            }
            Preset::Storage => CompressionProfile::new(90, 3840, 2560, None, OutputFormat::Jpeg),
            Preset::Balanced => {
                CompressionProfile::new(85, 2400, 1600, Some(1536 * 1024), OutputFormat::Jpeg)
            }
        }
    }
}
