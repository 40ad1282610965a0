//! Output formats and file naming for baked environment images.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// File formats the host may select for committed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    OpenExrMultilayer,
    OpenExr,
    RadianceHdr,
    /// Video containers. Accepted by the configuration surface but never
    /// valid for frame-indexed stills.
    Mp4,
    Matroska,
    Avi,
}

impl OutputFormat {
    pub fn is_video_container(self) -> bool {
        matches!(self, Self::Mp4 | Self::Matroska | Self::Avi)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::OpenExrMultilayer | Self::OpenExr => "exr",
            Self::RadianceHdr => "hdr",
            Self::Mp4 => "mp4",
            Self::Matroska => "mkv",
            Self::Avi => "avi",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenExrMultilayer => "OpenEXR multilayer",
            Self::OpenExr => "OpenEXR",
            Self::RadianceHdr => "Radiance HDR",
            Self::Mp4 => "MPEG-4",
            Self::Matroska => "Matroska",
            Self::Avi => "AVI",
        };
        f.write_str(name)
    }
}

/// `{basename}.{ext}` for a single bake.
pub fn still_filename(basename: &str, format: OutputFormat) -> String {
    format!("{basename}.{}", format.extension())
}

/// `{basename}{frame:04}.{ext}` for one frame of a sequence.
pub fn frame_filename(basename: &str, frame: u32, format: OutputFormat) -> String {
    format!("{basename}{frame:04}.{}", format.extension())
}

/// Wall time as `mm:ss.ss`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let s = elapsed.as_secs_f64();
    format!("{:02.0}:{:05.2}", (s % 3600.0 / 60.0).floor(), s % 60.0)
}
