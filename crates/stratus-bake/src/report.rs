use std::path::Path;

use stratus_core::output::format_elapsed;
use stratus_session::FrameTiming;

/// Wall time of one completed image.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameReport {
    /// Timeline frame, or None for a single bake.
    pub frame: Option<u32>,
    pub millis: f64,
    pub width: u32,
    pub height: u32,
    pub tile_count: u32,
}

/// Timing for a whole CLI run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimingReport {
    pub scene: String,
    pub mode: String,
    pub adapter: String,
    pub frames: Vec<FrameReport>,
    pub total_millis: f64,
}

impl TimingReport {
    pub fn from_timings(scene: &str, mode: &str, adapter: &str, timings: &[FrameTiming]) -> Self {
        let frames: Vec<FrameReport> = timings
            .iter()
            .map(|t| FrameReport {
                frame: t.frame,
                millis: t.elapsed.as_secs_f64() * 1000.0,
                width: t.width,
                height: t.height,
                tile_count: t.tile_count,
            })
            .collect();
        let total_millis = frames.iter().map(|f| f.millis).sum();
        Self {
            scene: scene.to_string(),
            mode: mode.to_string(),
            adapter: adapter.to_string(),
            frames,
            total_millis,
        }
    }

    pub fn mean_millis(&self) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }
        self.total_millis / self.frames.len() as f64
    }
}

/// Save a report as pretty JSON.
pub fn save_report(path: &Path, report: &TimingReport) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

/// Markdown table, one row per image.
pub fn format_markdown(report: &TimingReport) -> String {
    let mut out = String::new();
    out.push_str("| Frame | Size | Tiles | Time | ms |\n");
    out.push_str("|-------|------|-------|------|----|\n");

    for f in &report.frames {
        let frame = f.frame.map_or_else(|| "-".to_string(), |n| n.to_string());
        let elapsed = std::time::Duration::from_secs_f64(f.millis / 1000.0);
        out.push_str(&format!(
            "| {} | {}x{} | {} | {} | {:.1} |\n",
            frame,
            f.width,
            f.height,
            f.tile_count,
            format_elapsed(elapsed),
            f.millis,
        ));
    }

    out
}
