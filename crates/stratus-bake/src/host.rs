//! Headless host: a plain loop for ticks and image files for output.

use std::path::Path;

use stratus_core::error::StratusError;
use stratus_core::output::{frame_filename, OutputFormat};
use stratus_core::settings::OutputSettings;
use stratus_session::{FrameScheduler, SessionHost, TickHandle, TickSource};

/// Keeps the single subscription of the session it drives.
#[derive(Debug, Default)]
pub struct LoopScheduler {
    next: u64,
    active: Option<TickHandle>,
}

impl LoopScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a session still wants ticks.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

impl FrameScheduler for LoopScheduler {
    fn register(&mut self, source: TickSource) -> TickHandle {
        self.next += 1;
        let handle = TickHandle(self.next);
        log::debug!("Tick subscription {:?} ({:?})", handle, source);
        self.active = Some(handle);
        handle
    }

    fn unregister(&mut self, handle: TickHandle) {
        if self.active == Some(handle) {
            self.active = None;
        }
    }
}

/// Writes committed images to disk and messages to stdout.
pub struct CliHost {
    output: OutputSettings,
    /// Last committed image, encoded again per animation frame.
    last_image: Option<(Vec<f32>, u32, u32)>,
    current_frame: Option<u32>,
    written: Vec<String>,
}

impl CliHost {
    pub fn new(output: OutputSettings) -> Self {
        Self {
            output,
            last_image: None,
            current_frame: None,
            written: Vec::new(),
        }
    }

    /// Paths of every file written so far.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    pub fn current_frame(&self) -> Option<u32> {
        self.current_frame
    }
}

impl SessionHost for CliHost {
    fn display(&mut self, pixels: &[f32], width: u32, height: u32) {
        self.last_image = Some((pixels.to_vec(), width, height));
    }

    fn encode(
        &mut self,
        pixels: &[f32],
        width: u32,
        height: u32,
        path: &str,
        format: OutputFormat,
    ) -> Result<(), StratusError> {
        write_image(pixels, width, height, Path::new(path), format)?;
        log::info!("Wrote {} ({}x{}, {})", path, width, height, format);
        self.written.push(path.to_string());
        Ok(())
    }

    fn set_frame(&mut self, frame: u32) {
        self.current_frame = Some(frame);
    }

    fn render_still(&mut self, frame: u32) -> Result<(), StratusError> {
        let Some((pixels, width, height)) = self.last_image.take() else {
            return Err(StratusError::EncodeFailed(format!(
                "no committed image for frame {frame}"
            )));
        };
        let path = frame_filename(&self.output.basename, frame, self.output.format);
        let result = self.encode(&pixels, width, height, &path, self.output.format);
        self.last_image = Some((pixels, width, height));
        result
    }

    fn refresh_viewport(&mut self) {}

    fn report(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Encode RGBA f32 pixels, top row first, as EXR or Radiance HDR.
pub fn write_image(
    pixels: &[f32],
    width: u32,
    height: u32,
    path: &Path,
    format: OutputFormat,
) -> Result<(), StratusError> {
    let buffer = image::Rgba32FImage::from_raw(width, height, pixels.to_vec()).ok_or_else(|| {
        StratusError::EncodeFailed(format!(
            "{} floats do not fill a {}x{} RGBA image",
            pixels.len(),
            width,
            height
        ))
    })?;
    let rgba = image::DynamicImage::ImageRgba32F(buffer);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StratusError::EncodeFailed(e.to_string()))?;
    }

    let result = match format {
        // Single-layer EXR; the combined pass is the only layer this renderer produces.
        OutputFormat::OpenExr | OutputFormat::OpenExrMultilayer => {
            rgba.save_with_format(path, image::ImageFormat::OpenExr)
        }
        // Radiance HDR has no alpha channel
        OutputFormat::RadianceHdr => image::DynamicImage::ImageRgb32F(rgba.to_rgb32f())
            .save_with_format(path, image::ImageFormat::Hdr),
        OutputFormat::Mp4 | OutputFormat::Matroska | OutputFormat::Avi => {
            return Err(StratusError::UnsupportedOutputFormat(format.to_string()));
        }
    };
    result.map_err(|e| StratusError::EncodeFailed(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("stratus-bake-{}", std::process::id()))
            .join(name)
    }

    fn gradient(width: u32, height: u32) -> Vec<f32> {
        (0..width * height)
            .flat_map(|i| [i as f32 * 0.5, 2.0, 0.25, 1.0])
            .collect()
    }

    #[test]
    fn test_scheduler_tracks_single_subscription() {
        let mut scheduler = LoopScheduler::new();
        assert!(!scheduler.is_active());
        let first = scheduler.register(TickSource::Timer);
        assert!(scheduler.is_active());
        // A stale handle does not drop the live one
        let second = scheduler.register(TickSource::Timer);
        scheduler.unregister(first);
        assert!(scheduler.is_active());
        scheduler.unregister(second);
        assert!(!scheduler.is_active());
    }

    #[test]
    fn test_exr_keeps_values_above_one() {
        let path = temp_path("gradient.exr");
        let pixels = gradient(8, 4);
        write_image(&pixels, 8, 4, &path, OutputFormat::OpenExr).expect("write exr");

        let decoded = image::open(&path).expect("read exr").to_rgba32f();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.get_pixel(5, 0).0, [2.5, 2.0, 0.25, 1.0]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_hdr_written_without_alpha() {
        let path = temp_path("gradient.hdr");
        write_image(&gradient(4, 2), 4, 2, &path, OutputFormat::RadianceHdr).expect("write hdr");
        let decoded = image::open(&path).expect("read hdr");
        assert_eq!((decoded.width(), decoded.height()), (4, 2));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_wrong_pixel_count_rejected() {
        let path = temp_path("short.exr");
        let result = write_image(&[0.0; 7], 2, 2, &path, OutputFormat::OpenExr);
        assert!(matches!(result, Err(StratusError::EncodeFailed(_))));
    }

    #[test]
    fn test_render_still_uses_frame_name() {
        let basename = temp_path("anim_").display().to_string();
        let mut host = CliHost::new(OutputSettings {
            format: OutputFormat::OpenExr,
            basename: basename.clone(),
        });
        assert!(host.render_still(1).is_err());

        host.display(&gradient(4, 2), 4, 2);
        host.set_frame(3);
        host.render_still(3).expect("frame 3");
        host.render_still(4).expect("frame 4");
        assert_eq!(
            host.written(),
            &[format!("{basename}0003.exr"), format!("{basename}0004.exr")]
        );
        assert_eq!(host.current_frame(), Some(3));
        for path in host.written() {
            let _ = std::fs::remove_file(path);
        }
    }
}
