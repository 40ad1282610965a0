//! What "done" means for each session mode.
//!
//! The controller runs the same tile loop for every mode and defers to these
//! hooks at three points: resources ready, tile sequence complete, cancel.

use std::time::Duration;

use stratus_core::error::StratusError;
use stratus_core::output::{format_elapsed, still_filename};
use stratus_core::params::BudgetVariant;
use stratus_core::settings::{OutputSettings, RenderSettings};

use crate::backend::ResourceRequest;
use crate::host::{SessionHost, TickSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    Bake,
    Animation,
    Viewport,
}

impl SessionMode {
    pub fn variant(self) -> BudgetVariant {
        match self {
            Self::Bake | Self::Animation => BudgetVariant::Render,
            Self::Viewport => BudgetVariant::Viewport,
        }
    }

    pub fn tick_source(self) -> TickSource {
        match self {
            Self::Bake | Self::Animation => TickSource::Timer,
            Self::Viewport => TickSource::Redraw,
        }
    }
}

/// Returned by the completion hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Release resources and stop.
    Finish,
    /// Reset the tile cursor and keep going.
    Continue,
}

/// A finished tile sequence handed to the completion hook.
#[derive(Debug)]
pub struct CompletedImage<'a> {
    pub pixels: &'a [f32],
    pub width: u32,
    pub height: u32,
    pub tile_count: u32,
    pub elapsed: Duration,
}

/// Wall time of one completed image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// Timeline frame, for animation sessions.
    pub frame: Option<u32>,
    pub elapsed: Duration,
    pub width: u32,
    pub height: u32,
    pub tile_count: u32,
}

#[derive(Debug, Clone)]
pub struct BakePolicy {
    pub output: OutputSettings,
}

#[derive(Debug, Clone)]
pub struct AnimationPolicy {
    pub output: OutputSettings,
    pub frame_start: u32,
    pub frame_end: u32,
    current_frame: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ViewportPolicy {
    passes: u64,
}

#[derive(Debug, Clone)]
pub enum SessionPolicy {
    Bake(BakePolicy),
    Animation(AnimationPolicy),
    Viewport(ViewportPolicy),
}

impl SessionPolicy {
    /// Fresh policy for `mode`, configured from the session's settings.
    pub fn new(mode: SessionMode, settings: &RenderSettings) -> Self {
        match mode {
            SessionMode::Bake => Self::bake(settings),
            SessionMode::Animation => Self::animation(settings),
            SessionMode::Viewport => Self::viewport(),
        }
    }

    pub fn bake(settings: &RenderSettings) -> Self {
        Self::Bake(BakePolicy {
            output: settings.output.clone(),
        })
    }

    pub fn animation(settings: &RenderSettings) -> Self {
        Self::Animation(AnimationPolicy {
            output: settings.output.clone(),
            frame_start: settings.frame_start,
            frame_end: settings.frame_end.max(settings.frame_start),
            current_frame: settings.frame_start,
        })
    }

    pub fn viewport() -> Self {
        Self::Viewport(ViewportPolicy::default())
    }

    pub fn mode(&self) -> SessionMode {
        match self {
            Self::Bake(_) => SessionMode::Bake,
            Self::Animation(_) => SessionMode::Animation,
            Self::Viewport(_) => SessionMode::Viewport,
        }
    }

    /// Checks that must pass before any resource is allocated.
    pub fn validate(&self) -> Result<(), StratusError> {
        // Only still-image encoders exist, for single bakes and frame sequences alike
        let output = match self {
            Self::Bake(p) => &p.output,
            Self::Animation(p) => &p.output,
            Self::Viewport(_) => return Ok(()),
        };
        if output.format.is_video_container() {
            return Err(StratusError::UnsupportedOutputFormat(
                output.format.to_string(),
            ));
        }
        Ok(())
    }

    pub fn resource_request(&self, settings: &RenderSettings) -> ResourceRequest {
        let mode = self.mode();
        let (size_multiplier, viewport_pixel_size) = match mode {
            SessionMode::Bake | SessionMode::Animation => (settings.render_size, None),
            SessionMode::Viewport => (settings.viewport_size, Some(settings.viewport_pixel_size)),
        };
        ResourceRequest {
            size_multiplier,
            tile_size: settings.tile_size,
            tiling: settings.tiling,
            variant: mode.variant(),
            viewport_pixel_size,
        }
    }

    /// Timeline frame the current tile sequence belongs to.
    pub fn current_frame(&self) -> Option<u32> {
        match self {
            Self::Animation(p) => Some(p.current_frame),
            _ => None,
        }
    }

    pub fn on_resources_ready(&mut self, host: &mut dyn SessionHost) {
        if let Self::Animation(p) = self {
            p.current_frame = p.frame_start;
            host.set_frame(p.current_frame);
            log::info!(
                "Animation: frames {}..={} ({} frames)",
                p.frame_start,
                p.frame_end,
                (p.frame_end - p.frame_start).saturating_add(1)
            );
        }
    }

    pub fn on_tile_sequence_complete(
        &mut self,
        image: &CompletedImage<'_>,
        host: &mut dyn SessionHost,
    ) -> Result<Completion, StratusError> {
        host.display(image.pixels, image.width, image.height);
        match self {
            Self::Bake(p) => {
                let path = still_filename(&p.output.basename, p.output.format);
                host.encode(image.pixels, image.width, image.height, &path, p.output.format)?;
                let message = format!("Stratus time: {}", format_elapsed(image.elapsed));
                log::info!("{message}");
                host.report(&message);
                Ok(Completion::Finish)
            }
            Self::Animation(p) => {
                host.render_still(p.current_frame)?;
                log::info!(
                    "Frame {} done in {}",
                    p.current_frame,
                    format_elapsed(image.elapsed)
                );
                if p.current_frame >= p.frame_end {
                    host.report(&format!(
                        "Stratus: rendered frames {}..={}",
                        p.frame_start, p.frame_end
                    ));
                    return Ok(Completion::Finish);
                }
                p.current_frame += 1;
                host.set_frame(p.current_frame);
                Ok(Completion::Continue)
            }
            Self::Viewport(p) => {
                p.passes += 1;
                log::debug!("Viewport pass {} complete", p.passes);
                host.refresh_viewport();
                Ok(Completion::Continue)
            }
        }
    }

    pub fn on_cancel(&mut self, host: &mut dyn SessionHost) {
        match self {
            Self::Bake(_) => host.report("Stratus: bake cancelled"),
            Self::Animation(p) => {
                host.report(&format!("Stratus: animation cancelled at frame {}", p.current_frame))
            }
            Self::Viewport(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::output::OutputFormat;

    #[test]
    fn test_video_container_rejected_for_file_output() {
        let mut settings = RenderSettings::default();
        settings.output.format = OutputFormat::Matroska;
        for policy in [
            SessionPolicy::animation(&settings),
            SessionPolicy::bake(&settings),
        ] {
            assert!(matches!(
                policy.validate(),
                Err(StratusError::UnsupportedOutputFormat(_))
            ));
        }
        // The preview never writes files
        assert!(SessionPolicy::viewport().validate().is_ok());

        settings.output.format = OutputFormat::RadianceHdr;
        assert!(SessionPolicy::bake(&settings).validate().is_ok());
        assert!(SessionPolicy::animation(&settings).validate().is_ok());
    }

    #[test]
    fn test_resource_request_per_mode() {
        let settings = RenderSettings::default();
        let bake = SessionPolicy::bake(&settings).resource_request(&settings);
        assert_eq!(bake.size_multiplier, settings.render_size);
        assert_eq!(bake.variant, BudgetVariant::Render);
        assert_eq!(bake.viewport_pixel_size, None);

        let view = SessionPolicy::viewport().resource_request(&settings);
        assert_eq!(view.size_multiplier, settings.viewport_size);
        assert_eq!(view.variant, BudgetVariant::Viewport);
        assert_eq!(view.viewport_pixel_size, Some(4));
    }
}
