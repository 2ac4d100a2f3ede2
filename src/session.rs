//! Interactive refinement of a portrait crop.
//!
//! A [`RefinementSession`] is a small state machine:
//!
//! ```text
//! Idle --start--> Previewing <--adjust--> Adjusted
//!                     |                      |
//!                     +--commit / cancel-----+--> Committed | Cancelled
//! ```
//!
//! Commands come from any input source (keyboard, HTTP, tests) as
//! [`AdjustCommand`] values. The scale multiplier is derived from an integer
//! step count on every change, so `+` then `-` returns exactly to 1.0 and
//! replaying a command sequence always gives the same transform.

use std::str::FromStr;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compose::{render, Rendered};
use crate::config::BiometricConfig;
use crate::encode::{fit, EncodedArtifact, JpegQualityEncoder, QualityEncoder, QualitySearch};
use crate::error::{Error, Result};
use crate::landmarks::LandmarkSet;
use crate::transform::CropTransform;
use crate::types::ImageSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Previewing,
    Adjusted,
    Committed,
    Cancelled,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Previewing => "previewing",
            SessionState::Adjusted => "adjusted",
            SessionState::Committed => "committed",
            SessionState::Cancelled => "cancelled",
        }
    }

    fn is_live(&self) -> bool {
        matches!(self, SessionState::Previewing | SessionState::Adjusted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjustCommand {
    ScaleUp,
    ScaleDown,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    RotateLeft,
    RotateRight,
}

impl FromStr for AdjustCommand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "+" | "scale-up" => Ok(AdjustCommand::ScaleUp),
            "-" | "scale-down" => Ok(AdjustCommand::ScaleDown),
            "left" | "h" => Ok(AdjustCommand::MoveLeft),
            "right" | "l" => Ok(AdjustCommand::MoveRight),
            "up" | "k" => Ok(AdjustCommand::MoveUp),
            "down" | "j" => Ok(AdjustCommand::MoveDown),
            "rl" | "rotate-left" => Ok(AdjustCommand::RotateLeft),
            "rr" | "rotate-right" => Ok(AdjustCommand::RotateRight),
            other => Err(format!("unknown adjustment '{other}'")),
        }
    }
}

/// Accumulated manual adjustments, kept as step counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Steps {
    scale: i32,
    x: i32,
    y: i32,
    rotation: i32,
}

impl Steps {
    fn apply(&mut self, command: AdjustCommand) {
        // Moves shift the face inside the frame, so the crop window goes the other way.
        match command {
            AdjustCommand::ScaleUp => self.scale += 1,
            AdjustCommand::ScaleDown => self.scale -= 1,
            AdjustCommand::MoveLeft => self.x += 1,
            AdjustCommand::MoveRight => self.x -= 1,
            AdjustCommand::MoveUp => self.y += 1,
            AdjustCommand::MoveDown => self.y -= 1,
            AdjustCommand::RotateLeft => self.rotation -= 1,
            AdjustCommand::RotateRight => self.rotation += 1,
        }
    }
}

/// The image being refined and the latest preview.
struct Loaded {
    image: RgbImage,
    landmarks: LandmarkSet,
    base_rotation: f32,
    steps: Steps,
    preview: Rendered,
}

pub struct RefinementSession {
    config: BiometricConfig,
    target: ImageSize,
    max_bytes: usize,
    state: SessionState,
    loaded: Option<Loaded>,
}

impl RefinementSession {
    pub fn new(config: BiometricConfig, target: ImageSize, max_bytes: usize) -> Self {
        Self {
            config,
            target,
            max_bytes,
            state: SessionState::Idle,
            loaded: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Load an image and show the automatic placement.
    pub fn start(&mut self, image: RgbImage, landmarks: LandmarkSet) -> Result<&Rendered> {
        self.start_with_rotation(image, landmarks, 0.0)
    }

    /// Like [`start`](Self::start), with an initial rotation (e.g. from auto-leveling)
    /// that manual rotation steps are added to.
    pub fn start_with_rotation(
        &mut self,
        image: RgbImage,
        landmarks: LandmarkSet,
        base_rotation: f32,
    ) -> Result<&Rendered> {
        self.require(self.state == SessionState::Idle, "start")?;

        let steps = Steps::default();
        let transform = self.transform_for(base_rotation, steps);
        let preview = render(
            &image,
            &landmarks,
            self.target,
            &self.config.biometric_checks,
            &transform,
        )?;
        info!(target = %self.target, "refinement session started");

        self.state = SessionState::Previewing;
        let loaded = self.loaded.insert(Loaded {
            image,
            landmarks,
            base_rotation,
            steps,
            preview,
        });
        Ok(&loaded.preview)
    }

    /// Apply one command and recompute the preview.
    pub fn adjust(&mut self, command: AdjustCommand) -> Result<&Rendered> {
        self.require(self.state.is_live(), "adjust")?;
        let (base_rotation, mut steps) = match &self.loaded {
            Some(loaded) => (loaded.base_rotation, loaded.steps),
            None => return Err(self.usage("adjust")),
        };

        steps.apply(command);
        let transform = self.transform_for(base_rotation, steps);
        let state = self.state.as_str();
        let Some(loaded) = self.loaded.as_mut() else {
            return Err(Error::Usage {
                operation: "adjust",
                state,
            });
        };
        let preview = render(
            &loaded.image,
            &loaded.landmarks,
            self.target,
            &self.config.biometric_checks,
            &transform,
        )?;
        debug!(?command, ?transform, "adjusted");

        loaded.steps = steps;
        loaded.preview = preview;
        self.state = if steps == Steps::default() {
            SessionState::Previewing
        } else {
            SessionState::Adjusted
        };
        Ok(&loaded.preview)
    }

    /// Apply a queue of commands in order.
    pub fn adjust_all<I>(&mut self, commands: I) -> Result<&Rendered>
    where
        I: IntoIterator<Item = AdjustCommand>,
    {
        for command in commands {
            self.adjust(command)?;
        }
        self.preview().ok_or_else(|| self.usage("adjust"))
    }

    /// The current transform, if an image is loaded.
    pub fn transform(&self) -> Option<CropTransform> {
        self.loaded
            .as_ref()
            .map(|loaded| self.transform_for(loaded.base_rotation, loaded.steps))
    }

    pub fn preview(&self) -> Option<&Rendered> {
        match self.state {
            SessionState::Previewing | SessionState::Adjusted => {
                self.loaded.as_ref().map(|loaded| &loaded.preview)
            }
            _ => None,
        }
    }

    /// Encode the current preview as JPEG under the byte budget and finish.
    pub fn commit(&mut self) -> Result<EncodedArtifact> {
        self.commit_with(&JpegQualityEncoder)
    }

    pub fn commit_with<E: QualityEncoder + ?Sized>(&mut self, encoder: &E) -> Result<EncodedArtifact> {
        self.require(self.state.is_live(), "commit")?;
        let Some(loaded) = self.loaded.as_ref() else {
            return Err(self.usage("commit"));
        };

        let search = QualitySearch::from(&self.config.image_quality);
        let artifact = fit(encoder, &loaded.preview.image, self.max_bytes, search)?;
        info!(
            quality = artifact.quality,
            size = artifact.len(),
            "refinement session committed"
        );

        self.state = SessionState::Committed;
        self.loaded = None;
        Ok(artifact)
    }

    /// Abandon the session and discard its transform.
    pub fn cancel(&mut self) -> Result<()> {
        self.require(self.state.is_live(), "cancel")?;
        info!("refinement session cancelled");
        self.state = SessionState::Cancelled;
        self.loaded = None;
        Ok(())
    }

    fn transform_for(&self, base_rotation: f32, steps: Steps) -> CropTransform {
        let refinement = &self.config.refinement;
        CropTransform {
            scale: self.config.biometric_checks.after_scale.powi(steps.scale),
            offset_x: steps.x * refinement.offset_step,
            offset_y: steps.y * refinement.offset_step,
            rotation_deg: base_rotation + steps.rotation as f32 * refinement.rotation_step,
        }
    }

    fn require(&self, allowed: bool, operation: &'static str) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(self.usage(operation))
        }
    }

    fn usage(&self, operation: &'static str) -> Error {
        Error::Usage {
            operation,
            state: self.state.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::tests::frontal_face;
    use image::Rgb;

    fn image() -> RgbImage {
        RgbImage::from_fn(600, 700, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
    }

    fn session() -> RefinementSession {
        RefinementSession::new(BiometricConfig::default(), ImageSize::new(413, 531), 500 * 1024)
    }

    #[test]
    fn start_previews_automatic_placement() {
        let mut s = session();
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.preview().is_none());

        let preview = s.start(image(), frontal_face()).unwrap();
        assert_eq!(preview.image.dimensions(), (413, 531));
        assert_eq!(s.state(), SessionState::Previewing);
        assert!(s.transform().unwrap().is_identity());
    }

    #[test]
    fn adjustments_update_transform_and_state() {
        let mut s = session();
        s.start(image(), frontal_face()).unwrap();

        s.adjust(AdjustCommand::ScaleUp).unwrap();
        s.adjust(AdjustCommand::MoveUp).unwrap();
        s.adjust(AdjustCommand::RotateRight).unwrap();
        assert_eq!(s.state(), SessionState::Adjusted);

        let t = s.transform().unwrap();
        assert!((t.scale - 1.03).abs() < 1e-6);
        assert_eq!((t.offset_x, t.offset_y), (0, 10));
        assert!((t.rotation_deg - 0.5).abs() < 1e-6);

        s.adjust_all([
            AdjustCommand::ScaleDown,
            AdjustCommand::MoveDown,
            AdjustCommand::RotateLeft,
        ])
        .unwrap();
        assert_eq!(s.state(), SessionState::Previewing);
        assert!(s.transform().unwrap().is_identity());
    }

    #[test]
    fn scale_does_not_drift() {
        let mut s = session();
        s.start(image(), frontal_face()).unwrap();
        for _ in 0..25 {
            s.adjust(AdjustCommand::ScaleUp).unwrap();
        }
        for _ in 0..25 {
            s.adjust(AdjustCommand::ScaleDown).unwrap();
        }
        assert_eq!(s.transform().unwrap().scale, 1.0);
    }

    #[test]
    fn replaying_commands_is_deterministic() {
        let commands = [
            AdjustCommand::ScaleUp,
            AdjustCommand::MoveLeft,
            AdjustCommand::RotateLeft,
            AdjustCommand::MoveDown,
        ];
        let run = || {
            let mut s = session();
            s.start(image(), frontal_face()).unwrap();
            let preview = s.adjust_all(commands).unwrap();
            (preview.image.clone(), s.transform().unwrap())
        };
        let (a_img, a_t) = run();
        let (b_img, b_t) = run();
        assert_eq!(a_t, b_t);
        assert_eq!(a_img.as_raw(), b_img.as_raw());
    }

    #[test]
    fn commit_encodes_and_terminates() {
        let mut s = session();
        s.start(image(), frontal_face()).unwrap();
        let artifact = s.commit().unwrap();
        assert!(artifact.within_budget());
        assert_eq!(&artifact.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(s.state(), SessionState::Committed);
        assert!(s.preview().is_none());

        let err = s.adjust(AdjustCommand::ScaleUp).unwrap_err();
        assert!(matches!(err, Error::Usage { operation: "adjust", state: "committed" }));
        assert!(s.commit().is_err());
        assert!(s.cancel().is_err());
    }

    #[test]
    fn cancel_discards_transform() {
        let mut s = session();
        s.start(image(), frontal_face()).unwrap();
        s.adjust(AdjustCommand::MoveLeft).unwrap();
        s.cancel().unwrap();
        assert_eq!(s.state(), SessionState::Cancelled);
        assert!(s.transform().is_none());
        assert!(s.start(image(), frontal_face()).is_err());
    }

    #[test]
    fn idle_session_rejects_everything_but_start() {
        let mut s = session();
        assert!(matches!(
            s.adjust(AdjustCommand::MoveUp),
            Err(Error::Usage { state: "idle", .. })
        ));
        assert!(s.commit().is_err());
        assert!(s.cancel().is_err());
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn adjust_returns_fresh_preview() {
        let mut s = session();
        let before = s.start(image(), frontal_face()).unwrap().crop;
        let after = s.adjust(AdjustCommand::MoveLeft).unwrap().crop;
        assert_eq!(after.left, before.left + 10);
        assert_eq!(s.preview().map(|p| p.crop), Some(after));

        s.cancel().unwrap();
        assert!(matches!(
            s.adjust(AdjustCommand::MoveLeft),
            Err(Error::Usage { operation: "adjust", state: "cancelled" })
        ));
    }

    #[test]
    fn parses_command_names() {
        assert_eq!("+".parse::<AdjustCommand>(), Ok(AdjustCommand::ScaleUp));
        assert_eq!(" RR ".parse::<AdjustCommand>(), Ok(AdjustCommand::RotateRight));
        assert_eq!("k".parse::<AdjustCommand>(), Ok(AdjustCommand::MoveUp));
        assert!("zoom".parse::<AdjustCommand>().is_err());
    }
}
