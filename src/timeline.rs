use serde::Serialize;

use crate::error::{PromoreelError, PromoreelResult};
use crate::style::FPS;

/// Frame bookkeeping for one render, derived once from the scene count and
/// the per-scene duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Timeline {
    pub scene_count: u64,
    pub frames_per_scene: u64,
    pub total_frames: u64,
}

/// Per-frame values driving the scene painter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSample {
    pub scene_index: usize,
    pub frame_in_scene: u64,
    /// Position within the whole timeline, 0..=1.
    pub overall_progress: f64,
    /// Scene fade weight, 0..=1.
    pub opacity: f32,
    /// Vertical text drift in pixels.
    pub drift_px: f64,
}

impl Timeline {
    pub fn new(scene_count: usize, scene_duration_seconds: f64) -> PromoreelResult<Self> {
        if scene_count == 0 {
            return Err(PromoreelError::NoScenes);
        }
        if !scene_duration_seconds.is_finite() || scene_duration_seconds <= 0.0 {
            return Err(PromoreelError::validation(
                "scene duration must be finite and > 0",
            ));
        }

        let frames_per_scene = ((scene_duration_seconds * f64::from(FPS)).round() as u64).max(1);
        let scene_count = scene_count as u64;
        Ok(Self {
            scene_count,
            frames_per_scene,
            total_frames: frames_per_scene.saturating_mul(scene_count),
        })
    }

    /// Fade window length in frames: a sixth of the scene, floored at 6.
    pub fn fade_span(&self) -> u64 {
        (self.frames_per_scene / 6).max(6)
    }

    /// Derive painter inputs for `frame`.
    ///
    /// Valid for `0..=total_frames`. The fade weight is the minimum of the
    /// ramp-in (`frame_in_scene / fade_span`) and the ramp-out over the
    /// trailing distance to the scene boundary, each clamped to [0, 1]; for
    /// scenes shorter than two fade spans the overlapping ramps blend to the
    /// lower value instead of holding at 1.
    pub fn sample(&self, frame: u64) -> FrameSample {
        let scene_index = (frame / self.frames_per_scene).min(self.scene_count - 1);
        let frame_in_scene = frame % self.frames_per_scene;
        let overall_progress = frame as f64 / self.total_frames as f64;

        let span = self.fade_span() as f32;
        let fade_in = (frame_in_scene as f32 / span).clamp(0.0, 1.0);
        let tail = (self.frames_per_scene - frame_in_scene) as f32;
        let fade_out = (tail / span).clamp(0.0, 1.0);

        FrameSample {
            scene_index: scene_index as usize,
            frame_in_scene,
            overall_progress,
            opacity: fade_in.min(fade_out),
            drift_px: ((overall_progress + scene_index as f64 * 0.1) * std::f64::consts::TAU).sin()
                * 18.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_per_scene_rounds_with_a_floor_of_one() {
        assert_eq!(Timeline::new(1, 4.0).unwrap().frames_per_scene, 120);
        assert_eq!(Timeline::new(1, 2.5).unwrap().frames_per_scene, 75);
        assert_eq!(Timeline::new(1, 0.01).unwrap().frames_per_scene, 1);
    }

    #[test]
    fn total_frames_is_frames_per_scene_times_scene_count() {
        let t = Timeline::new(3, 2.0).unwrap();
        assert_eq!(t.frames_per_scene, 60);
        assert_eq!(t.total_frames, 180);
    }

    #[test]
    fn zero_scenes_is_rejected() {
        assert!(matches!(
            Timeline::new(0, 4.0),
            Err(PromoreelError::NoScenes)
        ));
    }

    #[test]
    fn bad_duration_is_rejected() {
        assert!(Timeline::new(1, 0.0).is_err());
        assert!(Timeline::new(1, f64::NAN).is_err());
    }

    #[test]
    fn fade_span_is_a_sixth_floored_at_six() {
        assert_eq!(Timeline::new(1, 4.0).unwrap().fade_span(), 20);
        assert_eq!(Timeline::new(1, 0.5).unwrap().fade_span(), 6);
    }

    #[test]
    fn two_scene_walkthrough() {
        // "A|one\nB|two" at 4s per scene.
        let t = Timeline::new(2, 4.0).unwrap();
        assert_eq!(t.frames_per_scene, 120);
        assert_eq!(t.total_frames, 240);
        assert_eq!(t.fade_span(), 20);

        let s = t.sample(0);
        assert_eq!(s.scene_index, 0);
        assert_eq!(s.opacity, 0.0);

        assert_eq!(t.sample(20).opacity, 1.0, "fully faded in at fade_span");
        assert_eq!(t.sample(60).opacity, 1.0, "held mid-scene");
        assert_eq!(t.sample(100).opacity, 1.0, "ramp-out boundary");

        let s = t.sample(119);
        assert_eq!(s.scene_index, 0, "last frame still belongs to scene 0");
        assert!((s.opacity - 1.0 / 20.0).abs() < 1e-6, "fading out");

        let s = t.sample(120);
        assert_eq!(s.scene_index, 1);
        assert_eq!(s.opacity, 0.0);
    }

    #[test]
    fn final_inclusive_frame_samples_last_scene_at_zero_opacity() {
        let t = Timeline::new(2, 4.0).unwrap();
        let s = t.sample(t.total_frames);
        assert_eq!(s.scene_index, 1);
        assert_eq!(s.opacity, 0.0);
        assert_eq!(s.overall_progress, 1.0);
    }

    #[test]
    fn short_scenes_blend_overlapping_fades() {
        // 8 frames per scene with a 6 frame fade span: the windows overlap
        // and the weight never reaches 1.
        let t = Timeline::new(1, 8.0 / 30.0).unwrap();
        assert_eq!(t.frames_per_scene, 8);
        assert_eq!(t.fade_span(), 6);

        for f in 0..t.frames_per_scene {
            let s = t.sample(f);
            let fade_in = (f as f32 / 6.0).min(1.0);
            let fade_out = ((8 - f) as f32 / 6.0).min(1.0);
            assert_eq!(s.opacity, fade_in.min(fade_out));
            assert!(s.opacity < 1.0);
        }
    }

    #[test]
    fn drift_follows_the_timeline_sine() {
        let t = Timeline::new(1, 4.0).unwrap();
        assert_eq!(t.sample(0).drift_px, 0.0);
        // Quarter progress puts the sine at its +18 peak.
        assert!((t.sample(30).drift_px - 18.0).abs() < 1e-9);
        for f in 0..=t.total_frames {
            assert!(t.sample(f).drift_px.abs() <= 18.0);
        }
    }
}
