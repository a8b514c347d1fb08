//! Keeps the active primitive aligned with the play/pause/volume intent
//! coming from the UI.
//!
//! Play is only requested when the primitive reports it is paused and pause
//! only when it is playing. The primitive's own play/pause events remain the
//! source of truth for the `is_playing` flag shown to the user.

use tracing::{debug, error, warn};

use crate::capabilities::{TransportControl, VolumeControl};
use crate::errors::MediaFailure;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DesiredPlayback {
    pub playing: bool,
    /// Linear volume, clamped to 0.0..=1.0.
    pub volume: f64,
}

impl Default for DesiredPlayback {
    fn default() -> Self {
        Self {
            playing: false,
            volume: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub play_requested: bool,
    pub pause_requested: bool,
    pub failure: Option<MediaFailure>,
}

#[derive(Debug, Default)]
pub struct PlaybackReconciler {
    desired: DesiredPlayback,
}

impl PlaybackReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn desired(&self) -> DesiredPlayback {
        self.desired
    }

    pub fn should_play(&self) -> bool {
        self.desired.playing
    }

    pub fn set_desired(&mut self, playing: bool, volume: f64) {
        self.desired = DesiredPlayback {
            playing,
            volume: clamp_volume(volume),
        };
    }

    /// Applies volume and play/pause intent to `target`.
    pub fn apply<T>(&self, target: &mut T) -> ReconcileOutcome
    where
        T: TransportControl + VolumeControl + ?Sized,
    {
        let mut outcome = ReconcileOutcome::default();

        if (target.volume() - self.desired.volume).abs() > f64::EPSILON {
            target.set_volume(self.desired.volume);
        }

        if self.desired.playing {
            if target.is_paused() {
                outcome.play_requested = true;
                if let Err(failure) = target.play() {
                    log_play_failure(&failure);
                    outcome.failure = Some(failure);
                }
            }
        } else if !target.is_paused() {
            outcome.pause_requested = true;
            target.pause();
        }

        outcome
    }
}

/// Logs a rejected play request at the level its cause deserves.
pub(crate) fn log_play_failure(failure: &MediaFailure) {
    match failure {
        MediaFailure::Aborted => debug!("Play request superseded by a new load"),
        MediaFailure::NotAllowed(reason) => warn!(reason = %reason, "Auto-play blocked"),
        MediaFailure::Other(reason) => error!(reason = %reason, "Playback error"),
    }
}

pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        return 1.0;
    }
    volume.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Probe {
        paused: bool,
        volume: f64,
        plays: usize,
        pauses: usize,
        volume_writes: usize,
        reject_with: Option<MediaFailure>,
    }

    impl TransportControl for Probe {
        fn play(&mut self) -> Result<(), MediaFailure> {
            self.plays += 1;
            match self.reject_with.clone() {
                Some(failure) => Err(failure),
                None => {
                    self.paused = false;
                    Ok(())
                }
            }
        }

        fn pause(&mut self) {
            self.pauses += 1;
            self.paused = true;
        }

        fn is_paused(&self) -> bool {
            self.paused
        }
    }

    impl VolumeControl for Probe {
        fn volume(&self) -> f64 {
            self.volume
        }

        fn set_volume(&mut self, volume: f64) {
            self.volume_writes += 1;
            self.volume = volume;
        }
    }

    #[test]
    fn test_play_only_when_paused() {
        let mut reconciler = PlaybackReconciler::new();
        reconciler.set_desired(true, 0.4);
        let mut probe = Probe {
            paused: true,
            ..Default::default()
        };

        assert!(reconciler.apply(&mut probe).play_requested);
        let second = reconciler.apply(&mut probe);
        assert!(!second.play_requested);
        assert_eq!(probe.plays, 1);
        assert_eq!(probe.volume, 0.4);
        assert_eq!(probe.volume_writes, 1);
    }

    #[test]
    fn test_pause_only_when_playing() {
        let mut reconciler = PlaybackReconciler::new();
        reconciler.set_desired(false, 1.0);
        let mut probe = Probe {
            paused: true,
            volume: 1.0,
            ..Default::default()
        };

        assert_eq!(reconciler.apply(&mut probe), ReconcileOutcome::default());
        probe.paused = false;
        assert!(reconciler.apply(&mut probe).pause_requested);
        assert_eq!(probe.pauses, 1);
    }

    #[test]
    fn test_rejections_are_reported_not_raised() {
        let mut reconciler = PlaybackReconciler::new();
        reconciler.set_desired(true, 1.0);
        let mut probe = Probe {
            paused: true,
            volume: 1.0,
            reject_with: Some(MediaFailure::Aborted),
            ..Default::default()
        };

        let outcome = reconciler.apply(&mut probe);
        assert_eq!(outcome.failure, Some(MediaFailure::Aborted));
        assert!(outcome.failure.unwrap().is_benign());
    }

    #[test]
    fn test_volume_is_clamped() {
        assert_eq!(clamp_volume(1.7), 1.0);
        assert_eq!(clamp_volume(-0.2), 0.0);
        assert_eq!(clamp_volume(f64::NAN), 1.0);
    }
}
