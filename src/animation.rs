//! Keyframe/skeletal animation playback driven by the frame clock.
//!
//! The player only tracks *which* track is active and *where* its time
//! cursor sits. Sampling the track at that time is the render engine's job.

use crate::error::ErrorKind;

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTrack {
    pub index: usize,
    pub name: Option<String>,
    /// Seconds, never negative.
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Playing,
    Paused,
    /// A non-looping track ran into one of its ends.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub index: usize,
    pub looping: bool,
    pub time: f64,
    pub phase: PlaybackPhase,
}

#[derive(Debug, thiserror::Error)]
pub enum AnimationError {
    #[error("animation index {index} out of range (model has {count})")]
    OutOfRange { index: usize, count: usize },
    #[error("{operation} called with no active animation")]
    NoActiveAnimation { operation: &'static str },
    #[error("invalid animation argument: {0}")]
    InvalidArgument(String),
}

impl AnimationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnimationError::OutOfRange { .. } => ErrorKind::OutOfRange,
            AnimationError::NoActiveAnimation { .. } => ErrorKind::Misuse,
            AnimationError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }
}

/// Point-in-time view of playback for hosts that mirror it in their UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationSnapshot {
    pub index: usize,
    pub looping: bool,
    pub time: f64,
    pub speed: f64,
    pub phase: PlaybackPhase,
}

#[derive(Debug, Clone)]
pub struct AnimationPlayer {
    tracks: Vec<AnimationTrack>,
    active: Option<PlaybackState>,
    speed: f64,
}

impl Default for AnimationPlayer {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AnimationPlayer {
    pub fn new(speed: f64) -> Self {
        Self {
            tracks: Vec::new(),
            active: None,
            speed,
        }
    }

    /// Replaces the track list for a freshly committed model. Playback stops;
    /// the user-set speed is kept.
    pub fn load_tracks(&mut self, tracks: Vec<AnimationTrack>) {
        self.tracks = tracks;
        self.active = None;
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.active = None;
    }

    pub fn count(&self) -> usize {
        self.tracks.len()
    }

    pub fn duration(&self, index: usize) -> Result<f64, AnimationError> {
        self.track(index).map(|track| track.duration)
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn snapshot(&self) -> Option<AnimationSnapshot> {
        self.active.map(|state| AnimationSnapshot {
            index: state.index,
            looping: state.looping,
            time: state.time,
            speed: self.speed,
            phase: state.phase,
        })
    }

    pub fn is_playing(&self) -> bool {
        matches!(
            self.active,
            Some(PlaybackState {
                phase: PlaybackPhase::Playing,
                ..
            })
        ) && self.speed != 0.0
    }

    /// Starts `index` from time zero, replacing whatever was active.
    pub fn play(&mut self, index: usize, looping: bool) -> Result<(), AnimationError> {
        self.track(index)?;
        self.active = Some(PlaybackState {
            index,
            looping,
            time: 0.0,
            phase: PlaybackPhase::Playing,
        });
        log::debug!("playing animation {index} (loop={looping})");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), AnimationError> {
        let state = self.active_mut("pause_animation")?;
        if state.phase == PlaybackPhase::Playing {
            state.phase = PlaybackPhase::Paused;
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), AnimationError> {
        let state = self.active_mut("resume_animation")?;
        if state.phase == PlaybackPhase::Paused {
            state.phase = PlaybackPhase::Playing;
        }
        Ok(())
    }

    pub fn seek(&mut self, seconds: f64) -> Result<(), AnimationError> {
        if !seconds.is_finite() {
            return Err(AnimationError::InvalidArgument(format!(
                "seek time must be finite, got {seconds}"
            )));
        }
        let Some(state) = self.active else {
            return Err(AnimationError::NoActiveAnimation {
                operation: "seek_animation",
            });
        };
        let duration = self.duration(state.index)?;
        let time = if state.looping {
            wrap_time(seconds, duration)
        } else {
            seconds.clamp(0.0, duration.max(0.0))
        };
        let phase = match state.phase {
            PlaybackPhase::Finished if time > 0.0 && time < duration => PlaybackPhase::Playing,
            phase => phase,
        };
        self.active = Some(PlaybackState {
            time,
            phase,
            ..state
        });
        Ok(())
    }

    /// Negative speeds play backwards; zero freezes without pausing.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), AnimationError> {
        if !speed.is_finite() {
            return Err(AnimationError::InvalidArgument(format!(
                "animation speed must be finite, got {speed}"
            )));
        }
        self.speed = speed;
        Ok(())
    }

    /// Playback state `elapsed` seconds from now, without moving the cursor.
    pub fn advanced(&self, elapsed: f64) -> Option<PlaybackState> {
        let mut state = self.active?;
        if state.phase != PlaybackPhase::Playing || !(elapsed.is_finite() && elapsed > 0.0) {
            return Some(state);
        }
        let duration = match self.tracks.get(state.index) {
            Some(track) if track.duration > 0.0 => track.duration,
            _ => return Some(state),
        };
        let time = state.time + self.speed * elapsed;
        if state.looping {
            state.time = wrap_time(time, duration);
        } else if time >= duration {
            state.time = duration;
            state.phase = PlaybackPhase::Finished;
        } else if time <= 0.0 && self.speed < 0.0 {
            state.time = 0.0;
            state.phase = PlaybackPhase::Finished;
        } else {
            state.time = time.max(0.0);
        }
        Some(state)
    }

    /// Installs a state previously produced by [`AnimationPlayer::advanced`].
    /// Ignored if the track list changed in between.
    pub fn commit(&mut self, state: Option<PlaybackState>) {
        match (self.active, state) {
            (Some(current), Some(next)) if current.index == next.index => self.active = Some(next),
            _ => {}
        }
    }

    /// The (track, seconds) pair the engine should pose the model at.
    pub fn sample(&self) -> Option<(usize, f64)> {
        self.active.map(|state| (state.index, state.time))
    }

    fn track(&self, index: usize) -> Result<&AnimationTrack, AnimationError> {
        self.tracks.get(index).ok_or(AnimationError::OutOfRange {
            index,
            count: self.tracks.len(),
        })
    }

    fn active_mut(&mut self, operation: &'static str) -> Result<&mut PlaybackState, AnimationError> {
        self.active
            .as_mut()
            .ok_or(AnimationError::NoActiveAnimation { operation })
    }
}

fn wrap_time(time: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 0.0;
    }
    let wrapped = time.rem_euclid(duration);
    // rem_euclid can round up to exactly `duration` for tiny negative inputs.
    if wrapped >= duration {
        0.0
    } else {
        wrapped
    }
}
