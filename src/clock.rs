const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
const FPS_WINDOW_NANOS: u64 = 1_000_000_000;

/// Turns the host's per-frame timestamps into elapsed-time deltas.
///
/// The first tick after construction reports zero elapsed time; there is no
/// previous frame to measure against.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_timestamp: Option<u64>,
    fps_window_start: Option<u64>,
    fps_frames: u32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a tick and returns the seconds elapsed since the previous one.
    pub fn tick(&mut self, timestamp_nanos: u64) -> f64 {
        let elapsed = match self.last_timestamp {
            Some(last) if timestamp_nanos >= last => {
                (timestamp_nanos - last) as f64 / NANOS_PER_SECOND
            }
            Some(last) => {
                log::warn!(
                    "frame timestamp went backwards ({} < {}); using zero elapsed time",
                    timestamp_nanos,
                    last
                );
                0.0
            }
            None => 0.0,
        };
        self.last_timestamp = Some(
            self.last_timestamp
                .map_or(timestamp_nanos, |last| last.max(timestamp_nanos)),
        );
        elapsed
    }

    /// Counts a rendered frame. Returns a fresh frames-per-second sample each
    /// time a one second window closes.
    pub fn sample_rendered_frame(&mut self, timestamp_nanos: u64) -> Option<f64> {
        let start = *self.fps_window_start.get_or_insert(timestamp_nanos);
        self.fps_frames = self.fps_frames.saturating_add(1);
        let elapsed = timestamp_nanos.saturating_sub(start);
        if elapsed < FPS_WINDOW_NANOS {
            return None;
        }
        let fps = f64::from(self.fps_frames) * NANOS_PER_SECOND / elapsed as f64;
        self.fps_window_start = Some(timestamp_nanos);
        self.fps_frames = 0;
        Some(fps)
    }
}
