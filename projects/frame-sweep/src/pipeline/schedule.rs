// Sampling schedule: the playback timestamps a video should be sampled at

use std::collections::VecDeque;

/// Sampling rate actually used for a video: the configured rate capped at
/// the video's native frame rate.
pub fn effective_rate(configured: f64, native_fps: f64) -> f64 {
    configured.min(native_fps)
}

/// Ordered queue of target timestamps (seconds), consumed front to back.
#[derive(Debug, Clone)]
pub struct SamplingSchedule {
    spots: VecDeque<f64>,
}

impl SamplingSchedule {
    /// Targets `0, 1/rate, 2/rate, ...` strictly below the clip duration
    /// `frame_count / native_fps`.
    pub fn new(frame_count: usize, native_fps: f64, rate: f64) -> Self {
        let mut spots = VecDeque::new();
        if native_fps > 0.0 && rate > 0.0 && rate.is_finite() {
            let clip_duration = frame_count as f64 / native_fps;
            let mut i = 0u64;
            loop {
                let spot = i as f64 / rate;
                if spot >= clip_duration {
                    break;
                }
                spots.push_back(spot);
                i += 1;
            }
        }
        Self { spots }
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    pub fn front(&self) -> Option<f64> {
        self.spots.front().copied()
    }

    /// Pops exactly one entry if `frame_time` has reached the earliest
    /// pending target. Returns whether the frame should be kept.
    pub fn consume_if_due(&mut self, frame_time: f64) -> bool {
        match self.spots.front() {
            Some(&spot) if frame_time >= spot => {
                self.spots.pop_front();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_ten_seconds_at_four_hz() {
        let schedule = SamplingSchedule::new(300, 30.0, 4.0);
        assert_eq!(schedule.len(), 40);
        assert_eq!(schedule.front(), Some(0.0));
        assert_eq!(schedule.spots.back().copied(), Some(9.75));
    }

    #[test]
    fn test_schedule_length_is_ceil_of_duration_times_rate() {
        // 2.5s at 3 Hz -> ceil(7.5) = 8
        let schedule = SamplingSchedule::new(75, 30.0, 3.0);
        assert_eq!(schedule.len(), 8);

        // 1s at 4 Hz: 1.0 itself is excluded
        let schedule = SamplingSchedule::new(30, 30.0, 4.0);
        assert_eq!(schedule.len(), 4);
    }

    #[test]
    fn test_short_clip_has_single_entry() {
        // 0.1s clip sampled once every 0.25s
        let schedule = SamplingSchedule::new(3, 30.0, 4.0);
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.front(), Some(0.0));
    }

    #[test]
    fn test_empty_inputs_yield_empty_schedule() {
        assert!(SamplingSchedule::new(0, 30.0, 4.0).is_empty());
        assert!(SamplingSchedule::new(100, 0.0, 4.0).is_empty());
        assert!(SamplingSchedule::new(100, 30.0, 0.0).is_empty());
    }

    #[test]
    fn test_consume_pops_one_entry_per_call() {
        let mut schedule = SamplingSchedule::new(30, 30.0, 4.0);
        assert!(!schedule.is_empty());

        // A late frame satisfies only the front entry; the rest stay pending.
        assert!(schedule.consume_if_due(0.8));
        assert_eq!(schedule.front(), Some(0.25));
        assert!(schedule.consume_if_due(0.8));
        assert!(schedule.consume_if_due(0.8));
        assert_eq!(schedule.front(), Some(0.75));
        assert!(!schedule.consume_if_due(0.7));
        assert!(schedule.consume_if_due(0.75));
        assert!(schedule.is_empty());
        assert!(!schedule.consume_if_due(100.0));
    }

    #[test]
    fn test_effective_rate_is_capped_by_native_fps() {
        assert_eq!(effective_rate(4.0, 30.0), 4.0);
        assert_eq!(effective_rate(60.0, 24.0), 24.0);
    }
}
