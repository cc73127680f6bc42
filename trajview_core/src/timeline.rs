//! Animation timelines and time-based opacity.
//!
//! All schedules are generated from integer step counts so long timelines
//! do not drift the way repeated `t += step` would.

const TIME_EPSILON: f64 = 1e-9;

/// Opacity lost over a full time window (the far end keeps 70 %).
pub const WINDOW_FADE: f64 = 0.3;

/// Longest schedule the timeline functions produce; anything above yields none.
pub const MAX_STEPS: usize = 100_000;

/// Closed time window in seconds.
pub type TimeWindow = (f64, f64);

/// `floor(span / step) + 1`, or `None` when that exceeds [`MAX_STEPS`].
fn step_count(span: f64, step: f64) -> Option<usize> {
    let steps = (span / step + TIME_EPSILON).floor();
    if !(steps < MAX_STEPS as f64) {
        return None;
    }
    (steps as usize).checked_add(1)
}

/// Windows `(s, s + window)` for `s = 0, step, 2·step, …` while `s + window <= total`.
pub fn sweep_windows(total: f64, window: f64, step: f64) -> Vec<TimeWindow> {
    if !(step > 0.0) || !(window >= 0.0) || !(total >= window) {
        return Vec::new();
    }
    let Some(count) = step_count(total - window, step) else {
        return Vec::new();
    };
    (0..count)
        .map(|k| {
            let start = k as f64 * step;
            (start, start + window)
        })
        .collect()
}

/// Sampling instants `0, 1/rate, 2/rate, … <= total`.
pub fn sampling_times(rate_hz: f64, total: f64) -> Vec<f64> {
    if !(rate_hz > 0.0) || !(total >= 0.0) {
        return Vec::new();
    }
    let interval = 1.0 / rate_hz;
    let Some(count) = step_count(total, interval) else {
        return Vec::new();
    };
    (0..count).map(|k| k as f64 * interval).collect()
}

/// Frame indices `start, start + step, …`: at most `count`, all below `available`.
pub fn frame_sequence(start: usize, count: usize, step: usize, available: usize) -> Vec<usize> {
    let step = step.max(1);
    (0..count)
        .map(|k| start + k * step)
        .take_while(|idx| *idx < available)
        .collect()
}

/// Opacity of a sample at time `t` inside `window`: later samples are fainter.
pub fn time_decay_alpha(base: f64, t: f64, window: TimeWindow) -> f64 {
    let span = window.1 - window.0;
    let progress = if span > 0.0 {
        ((t - window.0) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    base * (1.0 - WINDOW_FADE * progress)
}

/// Opacity of a prediction made `age` frames ago.
///
/// `age = 0` is the current prediction at full `base`; older ones fade
/// linearly and vanish once `age > fade_steps`.
pub fn history_alpha(base: f64, age: usize, fade_steps: usize) -> f64 {
    if age == 0 {
        return base;
    }
    if age > fade_steps {
        return 0.0;
    }
    base * (1.0 - age as f64 / (fade_steps as f64 + 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sweep_windows_default_gif() {
        let windows = sweep_windows(6.0, 3.0, 0.5);
        assert_eq!(windows.len(), 7);
        assert_eq!(windows[0], (0.0, 3.0));
        assert_relative_eq!(windows[6].0, 3.0);
        assert_relative_eq!(windows[6].1, 6.0);
    }

    #[test]
    fn test_sweep_windows_degenerate() {
        assert!(sweep_windows(2.0, 3.0, 0.5).is_empty());
        assert!(sweep_windows(6.0, 3.0, 0.0).is_empty());
        assert_eq!(sweep_windows(3.0, 3.0, 1.0), vec![(0.0, 3.0)]);

        // oversized sweeps produce nothing
        assert!(sweep_windows(1e30, 0.0, 1e-9).is_empty());
        assert!(sweep_windows(f64::INFINITY, 1.0, 0.5).is_empty());
        assert_eq!(sweep_windows((MAX_STEPS - 1) as f64, 0.0, 1.0).len(), MAX_STEPS);
    }

    #[test]
    fn test_sampling_times() {
        let times = sampling_times(2.0, 4.0);
        assert_eq!(times.len(), 9);
        assert_relative_eq!(times[8], 4.0);

        // 0.1 s steps over 8 s keep the final sample
        assert_eq!(sampling_times(10.0, 8.0).len(), 81);
        assert!(sampling_times(0.0, 4.0).is_empty());
        assert!(sampling_times(1e9, 1e12).is_empty());
    }

    #[test]
    fn test_frame_sequence() {
        assert_eq!(frame_sequence(0, 10, 2, 100), vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
        assert_eq!(frame_sequence(3, 10, 2, 8), vec![3, 5, 7]);
        assert_eq!(frame_sequence(0, 3, 0, 10), vec![0, 1, 2]);
        assert!(frame_sequence(12, 3, 1, 10).is_empty());
    }

    #[test]
    fn test_time_decay_alpha() {
        assert_relative_eq!(time_decay_alpha(0.8, 0.0, (0.0, 3.0)), 0.8);
        assert_relative_eq!(time_decay_alpha(0.8, 3.0, (0.0, 3.0)), 0.56);
        assert_relative_eq!(time_decay_alpha(1.0, 1.5, (0.0, 3.0)), 0.85);
        // Degenerate window keeps the base opacity
        assert_relative_eq!(time_decay_alpha(0.5, 1.0, (1.0, 1.0)), 0.5);
    }

    #[test]
    fn test_history_alpha() {
        assert_relative_eq!(history_alpha(0.8, 0, 3), 0.8);
        assert_relative_eq!(history_alpha(0.8, 1, 3), 0.6);
        assert_relative_eq!(history_alpha(0.8, 3, 3), 0.2);
        assert_eq!(history_alpha(0.8, 4, 3), 0.0);
    }
}
