//! Elapsed time accounting for engine statistics

use std::time::{Duration, Instant};

/// Runs `f` and adds the time it took to `total`.
pub fn call_with_stopwatch<T>(total: &mut Duration, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    *total += start.elapsed();
    result
}

/// Adds the time between its creation and its drop to a duration.
pub struct Stopwatch<'a> {
    total: &'a mut Duration,
    start: Instant,
}

impl<'a> Stopwatch<'a> {
    pub fn new(total: &'a mut Duration) -> Stopwatch<'a> {
        Stopwatch {
            total,
            start: Instant::now(),
        }
    }
}

impl Drop for Stopwatch<'_> {
    fn drop(&mut self) {
        *self.total += self.start.elapsed();
    }
}

/// Formats a duration in seconds with two decimals.
pub fn to_seconds(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates() {
        let mut total = Duration::from_secs(1);
        let value = call_with_stopwatch(&mut total, || 3);
        assert_eq!(value, 3);
        assert!(total >= Duration::from_secs(1));

        {
            let _watch = Stopwatch::new(&mut total);
        }
        assert!(total >= Duration::from_secs(1));
        assert_eq!(to_seconds(Duration::from_millis(1500)), "1.50s");
    }
}
