//! Frame pacing

use std::time::Duration;
use tokio::time::Instant;

/// Paces frame production to a fixed period without accumulating debt.
///
/// [`tick`](FramePacer::tick) suspends for the remainder of the current
/// interval since the previous tick. A caller that arrives after the deadline
/// has passed is released immediately and the cadence restarts from "now", so
/// a slow consumer never builds up a backlog of owed frames.
#[derive(Debug)]
pub struct FramePacer {
    period: Duration,
    next_deadline: Option<Instant>,
}

impl FramePacer {
    /// A pacer with the given period between ticks
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_deadline: None,
        }
    }

    /// A pacer targeting `fps` ticks per second
    pub fn for_fps(fps: u32) -> Self {
        Self::new(Duration::from_micros(1_000_000 / u64::from(fps.max(1))))
    }

    /// The configured period between ticks
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait out the remainder of the current interval. The first tick is
    /// released immediately.
    pub async fn tick(&mut self) {
        let now = Instant::now();
        match self.next_deadline {
            None => {
                self.next_deadline = Some(now + self.period);
            }
            Some(deadline) if now < deadline => {
                tokio::time::sleep_until(deadline).await;
                self.next_deadline = Some(deadline + self.period);
            }
            Some(_) => {
                // Late caller: no debt, cadence restarts from now.
                self.next_deadline = Some(now + self.period);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let mut pacer = FramePacer::for_fps(30);
        let start = Instant::now();
        pacer.tick().await;
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_cadence() {
        let mut pacer = FramePacer::new(Duration::from_millis(40));
        let start = Instant::now();
        pacer.tick().await;
        pacer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(40));
        pacer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_caller_does_not_accumulate_debt() {
        let mut pacer = FramePacer::new(Duration::from_millis(40));
        pacer.tick().await;

        // Arrive 60ms past the deadline.
        tokio::time::advance(Duration::from_millis(100)).await;
        let before = Instant::now();
        pacer.tick().await;
        assert_eq!(Instant::now(), before);

        // The cadence resumed from the late tick, not from the old deadline.
        pacer.tick().await;
        assert_eq!(before.elapsed(), Duration::from_millis(40));
    }

    #[test]
    fn test_fps_period() {
        assert_eq!(
            FramePacer::for_fps(30).period(),
            Duration::from_micros(33_333)
        );
        // A zero rate is clamped rather than dividing by zero.
        assert_eq!(FramePacer::for_fps(0).period(), Duration::from_secs(1));
    }
}
