//! Rate limiting for progress-style notifications.
//!
//! Background work that reports progress (for example indexing a large file)
//! would flood its consumer if it reported every step. A [`Throttle`] lets a
//! report through at most once per interval, or earlier when the reported
//! fraction moved by at least a configured step.

use std::time::{
  Duration,
  Instant,
};

/// Smallest change in the reported fraction that bypasses the interval,
/// in thousandths.
const DEFAULT_PERMILLE_STEP: u64 = 100;

#[derive(Debug, Clone)]
pub struct Throttle {
  interval:      Duration,
  permille_step: u64,
  last_at:       Option<Instant>,
  last_permille: u64,
}

impl Throttle {
  pub fn new(interval: Duration) -> Self {
    Self {
      interval,
      permille_step: DEFAULT_PERMILLE_STEP,
      last_at: None,
      last_permille: 0,
    }
  }

  /// Overrides the fraction delta (in thousandths) that forces a report.
  /// A step of zero disables fraction-triggered reports.
  pub fn with_permille_step(mut self, step: u64) -> Self {
    self.permille_step = step;
    self
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  /// Returns true if a report for `done / total` should be emitted now.
  pub fn ready(&mut self, done: u64, total: u64) -> bool {
    self.ready_at(Instant::now(), done, total)
  }

  pub fn ready_at(&mut self, now: Instant, done: u64, total: u64) -> bool {
    let permille = permille(done, total);
    let elapsed = match self.last_at {
      Some(last) => now.saturating_duration_since(last) >= self.interval,
      None => true,
    };
    let jumped =
      self.permille_step > 0 && permille.saturating_sub(self.last_permille) >= self.permille_step;
    if elapsed || jumped {
      self.last_at = Some(now);
      self.last_permille = permille;
      true
    } else {
      false
    }
  }
}

fn permille(done: u64, total: u64) -> u64 {
  if total == 0 {
    return 1000;
  }
  ((done.min(total) as u128 * 1000) / total as u128) as u64
}
