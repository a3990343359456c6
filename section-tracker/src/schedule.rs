//! Timing of detection passes
//!
//! Scroll events arrive in bursts much faster than the page repaints. The
//! [`ScrollCoalescer`] folds a burst into at most one pass per animation frame
//! plus one trailing pass once scrolling goes quiet. The
//! [`SuppressionWindow`] keeps passive detection off while a programmatic
//! smooth scroll is running.
//!
//! Both are driven by host timestamps; neither reads a clock.

use std::time::Duration;

/// Folds bursts of scroll events into frame-aligned detection passes
#[derive(Debug, Clone)]
pub struct ScrollCoalescer {
    settle_delay: Duration,
    pending: bool,
    last_scroll: Option<Duration>,
    trailing_armed: bool,
}

impl ScrollCoalescer {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            settle_delay,
            pending: false,
            last_scroll: None,
            trailing_armed: false,
        }
    }

    /// Note a scroll event; measurement is deferred to the next frame
    pub fn record_scroll(&mut self, now: Duration) {
        self.pending = true;
        self.trailing_armed = true;
        self.last_scroll = Some(now);
    }

    /// Whether a frame-aligned pass should run now
    ///
    /// Returns true at most once for any number of scrolls recorded since the
    /// previous frame.
    pub fn take_frame(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }

    /// Whether the trailing pass is due
    ///
    /// Returns true once per burst, the first time it is polled at least
    /// `settle_delay` after the last scroll.
    pub fn take_trailing(&mut self, now: Duration) -> bool {
        match self.last_scroll {
            Some(last) if self.trailing_armed && now.saturating_sub(last) >= self.settle_delay => {
                self.trailing_armed = false;
                true
            }
            _ => false,
        }
    }

    /// Force a pass on the next frame without arming a trailing pass
    pub fn request_pass(&mut self) {
        self.pending = true;
    }

    pub fn has_pending(&self) -> bool {
        self.pending || self.trailing_armed
    }

    /// Forget every pending and trailing pass
    pub fn reset(&mut self) {
        self.pending = false;
        self.trailing_armed = false;
        self.last_scroll = None;
    }
}

/// Timed window during which passive detection is disabled
///
/// Suppressing again while a window is open moves the deadline instead of
/// opening a second window.
#[derive(Debug, Clone, Default)]
pub struct SuppressionWindow {
    until: Option<Duration>,
}

impl SuppressionWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable detection until `now + window`
    pub fn suppress(&mut self, now: Duration, window: Duration) {
        let until = now + window;
        if let Some(previous) = self.until {
            log::debug!(
                "Suppression window reset: {}ms -> {}ms",
                previous.as_millis(),
                until.as_millis()
            );
        }
        self.until = Some(until);
    }

    /// Whether detection is currently disabled
    pub fn is_active(&self, now: Duration) -> bool {
        matches!(self.until, Some(until) if now < until)
    }

    /// Close the window if its deadline has passed
    ///
    /// Returns true exactly once per window, on the first poll at or after the
    /// deadline.
    pub fn expire(&mut self, now: Duration) -> bool {
        match self.until {
            Some(until) if now >= until => {
                self.until = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.until
    }

    pub fn clear(&mut self) {
        self.until = None;
    }
}
