//! Simulated page state
//!
//! Stands in for the browser: holds the section layout, the scroll position
//! and any running smooth-scroll animation, and answers the tracker's layout
//! queries.

use crate::config::{PageConfig, SectionConfig};
use section_tracker::{PageLayout, SectionBounds, SectionId, TrackerError, Viewport};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct ScrollAnimation {
    from: f64,
    to: f64,
    start: Duration,
    duration: Duration,
}

impl ScrollAnimation {
    /// Linear interpolation; returns the offset and whether the animation ended
    fn offset_at(&self, now: Duration) -> (f64, bool) {
        if self.duration.is_zero() || now >= self.start + self.duration {
            return (self.to, true);
        }
        let elapsed = now.saturating_sub(self.start).as_secs_f64();
        let progress = elapsed / self.duration.as_secs_f64();
        (self.from + (self.to - self.from) * progress, false)
    }
}

/// In-memory page implementing the tracker's host interface
#[derive(Debug, Clone)]
pub struct SimulatedPage {
    sections: Vec<(SectionId, SectionBounds)>,
    scroll: f64,
    viewport_height: f64,
    header_height: Option<f64>,
    document_height: Option<f64>,
    smooth_scroll: Duration,
    animation: Option<ScrollAnimation>,
    now: Duration,
}

impl SimulatedPage {
    pub fn from_config(config: &PageConfig) -> Self {
        Self {
            sections: config.sections.iter().map(SectionConfig::to_layout).collect(),
            scroll: 0.0,
            viewport_height: config.viewport_height,
            header_height: config.header_height,
            document_height: config.document_height,
            smooth_scroll: Duration::from_millis(config.smooth_scroll_ms),
            animation: None,
            now: Duration::ZERO,
        }
    }

    /// Advance the page clock (used as the start time of programmatic scrolls)
    pub fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll
    }

    pub fn document_height(&self) -> f64 {
        self.document_height.unwrap_or_else(|| {
            self.sections
                .iter()
                .map(|(_, bounds)| bounds.bottom())
                .fold(0.0, f64::max)
        })
    }

    pub fn max_scroll(&self) -> f64 {
        (self.document_height() - self.viewport_height).max(0.0)
    }

    /// Percentage of the scrollable distance covered, capped at 100
    pub fn scroll_progress(&self) -> f64 {
        let max = self.max_scroll();
        if max <= 0.0 {
            return 100.0;
        }
        (self.scroll / max * 100.0).min(100.0)
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Move instantly; returns true if the offset changed
    ///
    /// Cancels a running animation, as a user scroll does in a browser.
    pub fn jump_to(&mut self, offset: f64) -> bool {
        self.animation = None;
        let target = offset.clamp(0.0, self.max_scroll());
        let moved = (target - self.scroll).abs() > f64::EPSILON;
        self.scroll = target;
        moved
    }

    /// Start a linear scroll animation from the current offset
    pub fn animate_to(&mut self, offset: f64, now: Duration, duration: Duration) {
        let to = offset.clamp(0.0, self.max_scroll());
        log::trace!(
            "Scroll animation {:.0} -> {:.0} over {}ms",
            self.scroll,
            to,
            duration.as_millis()
        );
        self.animation = Some(ScrollAnimation {
            from: self.scroll,
            to,
            start: now,
            duration,
        });
    }

    /// Step the running animation to `now`; returns true if the page scrolled
    pub fn advance(&mut self, now: Duration) -> bool {
        let Some(animation) = self.animation else {
            return false;
        };
        let (offset, done) = animation.offset_at(now);
        if done {
            self.animation = None;
        }
        let moved = (offset - self.scroll).abs() > f64::EPSILON;
        self.scroll = offset;
        moved
    }

    /// Apply a viewport change, optionally with a new layout
    pub fn resize(
        &mut self,
        viewport_height: f64,
        header_height: Option<f64>,
        sections: &[SectionConfig],
    ) {
        self.viewport_height = viewport_height;
        self.header_height = header_height;
        if !sections.is_empty() {
            self.sections = sections.iter().map(SectionConfig::to_layout).collect();
        }
        self.scroll = self.scroll.min(self.max_scroll());
    }
}

impl PageLayout for SimulatedPage {
    fn section_bounds(&self, id: &SectionId) -> section_tracker::Result<SectionBounds> {
        self.sections
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, bounds)| *bounds)
            .ok_or_else(|| TrackerError::MissingSection(id.clone()))
    }

    fn viewport(&self, fallback_header_height: f64) -> section_tracker::Result<Viewport> {
        Ok(Viewport::new(
            self.scroll,
            self.viewport_height,
            self.header_height.unwrap_or(fallback_header_height),
        ))
    }

    fn scroll_to(&mut self, offset: f64) {
        self.animate_to(offset, self.now, self.smooth_scroll);
    }
}
