//! Tracker configuration types
//!
//! Tuning knobs for detection and for the timing of scroll-driven passes.
//! Everything here has a default matching the behavior of a typical one-page
//! portfolio layout with a fixed header.

use crate::types::{duration_millis, Result, SectionId, TrackerError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the active section tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Minimum visibility ratio (exclusive) for the closest-to-center rule
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f64,

    /// How long passive detection stays disabled after an in-page navigation
    #[serde(default = "default_suppression_window_ms")]
    pub suppression_window_ms: u64,

    /// Quiet period after the last scroll event before the trailing pass runs
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Gap left between the header and a section when navigating to it
    #[serde(default = "default_scroll_margin")]
    pub scroll_margin: f64,

    /// Header height assumed when the page has no header element
    #[serde(default = "default_fallback_header_height")]
    pub fallback_header_height: f64,

    /// Section considered active before the first detection pass
    #[serde(default)]
    pub default_section: Option<SectionId>,
}

fn default_visibility_threshold() -> f64 {
    0.3
}

fn default_suppression_window_ms() -> u64 {
    1000
}

fn default_settle_delay_ms() -> u64 {
    150
}

fn default_scroll_margin() -> f64 {
    20.0
}

fn default_fallback_header_height() -> f64 {
    80.0
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: default_visibility_threshold(),
            suppression_window_ms: default_suppression_window_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            scroll_margin: default_scroll_margin(),
            fallback_header_height: default_fallback_header_height(),
            default_section: None,
        }
    }
}

impl TrackerConfig {
    /// Create a new tracker configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the visibility threshold
    pub fn with_visibility_threshold(mut self, threshold: f64) -> Self {
        self.visibility_threshold = threshold;
        self
    }

    /// Builder method: set the suppression window after navigation
    pub fn with_suppression_window(mut self, window: Duration) -> Self {
        self.suppression_window_ms = duration_millis(window);
        self
    }

    /// Builder method: set the settle delay for the trailing pass
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = duration_millis(delay);
        self
    }

    /// Builder method: set the navigation scroll margin
    pub fn with_scroll_margin(mut self, margin: f64) -> Self {
        self.scroll_margin = margin;
        self
    }

    /// Builder method: set the fallback header height
    pub fn with_fallback_header_height(mut self, height: f64) -> Self {
        self.fallback_header_height = height;
        self
    }

    /// Builder method: set the section active before the first pass
    pub fn with_default_section(mut self, id: impl Into<SectionId>) -> Self {
        self.default_section = Some(id.into());
        self
    }

    pub fn suppression_window(&self) -> Duration {
        Duration::from_millis(self.suppression_window_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Check that the values can drive detection
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.visibility_threshold) {
            return Err(TrackerError::InvalidConfig(format!(
                "visibility_threshold must be in [0, 1), got {}",
                self.visibility_threshold
            )));
        }
        if !self.scroll_margin.is_finite() {
            return Err(TrackerError::InvalidConfig(
                "scroll_margin must be finite".to_string(),
            ));
        }
        if !self.fallback_header_height.is_finite() || self.fallback_header_height < 0.0 {
            return Err(TrackerError::InvalidConfig(format!(
                "fallback_header_height must be a non-negative number, got {}",
                self.fallback_header_height
            )));
        }
        if self.suppression_window_ms == 0 {
            log::warn!("suppression_window_ms is 0; navigation will not suppress detection");
        }
        Ok(())
    }
}
