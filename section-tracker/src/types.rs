//! Core types for the section tracker library
//!
//! This module defines the values the tracker reads from the host page
//! (section bounds, viewport samples) and the notifications it emits when the
//! active section changes. None of these types own page state; they are
//! snapshots taken at the time of a detection pass.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Identifier of a page section (the element id, without the leading `#`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(String);

impl SectionId {
    /// Create a new section identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The in-page link target for this section (`#id`)
    pub fn fragment(&self) -> String {
        format!("#{}", self.0)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for SectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Position of a section in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionBounds {
    /// Distance from the top of the document to the top of the section
    pub top: f64,
    /// Rendered height of the section
    pub height: f64,
}

impl SectionBounds {
    /// Create new bounds
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    /// Bottom edge in page coordinates
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Vertical center in page coordinates
    pub fn center(&self) -> f64 {
        self.top + self.height / 2.0
    }

    /// Reject bounds that cannot yield a visibility ratio
    pub fn validate(&self) -> Result<()> {
        if !self.top.is_finite() || !self.height.is_finite() || self.height <= 0.0 {
            return Err(TrackerError::Measurement(format!(
                "invalid section bounds: top={}, height={}",
                self.top, self.height
            )));
        }
        Ok(())
    }
}

/// A single sample of the scroll position and viewport geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Current vertical scroll offset of the document
    pub scroll_offset: f64,
    /// Height of the visible area
    pub viewport_height: f64,
    /// Height of the fixed header covering the top of the viewport
    pub header_height: f64,
}

impl Viewport {
    /// Create a new viewport sample
    pub fn new(scroll_offset: f64, viewport_height: f64, header_height: f64) -> Self {
        Self {
            scroll_offset,
            viewport_height,
            header_height,
        }
    }

    /// Page coordinate of the middle of the viewport
    pub fn center(&self) -> f64 {
        self.scroll_offset + self.viewport_height / 2.0
    }

    /// First page coordinate not hidden behind the header
    pub fn visible_top(&self) -> f64 {
        self.scroll_offset + self.header_height
    }

    /// Last visible page coordinate
    pub fn visible_bottom(&self) -> f64 {
        self.scroll_offset + self.viewport_height
    }

    /// Reject samples taken before the host layout was ready
    pub fn validate(&self) -> Result<()> {
        let finite = self.scroll_offset.is_finite()
            && self.viewport_height.is_finite()
            && self.header_height.is_finite();
        if !finite || self.viewport_height <= 0.0 || self.header_height < 0.0 {
            return Err(TrackerError::Measurement(format!(
                "invalid viewport: scroll={}, height={}, header={}",
                self.scroll_offset, self.viewport_height, self.header_height
            )));
        }
        Ok(())
    }
}

/// What caused the active section to change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCause {
    /// Scroll-driven detection picked a new section
    Detected,
    /// An in-page link forced the section
    Navigation,
}

impl fmt::Display for ChangeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeCause::Detected => f.write_str("detected"),
            ChangeCause::Navigation => f.write_str("navigation"),
        }
    }
}

/// Notification delivered to subscribers when the active section changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionChange {
    /// Newly active section
    pub current: SectionId,
    /// Section that was active before (None on the very first activation)
    pub previous: Option<SectionId>,
    /// Why the change happened
    pub cause: ChangeCause,
    /// Host timestamp of the pass that produced the change
    #[serde(with = "millis")]
    pub at: Duration,
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(super::duration_millis(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Errors that can occur while tracking sections
///
/// None of these are fatal: the tracker logs them and keeps its previous
/// active section.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    #[error("Section not found: {0}")]
    MissingSection(SectionId),

    #[error("Measurement unavailable: {0}")]
    Measurement(String),

    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),
}
