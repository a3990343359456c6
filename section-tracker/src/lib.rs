//! Section Tracker Library
//!
//! Decides which section of a one-page site is the *active* one (the one the
//! navigation should highlight) from the scroll position, the viewport and a
//! fixed header, and tells subscribers when that changes.
//!
//! # Architecture
//!
//! The library does not talk to a browser. The host page is reached through
//! the [`PageLayout`] trait and drives the tracker with timestamps:
//! - `handle_scroll` on every scroll event
//! - `on_animation_frame` once per repaint (detection runs here, coalesced)
//! - `navigate_programmatically` when an in-page link is clicked
//!
//! The library does NOT:
//! - Toggle link classes, rewrite the URL or announce changes
//! - Own timers or read a clock
//! - Cache layout between passes
//!
//! Those belong to the host and to the subscribers it registers
//! (see `section-tracker-cli` for a complete host).
//!
//! # Example Usage
//!
//! ```no_run
//! use section_tracker::{ActiveSectionTracker, PageLayout, TrackerConfig};
//! use std::time::Duration;
//!
//! fn wire<L: PageLayout>(page: &mut L) -> section_tracker::Result<()> {
//!     let mut tracker = ActiveSectionTracker::new(TrackerConfig::new())?;
//!     tracker.observe(&*page, ["home", "about", "contact"]);
//!     tracker.on_active_section_changed(|change| {
//!         println!("{:?} -> {}", change.previous, change.current);
//!     });
//!
//!     tracker.handle_scroll(Duration::from_millis(5));
//!     tracker.on_animation_frame(&*page, Duration::from_millis(16));
//!     tracker.navigate_programmatically(page, "contact", Duration::from_millis(40));
//!     Ok(())
//! }
//! ```

// Public modules
pub mod config;
pub mod detection;
pub mod layout;
pub mod schedule;
pub mod tracker;
pub mod types;

// Re-export main types for convenience
pub use config::TrackerConfig;
pub use layout::PageLayout;
pub use tracker::{ActiveSectionTracker, ChangeCallback, SubscriptionId, TrackerStats};
pub use types::{
    duration_millis, ChangeCause, Result, SectionBounds, SectionChange, SectionId, TrackerError,
    Viewport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
