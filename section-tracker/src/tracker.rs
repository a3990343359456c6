//! The active section tracker
//!
//! [`ActiveSectionTracker`] owns the only mutable state of the library: which
//! section is active and whether passive detection is currently suppressed.
//! The host page feeds it scroll events and animation frames and reads layout
//! on its behalf through [`PageLayout`]; the tracker reports changes to its
//! subscribers.
//!
//! # Lifecycle
//!
//! ```text
//! new -> observe -> (handle_scroll / on_animation_frame / navigate)* -> teardown
//!          ^                                                              |
//!          |______________________ observe again (resize) ________________|
//! ```

use crate::config::TrackerConfig;
use crate::detection;
use crate::layout::{measure_all, PageLayout};
use crate::schedule::{ScrollCoalescer, SuppressionWindow};
use crate::types::{ChangeCause, Result, SectionChange, SectionId, TrackerError};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

/// Callback invoked on every active section change
pub type ChangeCallback = Box<dyn FnMut(&SectionChange)>;

/// Handle returned by [`ActiveSectionTracker::on_active_section_changed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Counters describing what the tracker has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    /// Detection passes that measured the page
    pub passes: u64,
    /// Passes skipped because a measurement was unavailable
    pub skipped_passes: u64,
    /// Passes ignored inside a suppression window
    pub suppressed_passes: u64,
    /// Active section changes delivered to subscribers
    pub changes: u64,
}

/// Decides which section is active and notifies subscribers on change
pub struct ActiveSectionTracker {
    config: TrackerConfig,
    /// Ids passed to the last `observe`, in order
    configured: Vec<SectionId>,
    /// Ids that resolved to a layout region, in configured order
    sections: Vec<SectionId>,
    current: Option<SectionId>,
    listening: bool,
    suppression: SuppressionWindow,
    coalescer: ScrollCoalescer,
    subscribers: Vec<(SubscriptionId, ChangeCallback)>,
    next_subscription: u64,
    /// Missing ids already reported for this tracker
    warned_missing: HashSet<SectionId>,
    /// Sections currently left out of detection passes
    unmeasured: HashSet<SectionId>,
    stats: TrackerStats,
}

impl ActiveSectionTracker {
    /// Create a tracker; it does nothing until [`observe`](Self::observe) is called
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let coalescer = ScrollCoalescer::new(config.settle_delay());

        Ok(Self {
            config,
            configured: Vec::new(),
            sections: Vec::new(),
            current: None,
            listening: false,
            suppression: SuppressionWindow::new(),
            coalescer,
            subscribers: Vec::new(),
            next_subscription: 0,
            warned_missing: HashSet::new(),
            unmeasured: HashSet::new(),
            stats: TrackerStats::default(),
        })
    }

    /// Start (or restart) tracking the given sections
    ///
    /// Sections are resolved against the layout once; ids without a region
    /// are skipped until the next `observe`. An already listening tracker is
    /// torn down first, which drops its subscribers.
    ///
    /// Returns the number of sections that resolved.
    pub fn observe<L, I, S>(&mut self, layout: &L, sections: I) -> usize
    where
        L: PageLayout + ?Sized,
        I: IntoIterator<Item = S>,
        S: Into<SectionId>,
    {
        if self.listening {
            log::debug!("Re-initializing tracker, tearing down previous observation");
            self.teardown();
        }

        self.configured.clear();
        self.sections.clear();

        for id in sections {
            let id: SectionId = id.into();
            if self.configured.contains(&id) {
                log::warn!("Section listed twice, ignoring duplicate: {}", id);
                continue;
            }
            self.configured.push(id.clone());

            match layout.section_bounds(&id) {
                Ok(_) => {
                    log::debug!("Observing section: {}", id);
                    self.sections.push(id);
                }
                Err(TrackerError::MissingSection(_)) => {
                    if self.warned_missing.insert(id.clone()) {
                        log::warn!("Section not found: {}", id);
                    } else {
                        log::debug!("Section still missing: {}", id);
                    }
                }
                Err(e) => {
                    // The region exists; it may measure fine on a later pass
                    log::debug!("Observing section {} with unavailable layout: {}", id, e);
                    self.sections.push(id);
                }
            }
        }

        let keep_current = matches!(&self.current, Some(id) if self.sections.contains(id));
        if !keep_current {
            self.current = self
                .config
                .default_section
                .clone()
                .filter(|id| self.sections.contains(id))
                .or_else(|| self.sections.first().cloned())
                .or_else(|| self.configured.first().cloned());
        }

        self.coalescer.reset();
        self.unmeasured.clear();
        self.listening = true;

        log::info!(
            "Tracking {} of {} sections, active: {}",
            self.sections.len(),
            self.configured.len(),
            self.current.as_ref().map_or("none", SectionId::as_str)
        );
        self.sections.len()
    }

    /// Stop listening and release every subscription
    ///
    /// Pending frame and trailing passes are dropped. The active section and
    /// any open suppression window survive so a rebuild picks up where the
    /// page left off.
    pub fn teardown(&mut self) {
        if !self.listening && self.subscribers.is_empty() {
            return;
        }
        self.listening = false;
        self.coalescer.reset();
        let released = self.subscribers.len();
        self.subscribers.clear();
        log::info!("Tracker torn down, released {} subscription(s)", released);
    }

    /// Register a callback for active section changes
    ///
    /// Callbacks run synchronously, in registration order, in the order the
    /// changes happen.
    pub fn on_active_section_changed<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&SectionChange) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback; returns false if it was already gone
    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(id, _)| *id != subscription);
        self.subscribers.len() != before
    }

    /// Note a scroll event; detection runs on the next animation frame
    pub fn handle_scroll(&mut self, now: Duration) {
        if self.listening {
            self.coalescer.record_scroll(now);
        }
    }

    /// Run whatever detection is due on this animation frame
    ///
    /// At most one pass runs per frame: for scrolls recorded since the last
    /// frame, for the trailing pass once scrolling has settled, or to catch up
    /// after a suppression window closes.
    pub fn on_animation_frame<L>(&mut self, layout: &L, now: Duration) -> Option<SectionId>
    where
        L: PageLayout + ?Sized,
    {
        if !self.listening {
            return self.current.clone();
        }

        if self.suppression.expire(now) {
            log::debug!("Suppression window elapsed at {}ms", now.as_millis());
            self.coalescer.request_pass();
        }

        let frame = self.coalescer.take_frame();
        let trailing = self.coalescer.take_trailing(now);
        if frame || trailing {
            if trailing && !frame {
                log::trace!("Trailing detection pass at {}ms", now.as_millis());
            }
            self.detect_active(layout, now)
        } else {
            self.current.clone()
        }
    }

    /// Run one detection pass and return the active section
    ///
    /// Does nothing while torn down, while suppressed, with no resolved
    /// sections, or when neither the viewport nor any section can be
    /// measured; in all those cases the previous active section is kept.
    /// Sections that cannot be measured on their own sit out the pass.
    pub fn detect_active<L>(&mut self, layout: &L, now: Duration) -> Option<SectionId>
    where
        L: PageLayout + ?Sized,
    {
        if !self.listening || self.sections.is_empty() {
            return self.current.clone();
        }
        if self.suppression.is_active(now) {
            self.stats.suppressed_passes += 1;
            log::trace!("Detection suppressed at {}ms", now.as_millis());
            return self.current.clone();
        }

        let sample = layout
            .viewport(self.config.fallback_header_height)
            .and_then(|viewport| viewport.validate().map(|_| viewport))
            .and_then(|viewport| Ok((viewport, measure_all(layout, &self.sections)?)));
        let (viewport, sample) = match sample {
            Ok(sample) => sample,
            Err(e) => {
                self.stats.skipped_passes += 1;
                log::debug!("Detection pass skipped: {}", e);
                return self.current.clone();
            }
        };

        for (id, e) in &sample.dropped {
            if self.unmeasured.insert(id.clone()) {
                log::debug!("Leaving section {} out of detection: {}", id, e);
            }
        }
        for (id, _) in &sample.measured {
            self.unmeasured.remove(id);
        }

        self.stats.passes += 1;
        let next = detection::detect(
            &sample.measured,
            &viewport,
            self.config.visibility_threshold,
            self.current.as_ref(),
        );

        if let Some(next) = next {
            if self.current.as_ref() != Some(&next) {
                log::debug!(
                    "Detected section {} at scroll {:.0}",
                    next,
                    viewport.scroll_offset
                );
                self.activate(next, ChangeCause::Detected, now);
            }
        }
        self.current.clone()
    }

    /// Jump to a section from an in-page link
    ///
    /// The section becomes active immediately, the page is asked to scroll to
    /// it, and passive detection is suppressed for the configured window so
    /// the scroll animation does not flip the highlight through the sections
    /// it passes. Navigating again during the window restarts it.
    ///
    /// Returns false, changing nothing, if the section is not tracked or
    /// cannot be measured.
    pub fn navigate_programmatically<L>(
        &mut self,
        layout: &mut L,
        id: impl Into<SectionId>,
        now: Duration,
    ) -> bool
    where
        L: PageLayout + ?Sized,
    {
        let id = id.into();
        if !self.listening {
            log::warn!("Navigation to {} ignored, tracker is not listening", id);
            return false;
        }
        if !self.sections.contains(&id) {
            log::warn!("Cannot navigate to untracked section: {}", id);
            return false;
        }

        let bounds = match layout.section_bounds(&id).and_then(|b| b.validate().map(|_| b)) {
            Ok(bounds) => bounds,
            Err(e) => {
                log::warn!("Cannot navigate to {}: {}", id, e);
                return false;
            }
        };
        let header_height = layout
            .viewport(self.config.fallback_header_height)
            .map(|viewport| viewport.header_height)
            .unwrap_or(self.config.fallback_header_height);

        self.suppression.suppress(now, self.config.suppression_window());

        if self.current.as_ref() != Some(&id) {
            self.activate(id.clone(), ChangeCause::Navigation, now);
        }

        let target = (bounds.top - header_height - self.config.scroll_margin).max(0.0);
        layout.scroll_to(target);
        log::info!("Navigated to: {} (scroll target {:.0})", id, target);
        true
    }

    fn activate(&mut self, next: SectionId, cause: ChangeCause, now: Duration) {
        let previous = self.current.replace(next.clone());
        self.stats.changes += 1;
        log::debug!(
            "Section changed: {} -> {} ({})",
            previous.as_ref().map_or("none", SectionId::as_str),
            next,
            cause
        );

        let change = SectionChange {
            current: next,
            previous,
            cause,
            at: now,
        };
        for (_, callback) in self.subscribers.iter_mut() {
            callback(&change);
        }
    }

    /// The active section, if any
    pub fn current_section(&self) -> Option<&SectionId> {
        self.current.as_ref()
    }

    /// Whether passive detection is disabled at `now`
    pub fn is_suppressed(&self, now: Duration) -> bool {
        self.suppression.is_active(now)
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Sections that resolved during the last `observe`, in order
    pub fn sections(&self) -> &[SectionId] {
        &self.sections
    }

    /// Sections passed to the last `observe`, including unresolved ones
    pub fn configured_sections(&self) -> &[SectionId] {
        &self.configured
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SectionBounds, Viewport};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FakePage {
        sections: Vec<(SectionId, SectionBounds)>,
        scroll: f64,
        viewport_height: f64,
        header: Option<f64>,
        ready: bool,
        scrolled_to: Vec<f64>,
    }

    impl FakePage {
        fn new() -> Self {
            Self {
                sections: vec![
                    ("home".into(), SectionBounds::new(0.0, 1000.0)),
                    ("about".into(), SectionBounds::new(1000.0, 1000.0)),
                    ("contact".into(), SectionBounds::new(2000.0, 1000.0)),
                ],
                scroll: 0.0,
                viewport_height: 800.0,
                header: Some(80.0),
                ready: true,
                scrolled_to: Vec::new(),
            }
        }
    }

    impl PageLayout for FakePage {
        fn section_bounds(&self, id: &SectionId) -> Result<SectionBounds> {
            if !self.ready {
                return Err(TrackerError::Measurement("layout not ready".into()));
            }
            self.sections
                .iter()
                .find(|(candidate, _)| candidate == id)
                .map(|(_, bounds)| *bounds)
                .ok_or_else(|| TrackerError::MissingSection(id.clone()))
        }

        fn viewport(&self, fallback_header_height: f64) -> Result<Viewport> {
            Ok(Viewport::new(
                self.scroll,
                self.viewport_height,
                self.header.unwrap_or(fallback_header_height),
            ))
        }

        fn scroll_to(&mut self, offset: f64) {
            self.scrolled_to.push(offset);
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn recorder(tracker: &mut ActiveSectionTracker) -> Rc<RefCell<Vec<SectionChange>>> {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        tracker.on_active_section_changed(move |change| sink.borrow_mut().push(change.clone()));
        changes
    }

    fn tracker_for(page: &FakePage) -> ActiveSectionTracker {
        let mut tracker = ActiveSectionTracker::new(TrackerConfig::default()).unwrap();
        tracker.observe(page, ["home", "about", "contact"]);
        tracker
    }

    #[test]
    fn test_observe_skips_missing_sections() {
        let page = FakePage::new();
        let mut tracker = ActiveSectionTracker::new(TrackerConfig::default()).unwrap();
        let resolved = tracker.observe(&page, ["home", "ghost", "about", "home"]);

        assert_eq!(resolved, 2);
        assert_eq!(tracker.sections(), &["home".into(), "about".into()]);
        assert_eq!(tracker.configured_sections().len(), 3);
        assert_eq!(tracker.current_section(), Some(&"home".into()));
    }

    #[test]
    fn test_default_section_from_config() {
        let page = FakePage::new();
        let config = TrackerConfig::new().with_default_section("about");
        let mut tracker = ActiveSectionTracker::new(config).unwrap();
        tracker.observe(&page, ["home", "about"]);
        assert_eq!(tracker.current_section(), Some(&"about".into()));
    }

    #[test]
    fn test_unresolved_default_section_ignored() {
        let page = FakePage::new();
        let config = TrackerConfig::new().with_default_section("ghost");
        let mut tracker = ActiveSectionTracker::new(config).unwrap();
        tracker.observe(&page, ["home", "about"]);
        let changes = recorder(&mut tracker);

        assert_eq!(tracker.current_section(), Some(&"home".into()));
        assert_eq!(tracker.detect_active(&page, ms(0)), Some("home".into()));
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn test_collapsed_section_left_out_of_pass() {
        let mut page = FakePage::new();
        page.sections
            .insert(1, ("hidden".into(), SectionBounds::new(1000.0, 0.0)));
        let mut tracker = ActiveSectionTracker::new(TrackerConfig::default()).unwrap();
        assert_eq!(tracker.observe(&page, ["home", "hidden", "about"]), 3);

        page.scroll = 950.0;
        assert_eq!(tracker.detect_active(&page, ms(0)), Some("about".into()));
        assert_eq!(tracker.detect_active(&page, ms(10)), Some("about".into()));
        assert_eq!(tracker.stats().passes, 2);
        assert_eq!(tracker.stats().skipped_passes, 0);
    }

    #[test]
    fn test_zero_sections_is_noop() {
        let page = FakePage::new();
        let mut tracker = ActiveSectionTracker::new(TrackerConfig::default()).unwrap();
        tracker.observe(&page, ["ghost"]);
        let changes = recorder(&mut tracker);

        assert_eq!(tracker.detect_active(&page, ms(0)), Some("ghost".into()));
        assert!(changes.borrow().is_empty());
        assert_eq!(tracker.stats().passes, 0);
    }

    #[test]
    fn test_detect_emits_once() {
        let mut page = FakePage::new();
        let mut tracker = tracker_for(&page);
        let changes = recorder(&mut tracker);

        page.scroll = 950.0;
        assert_eq!(tracker.detect_active(&page, ms(10)), Some("about".into()));
        assert_eq!(tracker.detect_active(&page, ms(20)), Some("about".into()));

        let changes = changes.borrow();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].current, "about".into());
        assert_eq!(changes[0].previous, Some("home".into()));
        assert_eq!(changes[0].cause, ChangeCause::Detected);
        assert_eq!(changes[0].at, ms(10));
    }

    #[test]
    fn test_measurement_error_keeps_previous() {
        let mut page = FakePage::new();
        let mut tracker = tracker_for(&page);
        let changes = recorder(&mut tracker);

        page.scroll = 2100.0;
        page.ready = false;
        assert_eq!(tracker.detect_active(&page, ms(0)), Some("home".into()));
        assert!(changes.borrow().is_empty());
        assert_eq!(tracker.stats().skipped_passes, 1);
    }

    #[test]
    fn test_unready_section_still_observed() {
        let mut page = FakePage::new();
        page.ready = false;
        let mut tracker = tracker_for(&page);
        assert_eq!(tracker.sections().len(), 3);

        page.ready = true;
        page.scroll = 2100.0;
        assert_eq!(tracker.detect_active(&page, ms(0)), Some("contact".into()));
    }

    #[test]
    fn test_navigation_suppresses_detection() {
        let mut page = FakePage::new();
        let mut tracker = tracker_for(&page);
        let changes = recorder(&mut tracker);

        assert!(tracker.navigate_programmatically(&mut page, "contact", ms(0)));
        assert_eq!(tracker.current_section(), Some(&"contact".into()));
        // 2000 - 80 header - 20 margin
        assert_eq!(page.scrolled_to, vec![1900.0]);

        // The page is still at the top, mid-animation
        page.scroll = 0.0;
        assert_eq!(tracker.detect_active(&page, ms(500)), Some("contact".into()));
        assert!(tracker.is_suppressed(ms(999)));

        // Once the window closes detection resumes
        assert_eq!(tracker.detect_active(&page, ms(1000)), Some("home".into()));

        let causes: Vec<ChangeCause> = changes.borrow().iter().map(|c| c.cause).collect();
        assert_eq!(causes, vec![ChangeCause::Navigation, ChangeCause::Detected]);
        assert_eq!(tracker.stats().suppressed_passes, 1);
    }

    #[test]
    fn test_second_navigation_resets_window() {
        let mut page = FakePage::new();
        let mut tracker = tracker_for(&page);

        tracker.navigate_programmatically(&mut page, "contact", ms(0));
        tracker.navigate_programmatically(&mut page, "about", ms(700));

        page.scroll = 0.0;
        // The first window would have ended at 1000ms
        assert_eq!(tracker.detect_active(&page, ms(1200)), Some("about".into()));
        assert_eq!(tracker.detect_active(&page, ms(1700)), Some("home".into()));
    }

    #[test]
    fn test_navigation_to_unknown_section() {
        let mut page = FakePage::new();
        let mut tracker = tracker_for(&page);
        let changes = recorder(&mut tracker);

        assert!(!tracker.navigate_programmatically(&mut page, "ghost", ms(0)));
        assert!(!tracker.is_suppressed(ms(0)));
        assert!(page.scrolled_to.is_empty());
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn test_navigation_target_clamped_at_top() {
        let mut page = FakePage::new();
        let mut tracker = tracker_for(&page);
        tracker.navigate_programmatically(&mut page, "home", ms(0));
        assert_eq!(page.scrolled_to, vec![0.0]);
    }

    #[test]
    fn test_frames_coalesce_scroll_bursts() {
        let mut page = FakePage::new();
        let mut tracker = tracker_for(&page);
        let changes = recorder(&mut tracker);

        page.scroll = 950.0;
        tracker.handle_scroll(ms(1));
        tracker.handle_scroll(ms(3));
        tracker.handle_scroll(ms(7));
        tracker.on_animation_frame(&page, ms(16));
        tracker.on_animation_frame(&page, ms(32));
        assert_eq!(tracker.stats().passes, 1);

        // Trailing pass once 150ms have passed since the last scroll
        tracker.on_animation_frame(&page, ms(160));
        assert_eq!(tracker.stats().passes, 2);
        tracker.on_animation_frame(&page, ms(400));
        assert_eq!(tracker.stats().passes, 2);

        assert_eq!(changes.borrow().len(), 1);
    }

    #[test]
    fn test_frame_after_suppression_catches_up() {
        let mut page = FakePage::new();
        let mut tracker = tracker_for(&page);

        tracker.navigate_programmatically(&mut page, "contact", ms(0));
        page.scroll = 950.0;
        tracker.on_animation_frame(&page, ms(16));
        assert_eq!(tracker.current_section(), Some(&"contact".into()));

        assert_eq!(tracker.on_animation_frame(&page, ms(1008)), Some("about".into()));
    }

    #[test]
    fn test_teardown_silences_subscribers() {
        let mut page = FakePage::new();
        let mut tracker = tracker_for(&page);
        let changes = recorder(&mut tracker);

        tracker.handle_scroll(ms(0));
        tracker.teardown();
        assert_eq!(tracker.subscriber_count(), 0);
        assert!(!tracker.is_listening());

        page.scroll = 2100.0;
        tracker.on_animation_frame(&page, ms(16));
        tracker.detect_active(&page, ms(20));
        assert!(!tracker.navigate_programmatically(&mut page, "about", ms(30)));
        assert!(changes.borrow().is_empty());
        assert_eq!(tracker.current_section(), Some(&"home".into()));
    }

    #[test]
    fn test_reobserve_keeps_active_section() {
        let mut page = FakePage::new();
        let mut tracker = tracker_for(&page);
        page.scroll = 950.0;
        tracker.detect_active(&page, ms(0));

        tracker.observe(&page, ["home", "about", "contact"]);
        assert_eq!(tracker.current_section(), Some(&"about".into()));

        tracker.observe(&page, ["home", "contact"]);
        assert_eq!(tracker.current_section(), Some(&"home".into()));
    }

    #[test]
    fn test_unsubscribe() {
        let mut page = FakePage::new();
        let mut tracker = tracker_for(&page);
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let id = tracker.on_active_section_changed(move |_| *counter.borrow_mut() += 1);

        assert!(tracker.unsubscribe(id));
        assert!(!tracker.unsubscribe(id));

        page.scroll = 950.0;
        tracker.detect_active(&page, ms(0));
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn test_fallback_header_height() {
        let mut page = FakePage::new();
        page.header = None;
        let config = TrackerConfig::new().with_fallback_header_height(120.0);
        let mut tracker = ActiveSectionTracker::new(config).unwrap();
        tracker.observe(&page, ["home", "about"]);

        tracker.navigate_programmatically(&mut page, "about", ms(0));
        assert_eq!(page.scrolled_to, vec![1000.0 - 120.0 - 20.0]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TrackerConfig::new().with_visibility_threshold(2.0);
        assert!(matches!(
            ActiveSectionTracker::new(config),
            Err(TrackerError::InvalidConfig(_))
        ));
    }
}
