//! Session replay
//!
//! Drives the tracker the way a browser would: one animation frame every
//! `frame_interval_ms`, scroll events whenever the page moves, scripted user
//! actions at their timestamps. Changes are collected into a timeline along
//! with where the page was when they happened.

use crate::callbacks::{self, Announcement, Collaborators, NavLink};
use crate::config::{SessionConfig, StepConfig};
use crate::state::SimulatedPage;
use anyhow::{Context, Result};
use section_tracker::{duration_millis, ActiveSectionTracker, ChangeCause, TrackerStats};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// One active section change as seen by the page
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub at_ms: u64,
    pub from: Option<String>,
    pub to: String,
    pub cause: ChangeCause,
    pub scroll_offset: f64,
    pub scroll_progress: f64,
}

/// Everything a replay produced
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub name: String,
    pub final_section: Option<String>,
    pub final_scroll: f64,
    pub timeline: Vec<TimelineEntry>,
    pub nav_links: Vec<NavLink>,
    pub url: String,
    pub announcements: Vec<Announcement>,
    pub observed: Vec<String>,
    pub missing: Vec<String>,
    pub rejected_navigations: Vec<String>,
    pub rebuilds: usize,
    pub frames: u64,
    pub stats: TrackerStats,
}

struct Replay {
    page: SimulatedPage,
    tracker: ActiveSectionTracker,
    collaborators: Rc<RefCell<Collaborators>>,
    observe: Vec<String>,
    timeline: Vec<TimelineEntry>,
    rejected: Vec<String>,
    rebuilds: usize,
}

impl Replay {
    fn new(session: &SessionConfig) -> Result<Self> {
        let page = SimulatedPage::from_config(&session.page);
        let tracker = ActiveSectionTracker::new(session.tracker.settings.clone())
            .context("Failed to create tracker")?;
        let collaborators = Rc::new(RefCell::new(Collaborators::new(
            &session.nav_links,
            &session.location,
        )));

        let mut replay = Self {
            page,
            tracker,
            collaborators,
            observe: session.observed_sections(),
            timeline: Vec::new(),
            rejected: Vec::new(),
            rebuilds: 0,
        };
        replay.attach();
        Ok(replay)
    }

    /// Observe the configured sections and subscribe the page collaborators
    fn attach(&mut self) {
        self.tracker.observe(&self.page, self.observe.iter().map(String::as_str));
        callbacks::register(&mut self.tracker, &self.collaborators);

        // The highlight reflects the initial section before any change fires
        if let Some(current) = self.tracker.current_section() {
            self.collaborators
                .borrow_mut()
                .nav
                .highlight(&current.fragment());
        }
    }

    fn apply(&mut self, step: &StepConfig, now: Duration) {
        match step {
            StepConfig::Scroll {
                offset,
                duration_ms: Some(duration),
                ..
            } => {
                self.page
                    .animate_to(*offset, now, Duration::from_millis(*duration));
            }
            StepConfig::Scroll { offset, .. } => {
                if self.page.jump_to(*offset) {
                    self.tracker.handle_scroll(now);
                }
            }
            StepConfig::Navigate { section, .. } => {
                if !self
                    .tracker
                    .navigate_programmatically(&mut self.page, section.as_str(), now)
                {
                    self.rejected.push(section.clone());
                }
            }
            StepConfig::Resize {
                viewport_height,
                header_height,
                sections,
                ..
            } => {
                log::info!(
                    "Resize at {}ms: viewport {}, header {:?}",
                    now.as_millis(),
                    viewport_height,
                    header_height
                );
                self.page.resize(*viewport_height, *header_height, sections);
                self.tracker.teardown();
                self.attach();
                self.rebuilds += 1;
                self.tracker.detect_active(&self.page, now);
            }
            StepConfig::Idle { .. } => {}
        }
        self.collect();
    }

    fn frame(&mut self, now: Duration) {
        if self.page.advance(now) {
            self.tracker.handle_scroll(now);
        }
        self.tracker.on_animation_frame(&self.page, now);
        self.collect();
    }

    /// Move changes delivered to the collaborators onto the timeline
    fn collect(&mut self) {
        let changes = self.collaborators.borrow_mut().take_pending();
        for change in changes {
            self.timeline.push(TimelineEntry {
                at_ms: duration_millis(change.at),
                from: change.previous.map(|id| id.to_string()),
                to: change.current.to_string(),
                cause: change.cause,
                scroll_offset: self.page.scroll_offset(),
                scroll_progress: self.page.scroll_progress(),
            });
        }
    }
}

/// Replay a session and report what happened
pub fn replay(name: &str, session: &SessionConfig) -> Result<SessionOutcome> {
    log::info!("Replaying session: {}", name);

    let frame_interval = Duration::from_millis(session.page.frame_interval_ms);
    let settings = &session.tracker.settings;
    // Leave room for the last animation, window and trailing pass to play out
    let end = Duration::from_millis(
        session
            .last_step_ms()
            .saturating_add(session.page.smooth_scroll_ms)
            .saturating_add(settings.suppression_window_ms)
            .saturating_add(settings.settle_delay_ms),
    )
    .saturating_add(frame_interval.saturating_mul(2));

    let mut replay = Replay::new(session)?;
    replay.tracker.detect_active(&replay.page, Duration::ZERO);
    replay.collect();

    let steps = session.ordered_steps();
    let mut next_step = steps.iter().peekable();
    let mut now = Duration::ZERO;
    let mut frames = 0u64;

    while now <= end {
        replay.page.set_time(now);
        while let Some(step) = next_step.next_if(|step| Duration::from_millis(step.at_ms()) <= now) {
            log::trace!("Step at {}ms: {:?}", step.at_ms(), step);
            replay.apply(step, now);
        }
        replay.frame(now);
        frames += 1;
        now += frame_interval;
    }

    let configured = replay.tracker.configured_sections().to_vec();
    let resolved = replay.tracker.sections().to_vec();
    let missing: Vec<String> = configured
        .iter()
        .filter(|id| !resolved.contains(id))
        .map(|id| id.to_string())
        .collect();

    let collaborators = replay.collaborators.borrow();
    let outcome = SessionOutcome {
        name: name.to_string(),
        final_section: replay.tracker.current_section().map(|id| id.to_string()),
        final_scroll: replay.page.scroll_offset(),
        timeline: replay.timeline.clone(),
        nav_links: collaborators.nav.links().to_vec(),
        url: collaborators.fragment.url().to_string(),
        announcements: collaborators.announcer.announcements().to_vec(),
        observed: resolved.iter().map(|id| id.to_string()).collect(),
        missing,
        rejected_navigations: replay.rejected.clone(),
        rebuilds: replay.rebuilds,
        frames,
        stats: replay.tracker.stats(),
    };

    log::info!(
        "Session {} finished: {} change(s), final section {}",
        name,
        outcome.timeline.len(),
        outcome.final_section.as_deref().unwrap_or("none")
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(steps: &str) -> SessionConfig {
        let toml_content = format!(
            r##"
            [page]
            viewport_height = 800
            header_height = 80

            [[page.sections]]
            id = "home"
            top = 0
            height = 1000

            [[page.sections]]
            id = "about"
            top = 1000
            height = 1000

            [[page.sections]]
            id = "contact"
            top = 2000
            height = 1000

            [[nav_links]]
            href = "#home"

            [[nav_links]]
            href = "#about"

            [[nav_links]]
            href = "#contact"

            [[nav_links]]
            href = "#contact"
            mobile = true

            {}
            "##,
            steps
        );
        toml::from_str(&toml_content).unwrap()
    }

    #[test]
    fn test_idle_session_stays_home() {
        let outcome = replay("idle", &session("")).unwrap();
        assert!(outcome.timeline.is_empty());
        assert_eq!(outcome.final_section.as_deref(), Some("home"));
        assert_eq!(outcome.url, "/");
        let active: Vec<&str> = outcome
            .nav_links
            .iter()
            .filter(|l| l.active)
            .map(|l| l.href.as_str())
            .collect();
        assert_eq!(active, vec!["#home"]);
    }

    #[test]
    fn test_user_scroll_detected() {
        let outcome = replay(
            "scroll",
            &session(
                r#"
                [[steps]]
                action = "scroll"
                at_ms = 100
                offset = 950
                "#,
            ),
        )
        .unwrap();

        assert_eq!(outcome.timeline.len(), 1);
        let entry = &outcome.timeline[0];
        assert_eq!(entry.to, "about");
        assert_eq!(entry.from.as_deref(), Some("home"));
        assert_eq!(entry.cause, ChangeCause::Detected);
        assert_eq!(entry.scroll_offset, 950.0);
        assert_eq!(outcome.url, "/#about");
    }

    #[test]
    fn test_navigation_does_not_flicker() {
        let outcome = replay(
            "navigate",
            &session(
                r#"
                [[steps]]
                action = "navigate"
                at_ms = 100
                section = "contact"
                "#,
            ),
        )
        .unwrap();

        // The smooth scroll passes through "about" but only one change is seen
        assert_eq!(outcome.timeline.len(), 1);
        assert_eq!(outcome.timeline[0].to, "contact");
        assert_eq!(outcome.timeline[0].cause, ChangeCause::Navigation);
        assert_eq!(outcome.final_section.as_deref(), Some("contact"));
        assert_eq!(outcome.final_scroll, 1900.0);
        assert_eq!(outcome.announcements.len(), 1);
        assert_eq!(outcome.url, "/#contact");
        assert_eq!(outcome.nav_links.iter().filter(|l| l.active).count(), 2);
        assert!(outcome.stats.suppressed_passes > 0);
    }

    #[test]
    fn test_unknown_navigation_rejected() {
        let outcome = replay(
            "ghost",
            &session(
                r#"
                [[steps]]
                action = "navigate"
                at_ms = 0
                section = "ghost"
                "#,
            ),
        )
        .unwrap();
        assert_eq!(outcome.rejected_navigations, vec!["ghost"]);
        assert!(outcome.timeline.is_empty());
    }

    #[test]
    fn test_resize_rebuilds_tracker() {
        let outcome = replay(
            "resize",
            &session(
                r#"
                [[steps]]
                action = "scroll"
                at_ms = 0
                offset = 950

                [[steps]]
                action = "resize"
                at_ms = 500
                viewport_height = 800
                header_height = 120

                [[steps]]
                action = "scroll"
                at_ms = 600
                offset = 1700
                "#,
            ),
        )
        .unwrap();

        assert_eq!(outcome.rebuilds, 1);
        // Collaborators were re-registered: the post-resize scroll still reaches them
        assert_eq!(outcome.final_section.as_deref(), Some("contact"));
        assert_eq!(outcome.url, "/#contact");
        let path: Vec<&str> = outcome.timeline.iter().map(|e| e.to.as_str()).collect();
        assert_eq!(path, vec!["about", "contact"]);
    }

    #[test]
    fn test_bundled_portfolio_session() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("sessions/portfolio.toml");
        let session = crate::config::load_session(&path).unwrap();
        let outcome = replay("portfolio", &session).unwrap();

        assert_eq!(outcome.final_section.as_deref(), Some("about"));
        assert_eq!(outcome.rebuilds, 1);
        assert!(outcome.rejected_navigations.is_empty());
        assert_eq!(outcome.announcements.len(), 2);
        assert_eq!(outcome.announcements[1].text, "Navigated to about section");
        assert_eq!(outcome.url, "/#about");
    }

    #[test]
    fn test_missing_observed_section_reported() {
        let mut config = session("");
        config.tracker.observe = Some(vec!["home".into(), "blog".into()]);
        let outcome = replay("missing", &config).unwrap();
        assert_eq!(outcome.missing, vec!["blog"]);
        assert_eq!(outcome.observed, vec!["home"]);
    }
}
