//! Change subscribers
//!
//! The page-side reactions to an active section change: nav link
//! highlighting, the URL fragment, and the screen-reader announcement. Each
//! one only sees [`SectionChange`] notifications; none of them can reach the
//! tracker's state.

use crate::config::{LocationConfig, NavLinkConfig};
use section_tracker::{duration_millis, ActiveSectionTracker, ChangeCause, SectionChange};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// How long an announcement stays in the live region
pub const ANNOUNCEMENT_TTL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Serialize)]
pub struct NavLink {
    pub href: String,
    pub label: String,
    pub mobile: bool,
    pub active: bool,
}

/// Marks exactly the links pointing at the active section
#[derive(Debug, Clone, Default)]
pub struct NavHighlighter {
    links: Vec<NavLink>,
}

impl NavHighlighter {
    pub fn new(links: &[NavLinkConfig]) -> Self {
        Self {
            links: links
                .iter()
                .map(|link| NavLink {
                    href: link.href.clone(),
                    label: link
                        .label
                        .clone()
                        .unwrap_or_else(|| link.href.trim_start_matches('#').to_string()),
                    mobile: link.mobile,
                    active: false,
                })
                .collect(),
        }
    }

    /// Highlight the links for a section without waiting for a change
    pub fn highlight(&mut self, fragment: &str) {
        for link in &mut self.links {
            link.active = link.href == fragment;
        }
    }

    pub fn apply(&mut self, change: &SectionChange) {
        self.highlight(&change.current.fragment());
        for link in self.links.iter().filter(|link| link.active) {
            log::debug!(
                "{} nav activated: {}",
                if link.mobile { "Mobile" } else { "Desktop" },
                link.href
            );
        }
    }

    pub fn links(&self) -> &[NavLink] {
        &self.links
    }

    pub fn active_hrefs(&self) -> Vec<String> {
        self.links
            .iter()
            .filter(|link| link.active)
            .map(|link| link.href.clone())
            .collect()
    }
}

/// Keeps the location fragment in sync, replacing rather than pushing history
#[derive(Debug, Clone)]
pub struct FragmentUpdater {
    base: String,
    url: String,
    replacements: usize,
}

impl FragmentUpdater {
    pub fn new(location: &LocationConfig) -> Self {
        let base = format!("{}{}", location.path, location.query);
        Self {
            url: base.clone(),
            base,
            replacements: 0,
        }
    }

    pub fn apply(&mut self, change: &SectionChange) {
        self.url = format!("{}{}", self.base, change.current.fragment());
        self.replacements += 1;
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn replacements(&self) -> usize {
        self.replacements
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Announcement {
    pub text: String,
    pub at_ms: u64,
    pub expires_ms: u64,
}

/// Polite live-region announcements for navigation-driven changes
#[derive(Debug, Clone, Default)]
pub struct Announcer {
    announcements: Vec<Announcement>,
}

impl Announcer {
    pub fn apply(&mut self, change: &SectionChange) {
        if change.cause != ChangeCause::Navigation {
            return;
        }
        let at = change.at;
        self.announcements.push(Announcement {
            text: format!("Navigated to {} section", change.current),
            at_ms: duration_millis(at),
            expires_ms: duration_millis(at.saturating_add(ANNOUNCEMENT_TTL)),
        });
    }

    /// Announcements still in the live region at `now`
    pub fn live(&self, now: Duration) -> Vec<&Announcement> {
        let now_ms = duration_millis(now);
        self.announcements
            .iter()
            .filter(|a| a.at_ms <= now_ms && now_ms < a.expires_ms)
            .collect()
    }

    pub fn announcements(&self) -> &[Announcement] {
        &self.announcements
    }
}

/// Everything that reacts to section changes on the simulated page
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub nav: NavHighlighter,
    pub fragment: FragmentUpdater,
    pub announcer: Announcer,
    /// Changes not yet picked up by the replay loop
    pub pending: Vec<SectionChange>,
}

impl Collaborators {
    pub fn new(links: &[NavLinkConfig], location: &LocationConfig) -> Self {
        Self {
            nav: NavHighlighter::new(links),
            fragment: FragmentUpdater::new(location),
            announcer: Announcer::default(),
            pending: Vec::new(),
        }
    }

    pub fn take_pending(&mut self) -> Vec<SectionChange> {
        std::mem::take(&mut self.pending)
    }
}

/// Subscribe every collaborator to the tracker
///
/// Must be called again after each `observe`, since a rebuild releases the
/// previous subscriptions.
pub fn register(tracker: &mut ActiveSectionTracker, collaborators: &Rc<RefCell<Collaborators>>) {
    let nav = Rc::clone(collaborators);
    tracker.on_active_section_changed(move |change| nav.borrow_mut().nav.apply(change));

    let fragment = Rc::clone(collaborators);
    tracker.on_active_section_changed(move |change| fragment.borrow_mut().fragment.apply(change));

    let announcer = Rc::clone(collaborators);
    tracker.on_active_section_changed(move |change| announcer.borrow_mut().announcer.apply(change));

    let timeline = Rc::clone(collaborators);
    tracker.on_active_section_changed(move |change| {
        timeline.borrow_mut().pending.push(change.clone())
    });
}
