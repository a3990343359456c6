//! Session file loading and parsing
//!
//! A session file describes a page (sections, viewport, header), the nav
//! links that highlight the active section, and a timed script of user
//! actions to replay against it.

use anyhow::{bail, ensure, Context, Result};
use section_tracker::{SectionBounds, SectionId, TrackerConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Latest step time a session may script (one hour of page time)
pub const MAX_STEP_MS: u64 = 60 * 60 * 1000;

/// A complete replay session (loaded from a TOML file)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    pub page: PageConfig,
    #[serde(default)]
    pub tracker: TrackerSection,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub nav_links: Vec<NavLinkConfig>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PageConfig {
    pub viewport_height: f64,
    /// None means the page has no header element
    pub header_height: Option<f64>,
    /// Defaults to the bottom of the lowest section
    pub document_height: Option<f64>,
    #[serde(default = "default_smooth_scroll")]
    pub smooth_scroll_ms: u64,
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
    pub sections: Vec<SectionConfig>,
}

fn default_smooth_scroll() -> u64 {
    600
}

fn default_frame_interval() -> u64 {
    16
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SectionConfig {
    pub id: String,
    pub top: f64,
    pub height: f64,
}

impl SectionConfig {
    pub fn to_layout(&self) -> (SectionId, SectionBounds) {
        (
            SectionId::new(self.id.clone()),
            SectionBounds::new(self.top, self.height),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrackerSection {
    #[serde(flatten)]
    pub settings: TrackerConfig,
    /// Section ids to observe; defaults to every page section in order
    pub observe: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocationConfig {
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub query: String,
}

fn default_path() -> String {
    "/".to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            query: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NavLinkConfig {
    pub href: String,
    pub label: Option<String>,
    #[serde(default)]
    pub mobile: bool,
}

/// One scripted action
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum StepConfig {
    /// User scroll; instant unless `duration_ms` is given
    Scroll {
        at_ms: u64,
        offset: f64,
        duration_ms: Option<u64>,
    },
    /// Click on an in-page link
    Navigate { at_ms: u64, section: String },
    /// Viewport or header change; `sections` replaces the layout when given
    Resize {
        at_ms: u64,
        viewport_height: f64,
        header_height: Option<f64>,
        #[serde(default)]
        sections: Vec<SectionConfig>,
    },
    /// Let frames run without input
    Idle { at_ms: u64 },
}

impl StepConfig {
    pub fn at_ms(&self) -> u64 {
        match self {
            StepConfig::Scroll { at_ms, .. }
            | StepConfig::Navigate { at_ms, .. }
            | StepConfig::Resize { at_ms, .. }
            | StepConfig::Idle { at_ms } => *at_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

impl SessionConfig {
    /// Section ids handed to the tracker
    pub fn observed_sections(&self) -> Vec<String> {
        match &self.tracker.observe {
            Some(ids) => ids.clone(),
            None => self.page.sections.iter().map(|s| s.id.clone()).collect(),
        }
    }

    /// Steps in replay order (stable for equal timestamps)
    pub fn ordered_steps(&self) -> Vec<StepConfig> {
        let mut steps = self.steps.clone();
        steps.sort_by_key(StepConfig::at_ms);
        steps
    }

    pub fn last_step_ms(&self) -> u64 {
        self.steps.iter().map(StepConfig::at_ms).max().unwrap_or(0)
    }

    /// Check the session for values the replay cannot work with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.page.viewport_height > 0.0,
            "page.viewport_height must be positive"
        );
        ensure!(
            self.page.frame_interval_ms > 0,
            "page.frame_interval_ms must be positive"
        );
        validate_sections(&self.page.sections).context("invalid [page] sections")?;

        self.tracker
            .settings
            .validate()
            .context("invalid [tracker] settings")?;

        for step in &self.steps {
            ensure!(
                step.at_ms() <= MAX_STEP_MS,
                "step at {}ms is past the {}ms session limit",
                step.at_ms(),
                MAX_STEP_MS
            );
            if let StepConfig::Resize {
                viewport_height,
                sections,
                ..
            } = step
            {
                ensure!(
                    *viewport_height > 0.0,
                    "resize at {}ms: viewport_height must be positive",
                    step.at_ms()
                );
                validate_sections(sections)
                    .with_context(|| format!("resize at {}ms", step.at_ms()))?;
            }
        }

        for link in &self.nav_links {
            if !link.href.starts_with('#') {
                log::warn!("Nav link {} is not an in-page link and will never be active", link.href);
            }
        }
        Ok(())
    }
}

fn validate_sections(sections: &[SectionConfig]) -> Result<()> {
    let mut seen = HashSet::new();
    for section in sections {
        if !seen.insert(section.id.as_str()) {
            bail!("duplicate section id: {}", section.id);
        }
        if !(section.height > 0.0) {
            log::warn!(
                "Section {} has height {}; it cannot be measured",
                section.id,
                section.height
            );
        }
    }
    Ok(())
}

/// Load a session from a TOML file
pub fn load_session(path: &Path) -> Result<SessionConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file: {:?}", path))?;

    let session: SessionConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse session file: {:?}", path))?;

    session
        .validate()
        .with_context(|| format!("Invalid session file: {:?}", path))?;

    Ok(session)
}
