//! Report generation
//!
//! Renders replay outcomes as an ASCII report or as JSON, to stdout or into
//! an output directory.

use crate::config::OutputFormat;
use crate::events::SessionOutcome;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const RULE: &str = "═══════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────";

/// Render one outcome as a plain-text report
pub fn render_txt(outcome: &SessionOutcome) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_txt(&mut out, outcome);
    out
}

fn write_txt(out: &mut String, outcome: &SessionOutcome) -> std::fmt::Result {
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    writeln!(out, "{}", RULE)?;
    writeln!(out, "  Section Tracker Replay - {}", outcome.name)?;
    writeln!(out, "  Generated {}", generated)?;
    writeln!(out, "{}\n", RULE)?;

    writeln!(out, "Sections observed: {}", outcome.observed.join(", "))?;
    if !outcome.missing.is_empty() {
        writeln!(out, "Sections missing:  {}", outcome.missing.join(", "))?;
    }
    if !outcome.rejected_navigations.is_empty() {
        writeln!(
            out,
            "Rejected links:    {}",
            outcome.rejected_navigations.join(", ")
        )?;
    }
    writeln!(out, "Rebuilds:          {}", outcome.rebuilds)?;
    writeln!(out, "Frames:            {}", outcome.frames)?;

    writeln!(out, "\nTimeline")?;
    writeln!(out, "{}", THIN_RULE)?;
    if outcome.timeline.is_empty() {
        writeln!(out, "  (no changes)")?;
    } else {
        writeln!(
            out,
            "  {:>7}  {:<12} {:<12} {:<10} {:>8} {:>6}",
            "time", "from", "to", "cause", "scroll", "%"
        )?;
        for entry in &outcome.timeline {
            writeln!(
                out,
                "  {:>5}ms  {:<12} {:<12} {:<10} {:>8.0} {:>5.1}%",
                entry.at_ms,
                entry.from.as_deref().unwrap_or("-"),
                entry.to,
                entry.cause.to_string(),
                entry.scroll_offset,
                entry.scroll_progress
            )?;
        }
    }

    writeln!(out, "\nFinal state")?;
    writeln!(out, "{}", THIN_RULE)?;
    writeln!(
        out,
        "  Active section: {}",
        outcome.final_section.as_deref().unwrap_or("none")
    )?;
    writeln!(out, "  Scroll offset:  {:.0}", outcome.final_scroll)?;
    writeln!(out, "  URL:            {}", outcome.url)?;
    for link in &outcome.nav_links {
        writeln!(
            out,
            "  [{}] {:<8} {:<16} {}",
            if link.active { "x" } else { " " },
            if link.mobile { "mobile" } else { "desktop" },
            link.label,
            link.href
        )?;
    }

    if !outcome.announcements.is_empty() {
        writeln!(out, "\nAnnouncements")?;
        writeln!(out, "{}", THIN_RULE)?;
        for announcement in &outcome.announcements {
            writeln!(
                out,
                "  {:>5}ms  {}",
                announcement.at_ms, announcement.text
            )?;
        }
    }

    let stats = &outcome.stats;
    writeln!(out, "\nTracker")?;
    writeln!(out, "{}", THIN_RULE)?;
    writeln!(out, "  Passes:     {}", stats.passes)?;
    writeln!(out, "  Suppressed: {}", stats.suppressed_passes)?;
    writeln!(out, "  Skipped:    {}", stats.skipped_passes)?;
    writeln!(out, "  Changes:    {}", stats.changes)?;

    Ok(())
}

/// Render outcomes as pretty-printed JSON
pub fn render_json(outcomes: &[SessionOutcome]) -> Result<String> {
    serde_json::to_string_pretty(outcomes).context("Failed to serialize report")
}

/// File name for one session's report
pub fn report_path(dir: &Path, outcome: &SessionOutcome, format: OutputFormat) -> PathBuf {
    let extension = match format {
        OutputFormat::Txt => "txt",
        OutputFormat::Json => "json",
    };
    dir.join(format!("{}.{}", outcome.name, extension))
}

/// Write one session's report into `dir`
pub fn write_report(dir: &Path, outcome: &SessionOutcome, format: OutputFormat) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let content = match format {
        OutputFormat::Txt => render_txt(outcome),
        OutputFormat::Json => render_json(std::slice::from_ref(outcome))?,
    };
    let path = report_path(dir, outcome, format);
    fs::write(&path, content).with_context(|| format!("Failed to write report: {:?}", path))?;
    log::info!("Report written: {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{Announcement, NavLink};
    use crate::events::TimelineEntry;
    use section_tracker::{ChangeCause, TrackerStats};

    fn outcome() -> SessionOutcome {
        SessionOutcome {
            name: "demo".to_string(),
            final_section: Some("contact".to_string()),
            final_scroll: 1900.0,
            timeline: vec![TimelineEntry {
                at_ms: 112,
                from: Some("home".to_string()),
                to: "contact".to_string(),
                cause: ChangeCause::Navigation,
                scroll_offset: 0.0,
                scroll_progress: 0.0,
            }],
            nav_links: vec![NavLink {
                href: "#contact".to_string(),
                label: "contact".to_string(),
                mobile: false,
                active: true,
            }],
            url: "/#contact".to_string(),
            announcements: vec![Announcement {
                text: "Navigated to contact section".to_string(),
                at_ms: 112,
                expires_ms: 1112,
            }],
            observed: vec!["home".to_string(), "contact".to_string()],
            missing: vec!["blog".to_string()],
            rejected_navigations: Vec::new(),
            rebuilds: 0,
            frames: 120,
            stats: TrackerStats::default(),
        }
    }

    #[test]
    fn test_txt_report_sections() {
        let report = render_txt(&outcome());
        assert!(report.contains("Section Tracker Replay - demo"));
        assert!(report.contains("Sections missing:  blog"));
        assert!(report.contains("navigation"));
        assert!(report.contains("URL:            /#contact"));
        assert!(report.contains("Navigated to contact section"));
        assert!(!report.contains("Rejected links"));
    }

    #[test]
    fn test_json_report() {
        let json = render_json(&[outcome()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["final_section"], "contact");
        assert_eq!(value[0]["timeline"][0]["cause"], "navigation");
        assert_eq!(value[0]["timeline"][0]["at_ms"], 112);
    }

    #[test]
    fn test_write_report_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report(dir.path(), &outcome(), OutputFormat::Json).unwrap();
        assert_eq!(path.file_name().unwrap(), "demo.json");
        assert!(fs::read_to_string(path).unwrap().contains("\"url\": \"/#contact\""));
    }
}
