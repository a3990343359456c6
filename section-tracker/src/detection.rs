//! Active section detection
//!
//! Pure geometry: given section bounds and one viewport sample, decide which
//! section best represents the reading position. Nothing in this module holds
//! state or touches the page.
//!
//! The decision is made in two rounds:
//! 1. Among sections whose visibility ratio is strictly above the threshold,
//!    the one whose center is closest to the viewport center wins.
//! 2. Otherwise the section with the highest non-zero ratio wins.
//!
//! Ties always go to the section that comes first in the configured order.
//! When nothing is visible at all the previous answer is kept.

use crate::types::{SectionBounds, SectionId, Viewport};

/// How much of a section is showing in one viewport sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionVisibility {
    /// Height of the section between the header and the viewport bottom
    pub visible_height: f64,
    /// `visible_height / height`, in `[0, 1]`
    pub ratio: f64,
    /// Distance between the section center and the viewport center
    pub distance_from_center: f64,
}

/// Measure one section against a viewport sample
pub fn measure(bounds: &SectionBounds, viewport: &Viewport) -> SectionVisibility {
    let visible_top = bounds.top.max(viewport.visible_top());
    let visible_bottom = bounds.bottom().min(viewport.visible_bottom());
    let visible_height = (visible_bottom - visible_top).max(0.0);

    SectionVisibility {
        visible_height,
        ratio: visible_height / bounds.height,
        distance_from_center: (bounds.center() - viewport.center()).abs(),
    }
}

/// Pick the active section for one viewport sample
///
/// `sections` must be in configured order; the order is the tie-break.
pub fn detect(
    sections: &[(SectionId, SectionBounds)],
    viewport: &Viewport,
    threshold: f64,
    previous: Option<&SectionId>,
) -> Option<SectionId> {
    let measured: Vec<(&SectionId, SectionVisibility)> = sections
        .iter()
        .map(|(id, bounds)| (id, measure(bounds, viewport)))
        .collect();

    // Strict comparisons keep the earliest candidate on ties
    let mut closest: Option<(&SectionId, f64)> = None;
    for (id, visibility) in &measured {
        if visibility.ratio > threshold {
            match closest {
                Some((_, best)) if visibility.distance_from_center >= best => {}
                _ => closest = Some((id, visibility.distance_from_center)),
            }
        }
    }
    if let Some((id, distance)) = closest {
        log::trace!("Closest visible section: {} ({:.1}px from center)", id, distance);
        return Some(id.clone());
    }

    let mut most_visible: Option<(&SectionId, f64)> = None;
    for (id, visibility) in &measured {
        if visibility.ratio <= 0.0 {
            continue;
        }
        match most_visible {
            Some((_, best)) if visibility.ratio <= best => {}
            _ => most_visible = Some((id, visibility.ratio)),
        }
    }
    if let Some((id, ratio)) = most_visible {
        log::trace!("No section above threshold, most visible: {} ({:.2})", id, ratio);
        return Some(id.clone());
    }

    log::trace!("No section visible, keeping {:?}", previous);
    previous.cloned()
}
