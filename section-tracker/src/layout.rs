//! Host page interface
//!
//! The tracker never touches the page directly. Everything it needs to know
//! about layout, and the one thing it asks the page to do (scroll), goes
//! through [`PageLayout`].

use crate::types::{Result, SectionBounds, SectionId, TrackerError, Viewport};

/// Layout and scrolling primitives supplied by the host page
pub trait PageLayout {
    /// Current bounds of a section in page coordinates
    ///
    /// Returns `TrackerError::MissingSection` when no region carries the id and
    /// `TrackerError::Measurement` when the region exists but cannot be
    /// measured yet.
    fn section_bounds(&self, id: &SectionId) -> Result<SectionBounds>;

    /// Sample the scroll offset, viewport height and header height
    ///
    /// `fallback_header_height` is the height to report when the page has no
    /// header element.
    fn viewport(&self, fallback_header_height: f64) -> Result<Viewport>;

    /// Start a smooth scroll to the given document offset
    fn scroll_to(&mut self, offset: f64);
}

/// One sample of section bounds
#[derive(Debug, Default)]
pub(crate) struct LayoutSample {
    /// Sections that measured, in observation order
    pub measured: Vec<(SectionId, SectionBounds)>,
    /// Sections left out of this sample and the reason
    pub dropped: Vec<(SectionId, TrackerError)>,
}

/// Measure every section, leaving out the ones that cannot be measured
///
/// A collapsed or unready section only drops out of the sample. The sample
/// fails when nothing measures at all.
pub(crate) fn measure_all<L: PageLayout + ?Sized>(
    layout: &L,
    sections: &[SectionId],
) -> Result<LayoutSample> {
    let mut sample = LayoutSample::default();
    for id in sections {
        match layout
            .section_bounds(id)
            .and_then(|bounds| bounds.validate().map(|_| bounds))
        {
            Ok(bounds) => sample.measured.push((id.clone(), bounds)),
            Err(e) => sample.dropped.push((id.clone(), e)),
        }
    }

    if sample.measured.is_empty() && !sample.dropped.is_empty() {
        return Err(sample.dropped.remove(0).1);
    }
    Ok(sample)
}
