//! Template-matching tracking capability.
//!
//! Keeps the luma patch under the initial region as a template and, on every
//! frame, searches a square window around the last position for the offset
//! with the smallest mean squared difference. When even the best offset
//! differs too much from the template the target is reported as lost and the
//! search stays centered on the last known position.

use ndarray::{Array2, s};

use crate::frame::Frame;
use crate::tracker::capability::TrackingCapability;
use crate::tracker::rect::Region;

/// Configuration for the [`TemplateTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateConfig {
    /// Largest displacement per frame searched, in pixels along each axis
    pub search_radius: i32,
    /// Mean squared luma difference above which the target counts as lost
    pub loss_threshold: f32,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            search_radius: 16,
            // roughly 30 gray levels RMS
            loss_threshold: 900.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateTracker {
    config: TemplateConfig,
    template: Option<Array2<f32>>,
    region: Region,
}

impl Default for TemplateTracker {
    fn default() -> Self {
        Self::new(TemplateConfig::default())
    }
}

impl TemplateTracker {
    pub fn new(config: TemplateConfig) -> Self {
        Self {
            config,
            template: None,
            region: Region::default(),
        }
    }

    /// Mean squared difference between `template` and the patch under `region`.
    fn match_error(luma: &Array2<f32>, template: &Array2<f32>, region: Region) -> f32 {
        let [x1, y1, x2, y2] = region.to_tlbr();
        let window = luma.slice(s![y1 as usize..y2 as usize, x1 as usize..x2 as usize]);
        let sum: f32 = window
            .iter()
            .zip(template.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        sum / template.len() as f32
    }
}

impl TrackingCapability for TemplateTracker {
    fn initialize(&mut self, frame: &Frame, region: Region) -> bool {
        if region.is_degenerate() || !region.fits_within(frame.width(), frame.height()) {
            return false;
        }
        let [x1, y1, x2, y2] = region.to_tlbr();
        let luma = frame.luma();
        self.template = Some(
            luma.slice(s![y1 as usize..y2 as usize, x1 as usize..x2 as usize])
                .to_owned(),
        );
        self.region = region;
        true
    }

    fn advance(&mut self, frame: &Frame) -> (bool, Region) {
        let Some(template) = self.template.as_ref() else {
            return (false, self.region);
        };

        let luma = frame.luma();
        let radius = self.config.search_radius.max(0);
        let mut best: Option<(f32, Region)> = None;

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let Some(candidate) = self.region.translate(dx, dy) else {
                    continue;
                };
                if !candidate.fits_within(frame.width(), frame.height()) {
                    continue;
                }
                let error = Self::match_error(&luma, template, candidate);
                if best.is_none_or(|(best_error, _)| error < best_error) {
                    best = Some((error, candidate));
                }
            }
        }

        match best {
            Some((error, region)) if error <= self.config.loss_threshold => {
                self.region = region;
                (true, region)
            }
            _ => (false, self.region),
        }
    }
}
