//! Backing-store sizing.
//!
//! The canvas is sized from the host's box size under two policies: a minimum
//! pixel ratio (render at least this dense, even on 1x displays) and a maximum
//! pixel count (never allocate more than this many texels). The result also
//! yields the render scale the shader uses to convert CSS pixels to backing
//! pixels.

use std::fmt;

use crate::host::{BoxSize, ViewportMetrics};

/// Guesses the browser zoom level when the platform does not report it
/// through device-pixel sizes or the pixel ratio.
pub trait ZoomEstimator: fmt::Debug + Send + Sync {
    fn estimate(&self, viewport: &ViewportMetrics) -> f64;
}

/// Assumes zoom is already folded into the device pixel ratio.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoZoomCorrection;

impl ZoomEstimator for NoZoomCorrection {
    fn estimate(&self, _viewport: &ViewportMetrics) -> f64 {
        1.0
    }
}

/// Compares the outer window width with the zoomed inner width and snaps the
/// ratio to the zoom steps browsers actually offer.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowWidthZoom;

impl ZoomEstimator for WindowWidthZoom {
    fn estimate(&self, viewport: &ViewportMetrics) -> f64 {
        match (viewport.outer_width, viewport.inner_width) {
            (Some(outer), Some(inner)) if outer > 0.0 && inner > 0.0 => snap_zoom(outer / inner),
            _ => 1.0,
        }
    }
}

/// Snaps a raw zoom ratio to a multiple of 5% or one of the thirds browsers
/// use; anything else is returned unchanged.
pub fn snap_zoom(ratio: f64) -> f64 {
    let percent = (ratio * 100.0).round() as i64;
    if percent % 5 == 0 {
        return percent as f64 / 100.0;
    }
    match percent {
        33 => 1.0 / 3.0,
        67 => 2.0 / 3.0,
        133 => 4.0 / 3.0,
        _ => ratio,
    }
}

/// Inputs to one sizing pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingInput {
    pub box_size: BoxSize,
    pub device_pixel_ratio: f64,
    pub pinch_zoom: f64,
    /// Only applied when the box size carries no device-pixel dimensions.
    pub browser_zoom: f64,
    pub min_pixel_ratio: f64,
    pub max_pixel_count: u64,
}

/// Canvas backing-store dimensions plus the CSS→backing render scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackingStore {
    pub width: u32,
    pub height: u32,
    pub render_scale: f64,
}

/// Derives the backing store for `input`, or `None` for an empty box.
pub fn compute_backing_store(input: &SizingInput) -> Option<BackingStore> {
    let css_width = input.box_size.css_width.round();
    let css_height = input.box_size.css_height.round();
    if css_width <= 0.0 || css_height <= 0.0 {
        return None;
    }

    let (target_width, target_height) = match input.box_size.device_pixels {
        Some((width, height)) => {
            let boost = (input.min_pixel_ratio / input.device_pixel_ratio).max(1.0);
            let scale = boost * input.pinch_zoom;
            (f64::from(width) * scale, f64::from(height) * scale)
        }
        None => {
            let scale = input.device_pixel_ratio.max(input.min_pixel_ratio)
                * input.pinch_zoom
                * input.browser_zoom;
            (css_width * scale, css_height * scale)
        }
    };

    let area = target_width * target_height;
    if area.is_nan() || area <= 0.0 {
        return None;
    }
    let headroom = (input.max_pixel_count as f64).sqrt() / area.sqrt();
    let clamp = headroom.min(1.0);

    let width = (target_width * clamp).round();
    let height = (target_height * clamp).round();
    if width < 1.0 || height < 1.0 {
        return None;
    }

    Some(BackingStore {
        width: width as u32,
        height: height as u32,
        render_scale: width / css_width,
    })
}

/// Tracks the applied backing store and whether the shader's resolution
/// uniforms are stale.
#[derive(Debug)]
pub(crate) struct ResizeController {
    min_pixel_ratio: f64,
    max_pixel_count: u64,
    current: Option<BackingStore>,
    resolution_dirty: bool,
}

impl ResizeController {
    pub fn new(min_pixel_ratio: f64, max_pixel_count: u64) -> Self {
        Self {
            min_pixel_ratio,
            max_pixel_count,
            current: None,
            resolution_dirty: true,
        }
    }

    pub fn current(&self) -> Option<BackingStore> {
        self.current
    }

    pub fn min_pixel_ratio(&self) -> f64 {
        self.min_pixel_ratio
    }

    pub fn max_pixel_count(&self) -> u64 {
        self.max_pixel_count
    }

    pub fn set_min_pixel_ratio(&mut self, ratio: f64) {
        self.min_pixel_ratio = ratio;
    }

    pub fn set_max_pixel_count(&mut self, count: u64) {
        self.max_pixel_count = count;
    }

    /// Recomputes the backing store and returns it only when width, height,
    /// or render scale differ from what is currently applied.
    pub fn recompute(
        &mut self,
        box_size: BoxSize,
        viewport: &ViewportMetrics,
        zoom: &dyn ZoomEstimator,
    ) -> Option<BackingStore> {
        let browser_zoom = if box_size.device_pixels.is_some() {
            1.0
        } else {
            zoom.estimate(viewport)
        };
        let input = SizingInput {
            box_size,
            device_pixel_ratio: viewport.device_pixel_ratio,
            pinch_zoom: viewport.pinch_zoom,
            browser_zoom,
            min_pixel_ratio: self.min_pixel_ratio,
            max_pixel_count: self.max_pixel_count,
        };
        let next = compute_backing_store(&input)?;
        if self.current == Some(next) {
            return None;
        }
        self.current = Some(next);
        self.resolution_dirty = true;
        Some(next)
    }

    /// Returns whether resolution uniforms need uploading, clearing the flag.
    pub fn take_resolution_dirty(&mut self) -> bool {
        std::mem::take(&mut self.resolution_dirty)
    }
}
