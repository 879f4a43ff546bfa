//! Fit-and-center: place an image inside the page's margin box.
//!
//! The longer axis is fitted first; if the derived other axis overflows its
//! bound it is clamped and the first axis re-derived. The result always lies
//! inside `(max_width, max_height)`, keeps the source aspect ratio, and is
//! never larger than the source (one pixel maps to at most one point).

use crate::config::PageGeometry;
use serde::{Deserialize, Serialize};

/// Where an image is drawn on its page, in PDF points (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Compute the placed box for a `width × height` image.
pub fn fit_and_center(width: u32, height: u32, geometry: &PageGeometry) -> Placement {
    let width = f64::from(width.max(1));
    let height = f64::from(height.max(1));
    let aspect = width / height;
    let max_width = geometry.max_width();
    let max_height = geometry.max_height();

    let (new_width, new_height) = if aspect > 1.0 {
        let mut w = max_width.min(width);
        let mut h = w / aspect;
        if h > max_height {
            h = max_height;
            w = h * aspect;
        }
        (w, h)
    } else {
        let mut h = max_height.min(height);
        let mut w = h * aspect;
        if w > max_width {
            w = max_width;
            h = w / aspect;
        }
        (w, h)
    };

    Placement {
        x: (geometry.page_width - new_width) / 2.0,
        y: (geometry.page_height - new_height) / 2.0,
        width: new_width,
        height: new_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_invariants(w: u32, h: u32, g: &PageGeometry) {
        let p = fit_and_center(w, h, g);
        assert!(p.width <= g.max_width() + EPS, "{w}x{h}: {p:?}");
        assert!(p.height <= g.max_height() + EPS, "{w}x{h}: {p:?}");
        let src = f64::from(w) / f64::from(h);
        assert!((p.width / p.height - src).abs() < 1e-6, "{w}x{h}: {p:?}");
        assert!((g.page_width / 2.0 - p.x - p.width / 2.0).abs() < EPS);
        assert!((g.page_height / 2.0 - p.y - p.height / 2.0).abs() < EPS);
    }

    #[test]
    fn invariants_hold_across_shapes() {
        let g = PageGeometry::default();
        for &(w, h) in &[
            (800, 600),
            (600, 800),
            (1000, 1000),
            (4096, 10),
            (10, 4096),
            (1, 1),
            (535, 782),
            (3000, 2000),
            (2000, 3000),
        ] {
            assert_invariants(w, h, &g);
        }
    }

    #[test]
    fn landscape_fits_width() {
        let g = PageGeometry::default();
        let p = fit_and_center(800, 600, &g);
        assert!((p.width - g.max_width()).abs() < EPS);
        assert!((p.height - g.max_width() * 0.75).abs() < EPS);
    }

    #[test]
    fn portrait_clamped_by_width() {
        let g = PageGeometry::default();
        let p = fit_and_center(600, 800, &g);
        // Height-first gives 586 pt of width, which overflows 535 pt.
        assert!((p.width - g.max_width()).abs() < EPS);
        assert!((p.height - g.max_width() / 0.75).abs() < EPS);
    }

    #[test]
    fn square_uses_the_narrower_axis() {
        let g = PageGeometry::default();
        let p = fit_and_center(1000, 1000, &g);
        assert!((p.width - g.max_width()).abs() < EPS);
        assert!((p.height - g.max_width()).abs() < EPS);
    }

    #[test]
    fn very_wide_image_clamped_by_height() {
        let g = PageGeometry {
            page_width: 1000.0,
            page_height: 200.0,
            margin: 0.0,
        };
        let p = fit_and_center(4000, 1000, &g);
        assert!((p.height - 200.0).abs() < EPS);
        assert!((p.width - 800.0).abs() < EPS);
        assert!((p.x - 100.0).abs() < EPS);
        assert!(p.y.abs() < EPS);
    }

    #[test]
    fn small_image_not_upscaled() {
        let g = PageGeometry::default();
        let p = fit_and_center(100, 50, &g);
        assert_eq!((p.width, p.height), (100.0, 50.0));
    }
}
