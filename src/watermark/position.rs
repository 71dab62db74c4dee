use super::types::{Anchor, EDGE_MARGIN, Extent, Placement};

/// Places a single watermark instance at a named anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionResolver {
    margin: f32,
}

impl Default for PositionResolver {
    fn default() -> Self {
        Self {
            margin: EDGE_MARGIN,
        }
    }
}

impl PositionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_margin(margin: f32) -> Self {
        Self { margin }
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Coordinates are clamped at zero so an oversized watermark starts at the canvas origin.
    pub fn resolve(&self, anchor: Anchor, canvas: Extent, mark: Extent) -> Placement {
        let right = canvas.width - mark.width - self.margin;
        let bottom = canvas.height - mark.height - self.margin;

        let (x, y) = match anchor {
            Anchor::TopLeft => (self.margin, self.margin),
            Anchor::TopRight => (right, self.margin),
            Anchor::BottomLeft => (self.margin, bottom),
            Anchor::BottomRight => (right, bottom),
            Anchor::Center => (
                (canvas.width - mark.width) / 2.0,
                (canvas.height - mark.height) / 2.0,
            ),
        };

        Placement::new(x.max(0.0), y.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(anchor: Anchor, canvas: (f32, f32), mark: (f32, f32)) -> Placement {
        PositionResolver::new().resolve(
            anchor,
            Extent::new(canvas.0, canvas.1),
            Extent::new(mark.0, mark.1),
        )
    }

    #[test]
    fn test_corner_anchors() {
        let canvas = (800.0, 600.0);
        let mark = (100.0, 24.0);

        assert_eq!(resolve(Anchor::TopLeft, canvas, mark), Placement::new(20.0, 20.0));
        assert_eq!(resolve(Anchor::TopRight, canvas, mark), Placement::new(680.0, 20.0));
        assert_eq!(resolve(Anchor::BottomLeft, canvas, mark), Placement::new(20.0, 556.0));
        assert_eq!(
            resolve(Anchor::BottomRight, canvas, mark),
            Placement::new(680.0, 556.0)
        );
    }

    #[test]
    fn test_center_is_exact() {
        for &(w, h, mw, mh) in &[
            (800.0, 600.0, 100.0, 24.0),
            (1001.0, 333.0, 17.5, 9.25),
            (50.0, 50.0, 50.0, 50.0),
            (64.0, 48.0, 0.0, 0.0),
        ] {
            let placement = resolve(Anchor::Center, (w, h), (mw, mh));
            assert_eq!(placement.x, (w - mw) / 2.0);
            assert_eq!(placement.y, (h - mh) / 2.0);
        }
    }

    #[test]
    fn test_oversized_watermark_is_clamped() {
        let canvas = (100.0, 80.0);
        let mark = (300.0, 200.0);
        for anchor in Anchor::ALL {
            let placement = resolve(anchor, canvas, mark);
            assert!(placement.x >= 0.0, "{:?} produced x {}", anchor, placement.x);
            assert!(placement.y >= 0.0, "{:?} produced y {}", anchor, placement.y);
        }
        assert_eq!(resolve(Anchor::BottomRight, canvas, mark), Placement::new(0.0, 0.0));
    }

    #[test]
    fn test_unknown_anchor_name_lands_bottom_right() {
        let placement = resolve(Anchor::from_name("middle-ish"), (800.0, 600.0), (100.0, 24.0));
        assert_eq!(placement, Placement::new(680.0, 556.0));
    }

    #[test]
    fn test_custom_margin() {
        let resolver = PositionResolver::with_margin(5.0);
        let placement = resolver.resolve(
            Anchor::BottomRight,
            Extent::new(100.0, 100.0),
            Extent::new(10.0, 10.0),
        );
        assert_eq!(placement, Placement::new(85.0, 85.0));
        assert_eq!(resolver.margin(), 5.0);
    }
}
