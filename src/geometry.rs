//! Geometry used by the flush pipeline.
//!
//! A [`Rect`] is a floating point rectangle in logical pixels. The render phase unions
//! the dirty rectangles of every repainted node into one rect per frame, and the root
//! rect (`0, 0, root_width, root_height`) acts as the "everything is dirty" marker.
//!
//! ```
//! use ace_pipeline::geometry::Rect;
//!
//! let a = Rect::new(0.0, 0.0, 10.0, 10.0);
//! let b = Rect::new(5.0, 5.0, 10.0, 10.0);
//! assert_eq!(a.combine(&b), Rect::new(0.0, 0.0, 15.0, 15.0));
//! ```

/// Axis aligned rectangle.
#[derive(Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width, a rect with a non-positive width is invalid.
    pub width: f64,
    /// Height, a rect with a non-positive height is invalid.
    pub height: f64,
}

impl std::fmt::Debug for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rect {{ x: {}, y: {}, width: {}, height: {} }}",
            self.x, self.y, self.width, self.height
        )
    }
}

impl Rect {
    /// Creates a new [`Rect`] with the given origin and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// A rect is valid when it covers a non-empty area.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Smallest rect containing both `self` and `other`. Invalid rects are ignored.
    pub fn combine(&self, other: &Rect) -> Rect {
        if !self.is_valid() {
            return *other;
        }
        if !other.is_valid() {
            return *self;
        }

        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Scales origin and size by `factor`.
    pub fn scale(&self, factor: f64) -> Rect {
        Rect {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_ignores_invalid_rects() {
        let valid = Rect::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(Rect::default().combine(&valid), valid);
        assert_eq!(valid.combine(&Rect::default()), valid);
    }

    #[test]
    fn combine_is_the_bounding_box() {
        let a = Rect::new(10.0, 10.0, 5.0, 5.0);
        let b = Rect::new(0.0, 20.0, 5.0, 5.0);
        assert_eq!(a.combine(&b), Rect::new(0.0, 10.0, 15.0, 15.0));
    }

    #[test]
    fn scale_multiplies_every_component() {
        let r = Rect::new(1.0, 2.0, 3.0, 4.0).scale(2.0);
        assert_eq!(r, Rect::new(2.0, 4.0, 6.0, 8.0));
    }
}
