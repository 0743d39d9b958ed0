use std::collections::BTreeMap;

use crate::geometry::Rect;

/// Blur style of a window blur region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowBlurStyle {
    SmallLight = 100,
    MediumLight = 101,
    LargeLight = 102,
    XLargeLight = 103,
    SmallDark = 104,
    MediumDark = 105,
    LargeDark = 106,
    XLargeDark = 107,
}

/// Rounded rect, radius applies to every corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RoundedRect {
    pub rect: Rect,
    pub radius_x: f64,
    pub radius_y: f64,
}

impl RoundedRect {
    pub fn new(rect: Rect, radius_x: f64, radius_y: f64) -> Self {
        Self { rect, radius_x, radius_y }
    }

    fn near_equal(&self, other: &RoundedRect) -> bool {
        near_equal(self.rect.x, other.rect.x)
            && near_equal(self.rect.y, other.rect.y)
            && near_equal(self.rect.width, other.rect.width)
            && near_equal(self.rect.height, other.rect.height)
            && near_equal(self.radius_x, other.radius_x)
            && near_equal(self.radius_y, other.radius_y)
    }

    fn scaled_rounded(&self, scale: f64) -> RoundedRect {
        let r = self.rect.scale(scale);
        RoundedRect {
            rect: Rect::new(r.x.round(), r.y.round(), r.width.round(), r.height.round()),
            radius_x: (self.radius_x * scale).round(),
            radius_y: (self.radius_y * scale).round(),
        }
    }
}

fn near_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[derive(Debug, Clone)]
struct BlurRegion {
    progress: f32,
    style: WindowBlurStyle,
    inner: RoundedRect,
    coords: Vec<RoundedRect>,
}

/// Handler receiving one float vector per region:
/// `[progress, style, (left, top, right, bottom, radius_x, radius_y)*]`.
pub type BlurRegionHandler = Box<dyn FnMut(Vec<Vec<f32>>) + Send>;

/// Window blur regions, keyed by the id of the component that owns them.
#[derive(Debug, Default)]
pub struct WindowBlurRegions {
    regions: BTreeMap<i32, BlurRegion>,
    needs_refresh: bool,
}

impl WindowBlurRegions {
    /// Inserts or updates a region. An update that changes nothing does not trigger a refresh.
    pub fn update(
        &mut self,
        id: i32,
        inner: RoundedRect,
        progress: f32,
        style: WindowBlurStyle,
        coords: Vec<RoundedRect>,
    ) {
        if let Some(old) = self.regions.get(&id) {
            if (progress - old.progress).abs() < f32::EPSILON && inner.near_equal(&old.inner) && style == old.style {
                return;
            }
        }
        self.regions.insert(id, BlurRegion { progress, style, inner, coords });
        self.needs_refresh = true;
    }

    pub fn clear(&mut self, id: i32) {
        if self.regions.remove(&id).is_some() {
            self.needs_refresh = true;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Serializes every region for the blur handler, scaled to device pixels, and
    /// clears the refresh flag.
    pub fn take_rectangles(&mut self, scale: f64) -> Vec<Vec<f32>> {
        self.needs_refresh = false;
        self.regions
            .values()
            .map(|region| {
                let mut values = vec![region.progress, region.style as i32 as f32];
                for coord in &region.coords {
                    let c = coord.scaled_rounded(scale);
                    values.extend_from_slice(&[
                        c.rect.x as f32,
                        c.rect.y as f32,
                        c.rect.right() as f32,
                        c.rect.bottom() as f32,
                        c.radius_x as f32,
                        c.radius_y as f32,
                    ]);
                }
                values
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: f64) -> RoundedRect {
        RoundedRect::new(Rect::new(x, 0.0, 10.0, 10.0), 2.0, 2.0)
    }

    #[test]
    fn unchanged_update_does_not_refresh() {
        let mut regions = WindowBlurRegions::default();
        regions.update(1, region(0.0), 0.5, WindowBlurStyle::SmallLight, vec![region(0.0)]);
        assert!(regions.needs_refresh());
        regions.take_rectangles(1.0);

        regions.update(1, region(0.0), 0.5, WindowBlurStyle::SmallLight, vec![]);
        assert!(!regions.needs_refresh());

        regions.update(1, region(1.0), 0.5, WindowBlurStyle::SmallLight, vec![]);
        assert!(regions.needs_refresh());
    }

    #[test]
    fn rectangles_are_scaled_and_flattened() {
        let mut regions = WindowBlurRegions::default();
        regions.update(7, region(0.0), 1.0, WindowBlurStyle::MediumDark, vec![region(5.0)]);

        let rects = regions.take_rectangles(2.0);
        assert_eq!(rects, vec![vec![1.0, 105.0, 10.0, 0.0, 30.0, 20.0, 4.0, 4.0]]);
        assert!(!regions.needs_refresh());
    }

    #[test]
    fn clearing_unknown_region_is_a_noop() {
        let mut regions = WindowBlurRegions::default();
        regions.clear(3);
        assert!(!regions.needs_refresh());
    }
}
