use std::{fmt, ops::Add};

/// Screen coordinate in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Add<(i32, i32)> for Point {
    type Output = Point;

    /// Shift by a signed offset, saturating at 0
    fn add(self, rhs: (i32, i32)) -> Self::Output {
        Point {
            x: self.x.saturating_add_signed(rhs.0),
            y: self.y.saturating_add_signed(rhs.1),
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Point {
    /// Keep the point inside `bounds`
    #[must_use]
    pub fn clamp_to(self, bounds: &Dimensions) -> Point {
        Point {
            x: self.x.min(bounds.width.saturating_sub(1)),
            y: self.y.min(bounds.height.saturating_sub(1)),
        }
    }
}

/// Area from point 1 (included) to point 2 (excluded)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub point1: Point,
    pub point2: Point,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Square of `half_size` pixels on each side of `center`, cut to the screen
    #[must_use]
    pub fn around(center: &Point, half_size: u32, bounds: &Dimensions) -> Region {
        Region {
            point1: Point {
                x: center.x.saturating_sub(half_size).min(bounds.width),
                y: center.y.saturating_sub(half_size).min(bounds.height),
            },
            point2: Point {
                x: center.x.saturating_add(half_size).min(bounds.width),
                y: center.y.saturating_add(half_size).min(bounds.height),
            },
        }
    }

    #[must_use]
    pub fn get_size(&self) -> Dimensions {
        Dimensions {
            width: self.point2.x.saturating_sub(self.point1.x),
            height: self.point2.y.saturating_sub(self.point1.y),
        }
    }

    // Returns corners
    #[must_use]
    pub fn corners(&self) -> [u32; 4] {
        [self.point1.x, self.point1.y, self.point2.x, self.point2.y]
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        let dims = self.get_size();
        dims.width == 0 || dims.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Dimensions = Dimensions {
        width: 1920,
        height: 1080,
    };

    #[test]
    fn region_around_is_cut_to_screen() {
        let r = Region::around(&Point { x: 10, y: 1070 }, 64, &SCREEN);
        assert_eq!(r.corners(), [0, 1006, 74, 1080]);
        assert_eq!(
            r.get_size(),
            Dimensions {
                width: 74,
                height: 74
            }
        );
    }

    #[test]
    fn region_around_center_is_full_square() {
        let r = Region::around(&Point { x: 960, y: 540 }, 64, &SCREEN);
        assert_eq!(r.corners(), [896, 476, 1024, 604]);
        assert!(!r.is_empty());
    }

    #[test]
    fn offset_saturates_at_zero() {
        let p = Point { x: 5, y: 5 } + (-10, 75);
        assert_eq!(p, Point { x: 0, y: 80 });
    }

    #[test]
    fn clamp_keeps_point_on_screen() {
        let p = Point { x: 5000, y: 20 }.clamp_to(&SCREEN);
        assert_eq!(p, Point { x: 1919, y: 20 });
    }
}
