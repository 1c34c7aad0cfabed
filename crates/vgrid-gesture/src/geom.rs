//! Integer pixel geometry shared by the drag and drop machinery.

/// A point in canvas space. Coordinates may be negative while a pointer is
/// dragged past an origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    pub fn distance_sq(&self, other: Point) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }
}

/// An axis-aligned rectangle, half-open on the right and bottom edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Region {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_size(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            right: left.saturating_add(width.min(i32::MAX as u32) as i32),
            bottom: top.saturating_add(height.min(i32::MAX as u32) as i32),
        }
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width()) * i64::from(self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.left + self.width() / 2,
            self.top + self.height() / 2,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right && p.y >= self.top && p.y < self.bottom
    }

    /// Whether `other` lies fully inside `self`.
    pub fn contains_region(&self, other: &Region) -> bool {
        !other.is_empty()
            && other.left >= self.left
            && other.right <= self.right
            && other.top >= self.top
            && other.bottom <= self.bottom
    }

    pub fn intersection(&self, other: &Region) -> Option<Region> {
        let r = Region {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        };
        if r.is_empty() { None } else { Some(r) }
    }

    /// Area of the overlap with `other`, zero when disjoint.
    pub fn overlap_area(&self, other: &Region) -> i64 {
        self.intersection(other).map_or(0, |r| r.area())
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Region {
        Region {
            left: self.left.saturating_add(dx),
            top: self.top.saturating_add(dy),
            right: self.right.saturating_add(dx),
            bottom: self.bottom.saturating_add(dy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_squared() {
        let a = Point::new(0, 0);
        assert_eq!(a.distance_sq(Point::new(3, 4)), 25);
        assert_eq!(a.distance_sq(Point::new(-3, -4)), 25);
        assert_eq!(a.distance_sq(a), 0);
    }

    #[test]
    fn overlap_area() {
        let a = Region::from_size(0, 0, 10, 10);
        let b = Region::from_size(5, 5, 10, 10);
        assert_eq!(a.overlap_area(&b), 25);
        assert_eq!(a.overlap_area(&Region::from_size(20, 20, 5, 5)), 0);
    }

    #[test]
    fn containment_is_half_open() {
        let r = Region::from_size(0, 0, 10, 10);
        assert!(r.contains(Point::new(0, 0)));
        assert!(r.contains(Point::new(9, 9)));
        assert!(!r.contains(Point::new(10, 0)));
        assert!(r.contains_region(&Region::from_size(2, 2, 8, 8)));
        assert!(!r.contains_region(&Region::from_size(2, 2, 9, 8)));
    }

    #[test]
    fn center_of_odd_region() {
        let r = Region::from_size(0, 0, 5, 3);
        assert_eq!(r.center(), Point::new(2, 1));
    }
}
