//! Integer geometry used to lay out digit templates.
//!
//! A [`BBox`] is four corners in rotational order (top left, top right,
//! bottom right, bottom left) and need not be axis aligned. The lattice
//! points it encloses are enumerated with a half-open rule, so two boxes that
//! share an edge never both claim a point on that edge.

use std::ops::{Add, Deref, Index, Sub};

use geo::{Area, Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

pub const TL: usize = 0;
pub const TR: usize = 1;
pub const BR: usize = 2;
pub const BL: usize = 3;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, x: i32, y: i32) -> Self {
        Self::new(self.x + x, self.y + y)
    }

    /// Moves `dist` pixels along the line from `self` toward `to`.
    /// A negative distance moves away from `to`.
    pub fn adjust(self, to: Point, dist: i32) -> Self {
        let dx = (to.x - self.x) as f64;
        let dy = (to.y - self.y) as f64;
        let len = dx.hypot(dy);
        if len == 0.0 {
            return self;
        }
        let scale = dist as f64 / len;
        Self::new(
            self.x + (dx * scale).round() as i32,
            self.y + (dy * scale).round() as i32,
        )
    }

    /// Splits the line from `self` to `to` into `sections` equal parts,
    /// returning the interior division points.
    pub fn split(self, to: Point, sections: i32) -> Vec<Point> {
        (1..sections)
            .map(|i| {
                Self::new(
                    self.x + (to.x - self.x) * i / sections,
                    self.y + (to.y - self.y) * i / sections,
                )
            })
            .collect()
    }

    /// Square block of points with half-width `radius`, centred on `self`.
    pub fn block(self, radius: i32) -> PList {
        (-radius..=radius)
            .flat_map(|y| (-radius..=radius).map(move |x| self.offset(x, y)))
            .collect()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<[i32; 2]> for Point {
    fn from([x, y]: [i32; 2]) -> Self {
        Self::new(x, y)
    }
}

/// Ordered list of points enclosed by a region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PList(Vec<Point>);

impl PList {
    pub fn offset(&self, x: i32, y: i32) -> PList {
        self.0.iter().map(|p| p.offset(x, y)).collect()
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&Point) -> bool) {
        self.0.retain(keep);
    }
}

impl Deref for PList {
    type Target = [Point];

    fn deref(&self) -> &[Point] {
        &self.0
    }
}

impl FromIterator<Point> for PList {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Point> for PList {
    fn extend<I: IntoIterator<Item = Point>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BBox(pub [Point; 4]);

impl BBox {
    pub fn new(tl: Point, tr: Point, br: Point, bl: Point) -> Self {
        Self([tl, tr, br, bl])
    }

    pub fn offset(&self, x: i32, y: i32) -> BBox {
        BBox(self.0.map(|p| p.offset(x, y)))
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.0
    }

    /// Shrinks the box by `n` pixels on every side. Returns `None` when the
    /// box collapses or turns inside out.
    pub fn inner(&self, n: i32) -> Option<BBox> {
        let pts = &self.0;
        let shrunk = BBox(std::array::from_fn(|i| {
            let p = pts[i];
            let next = pts[(i + 1) % 4];
            let prev = pts[(i + 3) % 4];
            p + (p.adjust(next, n) - p) + (p.adjust(prev, n) - p)
        }));
        let same_direction = (0..4).all(|i| {
            let old = pts[(i + 1) % 4] - pts[i];
            let new = shrunk.0[(i + 1) % 4] - shrunk.0[i];
            old.x as i64 * new.x as i64 + old.y as i64 * new.y as i64 > 0
        });
        let keeps_winding = self.signed_area2().signum() == shrunk.signed_area2().signum();
        (same_direction && keeps_winding && shrunk.signed_area2() != 0).then_some(shrunk)
    }

    fn signed_area2(&self) -> i64 {
        (0..4)
            .map(|i| {
                let a = self.0[i];
                let b = self.0[(i + 1) % 4];
                a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
            })
            .sum()
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        let coords = self
            .0
            .iter()
            .map(|p| Coord {
                x: p.x as f64,
                y: p.y as f64,
            })
            .collect();
        Polygon::new(LineString::new(coords), vec![])
    }

    pub fn area(&self) -> f64 {
        self.to_polygon().unsigned_area()
    }

    /// Enumerates the lattice points inside the box, row by row.
    ///
    /// A point is inside when it lies in `[ceil(left), ceil(right))` on its
    /// row, with rows taken over `[min y, max y)`. Crossings are computed in
    /// exact integer arithmetic.
    pub fn points(&self) -> PList {
        let pts = &self.0;
        let y_min = pts.iter().map(|p| p.y).min().unwrap_or(0);
        let y_max = pts.iter().map(|p| p.y).max().unwrap_or(0);
        let mut list = PList::default();
        let mut crossings = Vec::with_capacity(4);
        for y in y_min..y_max {
            crossings.clear();
            for i in 0..4 {
                let (a, b) = (pts[i], pts[(i + 1) % 4]);
                if (a.y <= y && y < b.y) || (b.y <= y && y < a.y) {
                    let den = (b.y - a.y) as i64;
                    let num = a.x as i64 * den + (y - a.y) as i64 * (b.x - a.x) as i64;
                    crossings.push(ceil_div(num, den));
                }
            }
            crossings.sort_unstable();
            for span in crossings.chunks_exact(2) {
                list.extend((span[0]..span[1]).map(|x| Point::new(x as i32, y)));
            }
        }
        list
    }
}

impl Index<usize> for BBox {
    type Output = Point;

    fn index(&self, index: usize) -> &Point {
        &self.0[index]
    }
}

fn ceil_div(num: i64, den: i64) -> i64 {
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    -(-num).div_euclid(den)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> BBox {
        BBox::new(
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        )
    }

    #[test]
    fn rectangle_points_are_half_open() {
        let points = rect(2, 3, 6, 5).points();
        assert_eq!(points.len(), 8);
        assert_eq!(points[0], Point::new(2, 3));
        assert_eq!(points[7], Point::new(5, 4));
        assert!(!points.contains(&Point::new(6, 3)));
        assert!(!points.contains(&Point::new(2, 5)));
    }

    #[test]
    fn adjacent_boxes_do_not_share_points() {
        let left = BBox::new(
            Point::new(0, 0),
            Point::new(7, 0),
            Point::new(4, 9),
            Point::new(0, 9),
        );
        let right = BBox::new(
            Point::new(7, 0),
            Point::new(12, 0),
            Point::new(12, 9),
            Point::new(4, 9),
        );
        let a = left.points();
        let b = right.points();
        assert!(a.iter().all(|p| !b.contains(p)));
        assert_eq!(a.len() + b.len(), 12 * 9);
    }

    #[test]
    fn zero_area_box_is_empty() {
        let p = Point::new(4, 4);
        assert!(BBox::new(p, p, p, p).points().is_empty());
        assert_eq!(BBox::new(p, p, p, p).area(), 0.0);
    }

    #[test]
    fn split_and_adjust() {
        let mid = Point::new(20, 0).split(Point::new(20, 40), 2);
        assert_eq!(mid, vec![Point::new(20, 20)]);
        assert_eq!(Point::new(0, 20).adjust(Point::new(0, 0), 2), Point::new(0, 18));
        assert_eq!(Point::new(0, 20).adjust(Point::new(0, 0), -2), Point::new(0, 22));
        assert_eq!(Point::new(3, 3).adjust(Point::new(3, 3), 5), Point::new(3, 3));
    }

    #[test]
    fn inner_shrinks_and_collapses() {
        let bb = rect(0, 0, 20, 40);
        assert_eq!(bb.inner(9), Some(rect(9, 9, 11, 31)));
        assert_eq!(bb.inner(10), None);
        assert_eq!(bb.inner(15), None);
    }

    #[test]
    fn block_is_centred() {
        let block = Point::new(10, 10).block(2);
        assert_eq!(block.len(), 25);
        assert_eq!(block[0], Point::new(8, 8));
        assert_eq!(block[24], Point::new(12, 12));
    }

    #[test]
    fn offset_preserves_order() {
        let moved = rect(0, 0, 2, 2).points().offset(5, 7);
        assert_eq!(
            &*moved,
            &[
                Point::new(5, 7),
                Point::new(6, 7),
                Point::new(5, 8),
                Point::new(6, 8)
            ]
        );
    }
}
