use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Bounds {
    pub fn new() -> Bounds {
        Bounds {
            mins: Vec3::splat(std::f32::MAX),
            maxs: Vec3::splat(-std::f32::MAX),
        }
    }

    pub fn from_min_max(mins: Vec3, maxs: Vec3) -> Bounds {
        Bounds { mins, maxs }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Bounds {
        Bounds {
            mins: center - half_extents,
            maxs: center + half_extents,
        }
    }

    pub fn from_points(pts: &[Vec3]) -> Self {
        pts.iter().fold(Bounds::new(), |acc, pt| acc + *pt)
    }

    pub fn is_empty(&self) -> bool {
        self.maxs.cmplt(self.mins).any()
    }

    /// Closed-interval overlap on all three axes. Touching boxes intersect.
    pub fn intersects(&self, rhs: &Self) -> bool {
        !(self.maxs.cmplt(rhs.mins).any() || rhs.maxs.cmplt(self.mins).any())
    }

    pub fn contains_point(&self, pt: Vec3) -> bool {
        pt.cmpge(self.mins).all() && pt.cmple(self.maxs).all()
    }

    pub fn expand_by_point(&mut self, pt: Vec3) {
        self.add_assign(pt);
    }

    pub fn expand_by_bounds(&mut self, rhs: &Self) {
        self.expand_by_point(rhs.mins);
        self.expand_by_point(rhs.maxs);
    }

    pub fn union(&self, rhs: &Self) -> Self {
        let mut result = *self;
        result.expand_by_bounds(rhs);
        result
    }

    /// Grows the box so it also covers itself translated by `dir`.
    pub fn extend_direction(&self, dir: Vec3) -> Self {
        Bounds {
            mins: self.mins + dir.min(Vec3::ZERO),
            maxs: self.maxs + dir.max(Vec3::ZERO),
        }
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.mins += offset;
        self.maxs += offset;
    }

    pub fn center(&self) -> Vec3 {
        (self.mins + self.maxs) * 0.5
    }

    pub fn width(&self) -> Vec3 {
        self.maxs - self.mins
    }
}

impl Default for Bounds {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Add<Vec3> for Bounds {
    type Output = Self;
    fn add(self, pt: Vec3) -> Self::Output {
        Bounds {
            mins: Vec3::select(pt.cmplt(self.mins), pt, self.mins),
            maxs: Vec3::select(pt.cmpgt(self.maxs), pt, self.maxs),
        }
    }
}

impl AddAssign<Vec3> for Bounds {
    fn add_assign(&mut self, pt: Vec3) {
        self.mins = Vec3::select(pt.cmplt(self.mins), pt, self.mins);
        self.maxs = Vec3::select(pt.cmpgt(self.maxs), pt, self.maxs);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_intersects_checks_every_axis() {
        let a = Bounds::from_min_max(Vec3::ZERO, Vec3::ONE);

        // only separated along y
        let b = Bounds::from_min_max(Vec3::new(0.5, 2.0, 0.5), Vec3::new(1.5, 3.0, 1.5));
        assert!(!a.intersects(&b));
        assert!(!b.intersects(&a));

        let c = Bounds::from_min_max(Vec3::splat(0.5), Vec3::splat(1.5));
        assert!(a.intersects(&c));

        // touching faces count as overlap
        let d = Bounds::from_min_max(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        assert!(a.intersects(&d));
    }

    #[test]
    fn test_extend_direction() {
        let a = Bounds::from_min_max(Vec3::ZERO, Vec3::ONE);
        let b = a.extend_direction(Vec3::new(-2.0, 0.0, 3.0));
        assert_eq!(b.mins, Vec3::new(-2.0, 0.0, 0.0));
        assert_eq!(b.maxs, Vec3::new(1.0, 1.0, 4.0));
    }

    #[test]
    fn test_from_points() {
        let b = Bounds::from_points(&[Vec3::new(1.0, -1.0, 0.0), Vec3::new(-2.0, 3.0, 0.5)]);
        assert_eq!(b.mins, Vec3::new(-2.0, -1.0, 0.0));
        assert_eq!(b.maxs, Vec3::new(1.0, 3.0, 0.5));
        assert!(b.contains_point(Vec3::ZERO));
        assert!(!b.contains_point(Vec3::new(0.0, 0.0, 1.0)));
        assert!(Bounds::new().is_empty());
    }
}
