//! Math utilities.

use glam::Vec3;

/// Axis-aligned bounding box accumulated componentwise.
///
/// The default box is empty: `min` is +infinity and `max` is -infinity, so
/// the first `extend` sets both bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::INFINITY,
            max: Vec3::NEG_INFINITY,
        }
    }
}

impl Aabb {
    /// An empty box that any point will grow.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Grow the box to contain `point`.
    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grow the box to contain `other`.
    pub fn union(&mut self, other: &Self) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Whether no point has been added yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// Extent of the box on each axis.
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Center point of the box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_is_empty() {
        let aabb = Aabb::default();
        assert!(aabb.is_empty());
        assert_eq!(aabb.size(), Vec3::ZERO);
    }

    #[test]
    fn extend_grows_bounds() {
        let mut aabb = Aabb::empty();
        aabb.extend(Vec3::new(1.0, -2.0, 3.0));
        aabb.extend(Vec3::new(-1.0, 2.0, 0.0));
        assert!(!aabb.is_empty());
        assert_relative_eq!(aabb.min.x, -1.0);
        assert_relative_eq!(aabb.min.y, -2.0);
        assert_relative_eq!(aabb.max.z, 3.0);
        assert_relative_eq!(aabb.size().y, 4.0);
    }

    #[test]
    fn single_point_has_zero_size() {
        let mut aabb = Aabb::empty();
        aabb.extend(Vec3::splat(5.0));
        assert_eq!(aabb.size(), Vec3::ZERO);
        assert_eq!(aabb.center(), Vec3::splat(5.0));
    }

    #[test]
    fn union_merges() {
        let mut a = Aabb::empty();
        a.extend(Vec3::ZERO);
        let mut b = Aabb::empty();
        b.extend(Vec3::splat(2.0));
        a.union(&b);
        assert_eq!(a.max, Vec3::splat(2.0));
        assert_eq!(a.min, Vec3::ZERO);
    }
}
