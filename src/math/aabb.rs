//! Axis-aligned bounding boxes.

use super::Vec3;

/// An axis-aligned bounding box, `[min, max]` inclusive per axis.
///
/// The default is the "empty" box (`min = +inf`, `max = -inf`) so that
/// `grow` calls accumulate correctly starting from [`Aabb::NEG`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// The empty box; growing it by any point yields that point.
    pub const NEG: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Grows this box to contain `point`.
    #[inline]
    pub fn grow(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grows this box to contain `other` in its entirety.
    #[inline]
    pub fn grow_aabb(&mut self, other: Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn union(self, other: Aabb) -> Aabb {
        let mut result = self;
        result.grow_aabb(other);
        result
    }

    /// Half the surface area of the box — the quantity the SAH cost
    /// actually needs.
    #[inline]
    pub fn half_area(&self) -> f32 {
        let e = self.max - self.min;
        e.x * e.y + e.y * e.z + e.z * e.x
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The eight corner points of this box, in `i & 1 / i & 2 / i & 4` bit
    /// order. Used by [`crate::instance::BvhInstance::set_transform`] to
    /// re-derive a conservative world-space box from a transformed
    /// local-space one.
    pub fn corners(&self) -> [Vec3; 8] {
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = Vec3::new(
                if i & 1 != 0 { self.max.x } else { self.min.x },
                if i & 2 != 0 { self.max.y } else { self.min.y },
                if i & 4 != 0 { self.max.z } else { self.min.z },
            );
        }
        corners
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::NEG
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn grow_accumulates_bounds() {
        let mut aabb = Aabb::NEG;
        aabb.grow(Vec3::new(1.0, -2.0, 3.0));
        aabb.grow(Vec3::new(-1.0, 5.0, 0.0));

        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 5.0, 3.0));
    }

    #[test]
    fn corners_enclose_box() {
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let corners = aabb.corners();
        assert_eq!(corners.len(), 8);
        for c in corners {
            assert!(c.x == -1.0 || c.x == 1.0);
            assert!(c.y == -1.0 || c.y == 1.0);
            assert!(c.z == -1.0 || c.z == 1.0);
        }
    }
}
