use serde::{Deserialize, Serialize};

use super::vec3::{BlockPos, Vec3};

/// Axis-aligned bounding box with inclusive bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box covering a single cell
    pub fn of_block(pos: BlockPos) -> Self {
        let min = pos.corner();
        Self::new(min, min + Vec3::new(1.0, 1.0, 1.0))
    }

    /// Smallest box covering every cell, `None` for an empty set
    pub fn covering<'a>(cells: impl IntoIterator<Item = &'a BlockPos>) -> Option<Self> {
        let mut iter = cells.into_iter();
        let first = Self::of_block(*iter.next()?);
        Some(iter.fold(first, |acc, pos| acc.union(&Self::of_block(*pos))))
    }

    pub fn union(&self, other: &Aabb) -> Self {
        Self::new(
            Vec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            Vec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        )
    }

    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}
