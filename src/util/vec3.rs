use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// 3D vector for world-space positions and movement
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const NORTH: Vec3 = Vec3 { x: 0.0, y: 0.0, z: -1.0 };
    pub const SOUTH: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 1.0 };
    pub const EAST: Vec3 = Vec3 { x: 1.0, y: 0.0, z: 0.0 };
    pub const WEST: Vec3 = Vec3 { x: -1.0, y: 0.0, z: 0.0 };

    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length_sq().sqrt()
    }

    #[inline]
    pub fn length_sq(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            *self * (1.0 / len)
        } else {
            Self::ZERO
        }
    }

    /// Drop the vertical component
    #[inline]
    pub fn horizontal(&self) -> Self {
        Self::new(self.x, 0.0, self.z)
    }

    #[inline]
    pub fn dot(&self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn distance_to(&self, other: Vec3) -> f64 {
        (*self - other).length()
    }

    #[inline]
    pub fn distance_sq_to(&self, other: Vec3) -> f64 {
        (*self - other).length_sq()
    }

    /// Cell containing this point
    #[inline]
    pub fn block(&self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn approx_eq(&self, other: Vec3, epsilon: f64) -> bool {
        (self.x - other.x).abs() < epsilon
            && (self.y - other.y).abs() < epsilon
            && (self.z - other.z).abs() < epsilon
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
        self.z -= rhs.z;
    }
}

/// Integer cell coordinate in the world grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Minimum corner of the cell in world space
    #[inline]
    pub fn corner(&self) -> Vec3 {
        Vec3::new(self.x as f64, self.y as f64, self.z as f64)
    }

    /// Centre of the cell in world space
    #[inline]
    pub fn center(&self) -> Vec3 {
        Vec3::new(self.x as f64 + 0.5, self.y as f64 + 0.5, self.z as f64 + 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_length() {
        let v = Vec3::new(2.0, 3.0, 6.0);
        assert!((v.length() - 7.0).abs() < EPSILON);
        assert!((v.length_sq() - 49.0).abs() < EPSILON);
    }

    #[test]
    fn test_normalize() {
        let n = Vec3::new(0.0, 0.0, -12.5).normalize();
        assert!(n.approx_eq(Vec3::NORTH, EPSILON));
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);
    }

    #[test]
    fn test_horizontal() {
        let v = Vec3::new(1.0, -4.0, 2.0).horizontal();
        assert_eq!(v, Vec3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn test_block_floors_negative_coordinates() {
        assert_eq!(Vec3::new(-7.5, 64.0, 7.5).block(), BlockPos::new(-8, 64, 7));
        assert_eq!(Vec3::new(-0.1, 0.9, 0.0).block(), BlockPos::new(-1, 0, 0));
    }

    #[test]
    fn test_ops() {
        let mut a = Vec3::new(1.0, 2.0, 3.0);
        a += Vec3::new(1.0, 1.0, 1.0);
        assert_eq!(a, Vec3::new(2.0, 3.0, 4.0));
        a -= Vec3::new(2.0, 3.0, 4.0);
        assert_eq!(a, Vec3::ZERO);
        assert_eq!(-Vec3::EAST, Vec3::WEST);
        assert_eq!(Vec3::SOUTH * 2.0, Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_block_center() {
        let b = BlockPos::new(1, 2, 3);
        assert_eq!(b.center(), Vec3::new(1.5, 2.5, 3.5));
        assert_eq!(b.offset(1, -1, 0), BlockPos::new(2, 1, 3));
    }
}
