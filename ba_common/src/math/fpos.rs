use super::{ChunkPos, Pos};
use std::{
  fmt,
  ops::{Add, AddAssign, Sub, SubAssign},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FPos {
  pub x: f64,
  pub y: f64,
  pub z: f64,
}

impl fmt::Display for FPos {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "FPos({} {} {})", self.x, self.y, self.z)
  }
}

impl Default for FPos {
  fn default() -> FPos { FPos::new(0.0, 0.0, 0.0) }
}

impl From<Pos> for FPos {
  fn from(p: Pos) -> FPos { FPos { x: p.x.into(), y: p.y.into(), z: p.z.into() } }
}

impl FPos {
  /// Creates a new floating point position.
  #[inline(always)]
  pub const fn new(x: f64, y: f64, z: f64) -> Self { FPos { x, y, z } }
  /// Returns the X value of the position.
  #[inline(always)]
  pub const fn x(&self) -> f64 { self.x }
  /// Returns the Y value of the position.
  #[inline(always)]
  pub const fn y(&self) -> f64 { self.y }
  /// Returns the Z value of the position.
  #[inline(always)]
  pub const fn z(&self) -> f64 { self.z }
  /// Returns the X value of the position, as a fixed precision float. This
  /// is the X position multiplied by 32. It is how entity positions are sent
  /// over the wire.
  #[inline(always)]
  pub fn fixed_x(&self) -> i32 { (self.x * 32.0).round() as i32 }
  /// Returns the Y value of the position, as a fixed precision float.
  #[inline(always)]
  pub fn fixed_y(&self) -> i32 { (self.y * 32.0).round() as i32 }
  /// Returns the Z value of the position, as a fixed precision float.
  #[inline(always)]
  pub fn fixed_z(&self) -> i32 { (self.z * 32.0).round() as i32 }

  /// Returns the block that this position is in.
  #[inline(always)]
  pub fn block(&self) -> Pos {
    Pos::new(self.x.floor() as i32, self.y.floor() as i32, self.z.floor() as i32)
  }
  /// Returns the chunk that this position is in.
  #[inline(always)]
  pub fn chunk(&self) -> ChunkPos { self.block().chunk() }

  /// Returns self, with x set to the given value.
  #[inline(always)]
  #[must_use = "with_x returns a modified version of self"]
  pub fn with_x(mut self, x: f64) -> Self {
    self.x = x;
    self
  }
  /// Returns self, with y set to the given value.
  #[inline(always)]
  #[must_use = "with_y returns a modified version of self"]
  pub fn with_y(mut self, y: f64) -> Self {
    self.y = y;
    self
  }
  /// Returns self, with z set to the given value.
  #[inline(always)]
  #[must_use = "with_z returns a modified version of self"]
  pub fn with_z(mut self, z: f64) -> Self {
    self.z = z;
    self
  }
}

impl Add for FPos {
  type Output = Self;
  fn add(self, other: Self) -> Self {
    Self { x: self.x + other.x, y: self.y + other.y, z: self.z + other.z }
  }
}

impl AddAssign for FPos {
  fn add_assign(&mut self, other: Self) {
    self.x += other.x;
    self.y += other.y;
    self.z += other.z;
  }
}

impl Sub for FPos {
  type Output = Self;
  fn sub(self, other: Self) -> Self {
    Self { x: self.x - other.x, y: self.y - other.y, z: self.z - other.z }
  }
}

impl SubAssign for FPos {
  fn sub_assign(&mut self, other: Self) {
    self.x -= other.x;
    self.y -= other.y;
    self.z -= other.z;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blocks() {
    assert_eq!(FPos::new(0.5, 64.2, -0.5).block(), Pos::new(0, 64, -1));
    assert_eq!(FPos::new(17.9, 0.0, -16.0).chunk(), ChunkPos::new(1, -1));
  }

  #[test]
  fn fixed() {
    assert_eq!(FPos::new(1.5, 64.0, -2.25).fixed_x(), 48);
    assert_eq!(FPos::new(1.5, 64.0, -2.25).fixed_y(), 2048);
    assert_eq!(FPos::new(1.5, 64.0, -2.25).fixed_z(), -72);
  }
}
