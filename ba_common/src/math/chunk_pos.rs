use std::{
  fmt,
  ops::{Add, AddAssign, Sub, SubAssign},
};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct ChunkPos {
  x: i32,
  z: i32,
}

impl Default for ChunkPos {
  fn default() -> Self { ChunkPos::new(0, 0) }
}

impl fmt::Display for ChunkPos {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "ChunkPos({} {})", self.x, self.z)
  }
}

impl ChunkPos {
  /// Creates a new chunk position from chunk coordinates (not block
  /// coordinates).
  pub const fn new(x: i32, z: i32) -> Self { ChunkPos { x, z } }
  /// Returns the X value of the position.
  #[inline(always)]
  pub const fn x(&self) -> i32 { self.x }
  /// Returns the Z value of the position.
  #[inline(always)]
  pub const fn z(&self) -> i32 { self.z }
  /// Returns the minimum block X value of the position. This is just x * 16.
  #[inline(always)]
  pub const fn block_x(&self) -> i32 { self.x * 16 }
  /// Returns the minimum block Z value of the position. This is just z * 16.
  #[inline(always)]
  pub const fn block_z(&self) -> i32 { self.z * 16 }

  /// Returns the Euclidean distance between two chunk positions, in chunks.
  /// Chunk streaming uses this to send the nearest chunks first.
  pub fn dist(&self, other: ChunkPos) -> f64 {
    let dx = f64::from(self.x - other.x);
    let dz = f64::from(self.z - other.z);
    (dx * dx + dz * dz).sqrt()
  }
}

impl Add for ChunkPos {
  type Output = Self;
  fn add(self, other: Self) -> Self { Self { x: self.x + other.x, z: self.z + other.z } }
}

impl AddAssign for ChunkPos {
  fn add_assign(&mut self, other: Self) {
    self.x += other.x;
    self.z += other.z;
  }
}

impl Sub for ChunkPos {
  type Output = Self;
  fn sub(self, other: Self) -> Self { Self { x: self.x - other.x, z: self.z - other.z } }
}

impl SubAssign for ChunkPos {
  fn sub_assign(&mut self, other: Self) {
    self.x -= other.x;
    self.z -= other.z;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dist() {
    assert_eq!(ChunkPos::new(0, 0).dist(ChunkPos::new(3, 4)), 5.0);
    assert_eq!(ChunkPos::new(-1, 0).dist(ChunkPos::new(-1, 0)), 0.0);
    assert!(ChunkPos::new(0, 0).dist(ChunkPos::new(1, 1)) > 1.0);
  }
}
