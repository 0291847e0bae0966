use super::ChunkPos;
use std::{
  error::Error,
  fmt,
  ops::{Add, AddAssign, Sub, SubAssign},
};

#[derive(Debug, Clone, PartialEq)]
pub struct PosError {
  pub pos: Pos,
  pub msg: String,
}

impl fmt::Display for PosError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "invalid position: {} {}", self.pos, self.msg)
  }
}

impl Error for PosError {}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Pos {
  pub x: i32,
  pub y: i32,
  pub z: i32,
}

impl Default for Pos {
  fn default() -> Self { Pos::new(0, 0, 0) }
}

impl fmt::Display for Pos {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "Pos({} {} {})", self.x, self.y, self.z)
  }
}

impl Pos {
  /// Creates a new block position. This can be used to find chunk
  /// coordinates, place blocks, or send a position in a packet.
  pub const fn new(x: i32, y: i32, z: i32) -> Self { Pos { x, y, z } }
  /// Returns the X value of the position.
  #[inline(always)]
  pub const fn x(&self) -> i32 { self.x }
  /// Returns the Y value of the position.
  #[inline(always)]
  pub const fn y(&self) -> i32 { self.y }
  /// Returns the Z value of the position.
  #[inline(always)]
  pub const fn z(&self) -> i32 { self.z }

  /// Returns the chunk that this position is in.
  #[inline(always)]
  pub const fn chunk(&self) -> ChunkPos { ChunkPos::new(self.chunk_x(), self.chunk_z()) }
  /// Returns this position's chunk X coordinate. This is `x / 16`, rounded
  /// towards negative infinity.
  #[inline(always)]
  pub const fn chunk_x(&self) -> i32 { self.x >> 4 }
  /// Returns the Y section coordinate of this position. This is `y / 16`,
  /// rounded towards negative infinity.
  #[inline(always)]
  pub const fn chunk_y(&self) -> i32 { self.y >> 4 }
  /// Returns this position's chunk Z coordinate. This is `z / 16`, rounded
  /// towards negative infinity.
  #[inline(always)]
  pub const fn chunk_z(&self) -> i32 { self.z >> 4 }

  /// Returns the X position within this position's chunk. Always in `0..16`.
  #[inline(always)]
  pub const fn chunk_rel_x(&self) -> i32 { self.x & 15 }
  /// Returns the Y position within this position's section. Always in
  /// `0..16`.
  #[inline(always)]
  pub const fn chunk_rel_y(&self) -> i32 { self.y & 15 }
  /// Returns the Z position within this position's chunk. Always in `0..16`.
  #[inline(always)]
  pub const fn chunk_rel_z(&self) -> i32 { self.z & 15 }

  /// Returns self, with x set to the given value.
  #[inline(always)]
  #[must_use = "with_x returns a modified version of self"]
  pub const fn with_x(mut self, x: i32) -> Self {
    self.x = x;
    self
  }
  /// Returns self, with y set to the given value.
  #[inline(always)]
  #[must_use = "with_y returns a modified version of self"]
  pub const fn with_y(mut self, y: i32) -> Self {
    self.y = y;
    self
  }
  /// Returns self, with z set to the given value.
  #[inline(always)]
  #[must_use = "with_z returns a modified version of self"]
  pub const fn with_z(mut self, z: i32) -> Self {
    self.z = z;
    self
  }

  /// Creates an error for this position. Use this when returning a
  /// `Result<_, PosError>` from any block lookup.
  pub fn err(&self, msg: String) -> PosError { PosError { pos: *self, msg } }

  /// Returns the six positions directly adjacent to this one. Used for
  /// neighbor notification after a block write.
  pub fn neighbors(&self) -> [Pos; 6] {
    [
      self.with_x(self.x + 1),
      self.with_x(self.x - 1),
      self.with_y(self.y + 1),
      self.with_y(self.y - 1),
      self.with_z(self.z + 1),
      self.with_z(self.z - 1),
    ]
  }
}

impl Add for Pos {
  type Output = Self;
  fn add(self, other: Self) -> Self {
    Self { x: self.x + other.x, y: self.y + other.y, z: self.z + other.z }
  }
}

impl AddAssign for Pos {
  fn add_assign(&mut self, other: Self) {
    self.x += other.x;
    self.y += other.y;
    self.z += other.z;
  }
}

impl Sub for Pos {
  type Output = Self;
  fn sub(self, other: Self) -> Self {
    Self { x: self.x - other.x, y: self.y - other.y, z: self.z - other.z }
  }
}

impl SubAssign for Pos {
  fn sub_assign(&mut self, other: Self) {
    self.x -= other.x;
    self.y -= other.y;
    self.z -= other.z;
  }
}
