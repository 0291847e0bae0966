//! Terrain generators. These are opaque content producers as far as the
//! rest of the server is concerned: the map hands one a chunk, and gets the
//! chunk back full of blocks.

use super::{Chunk, World};
use crate::block::{Block, Kind};
use ba_common::math::Pos;
use noise::{NoiseFn, Perlin, Seedable};

pub trait Generator: Send + Sync {
  fn name(&self) -> &'static str;

  /// Fills the given (empty) chunk with terrain.
  fn generate(&self, world: &World, chunk: &Chunk);

  /// Fills a chunk that sits outside a bounded world's edge. The default is
  /// a bedrock floor, so falling out of the world looks intentional.
  fn generate_edge(&self, world: &World, chunk: &Chunk) {
    let _ = world;
    chunk.fill_layer(0, Block::from_kind(Kind::Bedrock));
  }
}

/// Finds and instantiates a generator from its config name.
pub fn from_name(name: &str, seed: u32) -> Box<dyn Generator + Send + Sync> {
  match name {
    "flat" => Box::new(FlatGen),
    "hills" => Box::new(HillsGen::new(seed)),
    other => {
      warn!("unknown generator `{other}`, falling back to flat");
      Box::new(FlatGen)
    }
  }
}

/// Bedrock, stone, a bit of dirt, and a grass cap. The same everywhere.
pub struct FlatGen;

impl Generator for FlatGen {
  fn name(&self) -> &'static str { "flat" }

  fn generate(&self, _world: &World, chunk: &Chunk) {
    chunk.fill_layer(0, Block::from_kind(Kind::Bedrock));
    for y in 1..60 {
      chunk.fill_layer(y, Block::from_kind(Kind::Stone));
    }
    for y in 60..63 {
      chunk.fill_layer(y, Block::from_kind(Kind::Dirt));
    }
    chunk.fill_layer(63, Block::from_kind(Kind::Grass));
  }
}

/// Rolling perlin hills, with sand where the terrain dips to sea level.
pub struct HillsGen {
  noise: Perlin,
}

const SEA_LEVEL: i32 = 62;

impl HillsGen {
  pub fn new(seed: u32) -> Self { HillsGen { noise: Perlin::new().set_seed(seed) } }

  fn height(&self, x: i32, z: i32) -> i32 {
    let v = self.noise.get([f64::from(x) / 64.0, f64::from(z) / 64.0]);
    64 + (v * 12.0) as i32
  }
}

impl Generator for HillsGen {
  fn name(&self) -> &'static str { "hills" }

  fn generate(&self, _world: &World, chunk: &Chunk) {
    chunk.fill_layer(0, Block::from_kind(Kind::Bedrock));
    let base = chunk.pos();
    for x in 0..16 {
      for z in 0..16 {
        let height = self.height(base.block_x() + x, base.block_z() + z);
        for y in 1..height - 3 {
          chunk.set_block(Pos::new(x, y, z), Block::from_kind(Kind::Stone));
        }
        let surface = if height <= SEA_LEVEL { Kind::Sand } else { Kind::Grass };
        for y in (height - 3).max(1)..height {
          chunk.set_block(Pos::new(x, y, z), Block::from_kind(Kind::Dirt));
        }
        chunk.set_block(Pos::new(x, height, z), Block::from_kind(surface));
        for y in height + 1..=SEA_LEVEL {
          chunk.set_block(Pos::new(x, y, z), Block::from_kind(Kind::StillWater));
        }
      }
    }
  }
}
