#[macro_use]
extern crate log;

pub mod block;
pub mod entity;
pub mod net;
pub mod physics;
pub mod player;
pub mod world;
