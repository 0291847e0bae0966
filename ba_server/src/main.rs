#[macro_use]
extern crate log;

use ba_common::Config;
use ba_server::world::WorldManager;
use clap::Parser;

#[derive(Parser, Debug)]
#[clap(about, version, author)]
struct Args {
  /// Path to the server config. A default config is written next to it for
  /// reference.
  #[clap(long, default_value = "server.toml")]
  config: String,
}

fn main() {
  let args = Args::parse();
  let config = Config::new(&args.config, "server-default.toml", include_str!("default.toml"));

  let level = config.get("log-level");
  ba_common::init_with_level("server", level);

  let wm = WorldManager::new(config);
  wm.add_world();
  if let Err(e) = wm.run() {
    error!("could not start server: {e}");
    return;
  }

  info!("server up; waiting for the connection reactor");
  // The wire protocol lives in an external process that feeds
  // net::packet::Handler. Until it connects there is nothing to do on this
  // thread but keep the process alive.
  loop {
    std::thread::park();
  }
}
