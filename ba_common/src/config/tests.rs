use super::Config;

const DEFAULT: &str = r#"
log-level = "info"
motd = "hello"

[physics]
workers = 4
updates-per-tick = 8000

[streaming]
radius = 10
"#;

#[test]
fn primary_overrides_default() {
  let c = Config::from_src("[physics]\nworkers = 2", DEFAULT);
  assert_eq!(c.get::<u32>("physics.workers"), 2);
  assert_eq!(c.get::<u32>("physics.updates-per-tick"), 8000);
  assert_eq!(c.get::<u32>("streaming.radius"), 10);
}

#[test]
fn empty_primary_falls_back() {
  let c = Config::from_src("", DEFAULT);
  assert_eq!(c.get::<String>("motd"), "hello");
  assert_eq!(c.get::<log::LevelFilter>("log-level"), log::LevelFilter::Info);
}

#[test]
fn wrong_type_falls_back() {
  let c = Config::from_src("[physics]\nworkers = \"lots\"", DEFAULT);
  assert_eq!(c.get::<u32>("physics.workers"), 4);
}

#[test]
#[should_panic]
fn missing_key_panics() {
  let c = Config::from_src("", DEFAULT);
  c.get::<u32>("no.such.key");
}
