use std::fs;
use toml::Value;

#[cfg(test)]
mod tests;

/// A TOML-backed config file. Every key that can be read must be present in
/// the default config source, so `get` can always return a value.
pub struct Config {
  primary: Value,
  default: Value,
}

/// A value that can be read out of a config file.
pub trait TomlValue {
  /// If the toml value matches this type, this returns Some(v).
  fn from_toml(v: &Value) -> Option<Self>
  where
    Self: Sized;

  /// Returns the name of this toml value (string, integer, etc).
  fn name() -> String
  where
    Self: Sized;
}

impl Config {
  /// Creates a new config for the given path. The path is a runtime path to
  /// load the config file. The default source should be loaded with
  /// `include_str!`, and is used whenever a key is not present in the main
  /// config. A copy of the default source is written to `default_path`, so
  /// users have a reference for every key that can be set. If that file
  /// cannot be written, a warning is printed.
  pub fn new(path: &str, default_path: &str, default_src: &str) -> Self {
    fs::write(default_path, default_src).unwrap_or_else(|e| {
      warn!("could not write default configuration to disk at `{default_path}`: {e}");
    });
    let primary = match fs::read_to_string(path) {
      Ok(src) => Self::load_src(path, &src),
      Err(e) => {
        info!("no config at `{path}` ({e}), using defaults");
        Value::Table(toml::value::Table::new())
      }
    };
    Config { primary, default: Self::load_src("default config", default_src) }
  }

  /// Creates a config from the given source strings. Used in tests, where
  /// reading from disk would be a pain.
  pub fn from_src(primary_src: &str, default_src: &str) -> Self {
    Config {
      primary: Self::load_src("primary config", primary_src),
      default: Self::load_src("default config", default_src),
    }
  }

  fn load_src(name: &str, src: &str) -> Value {
    src.parse::<Value>().unwrap_or_else(|e| {
      error!("error loading toml from {name}: {e}");
      Value::Table(toml::value::Table::new())
    })
  }

  fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    let mut v = root;
    for section in key.split('.') {
      v = v.as_table()?.get(section)?;
    }
    Some(v)
  }

  /// Reads the value at the given key. Sections are separated by dots, so
  /// `physics.workers` reads `workers` within the `[physics]` table.
  ///
  /// This will always return a value. If the key is not present in the
  /// primary config (or the value is the wrong type), the default config is
  /// used. If it is missing there too, this function panics: all readable
  /// keys belong in the default config, so users can discover them.
  pub fn get<T: TomlValue>(&self, key: &str) -> T {
    if let Some(v) = Self::lookup(&self.primary, key) {
      match T::from_toml(v) {
        Some(v) => return v,
        None => warn!("config key `{key}` is not a {}, using default", T::name()),
      }
    }
    match Self::lookup(&self.default, key).and_then(T::from_toml) {
      Some(v) => v,
      None => panic!("default config is missing key `{key}` (expected a {})", T::name()),
    }
  }
}

impl TomlValue for bool {
  fn from_toml(v: &Value) -> Option<Self> { v.as_bool() }
  fn name() -> String { "bool".into() }
}

impl TomlValue for i64 {
  fn from_toml(v: &Value) -> Option<Self> { v.as_integer() }
  fn name() -> String { "integer".into() }
}

impl TomlValue for i32 {
  fn from_toml(v: &Value) -> Option<Self> { v.as_integer()?.try_into().ok() }
  fn name() -> String { "integer".into() }
}

impl TomlValue for u32 {
  fn from_toml(v: &Value) -> Option<Self> { v.as_integer()?.try_into().ok() }
  fn name() -> String { "non-negative integer".into() }
}

impl TomlValue for u16 {
  fn from_toml(v: &Value) -> Option<Self> { v.as_integer()?.try_into().ok() }
  fn name() -> String { "non-negative integer".into() }
}

impl TomlValue for u64 {
  fn from_toml(v: &Value) -> Option<Self> { v.as_integer()?.try_into().ok() }
  fn name() -> String { "non-negative integer".into() }
}

impl TomlValue for f64 {
  fn from_toml(v: &Value) -> Option<Self> { v.as_float() }
  fn name() -> String { "float".into() }
}

impl TomlValue for String {
  fn from_toml(v: &Value) -> Option<Self> { v.as_str().map(Into::into) }
  fn name() -> String { "string".into() }
}

impl TomlValue for log::LevelFilter {
  fn from_toml(v: &Value) -> Option<Self> { v.as_str()?.parse().ok() }
  fn name() -> String { "log level".into() }
}
