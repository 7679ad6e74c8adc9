//! Engine configuration.
//!
//! Settings are read through a [`ConfigProvider`] that layers one or more
//! [`ConfigSource`]s (environment variables, JSON files, or anything custom)
//! and resolved into an [`EngineConfig`].

use std::collections::HashMap;
use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{SingletonError, SingletonResult};
use crate::internal::sync::{read, write, RwLock};
use crate::policy::ArgumentMismatch;

/// Key selecting the argument-mismatch mode (`strict` or `permissive`)
pub const KEY_ARGUMENT_MISMATCH: &str = "singleton.arguments.mismatch";
/// Key toggling the warning emitted when a derivable singleton is wrapped
pub const KEY_WARN_ON_DERIVABLE: &str = "singleton.derivable.warn";
/// Key bounding nested construction depth
pub const KEY_MAX_DEPTH: &str = "singleton.depth.max";

const DEFAULT_MAX_DEPTH: usize = 1024;

/// A configuration value that can be various types
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_string(&self) -> SingletonResult<&str> {
        match self {
            ConfigValue::String(s) => Ok(s),
            other => Err(mismatch("a string", other)),
        }
    }

    pub fn as_i64(&self) -> SingletonResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            other => Err(mismatch("an integer", other)),
        }
    }

    /// Booleans also accept the strings `true` and `false` and the integers
    /// `0` and `1`.
    pub fn as_bool(&self) -> SingletonResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            ConfigValue::Integer(0) => Ok(false),
            ConfigValue::Integer(1) => Ok(true),
            ConfigValue::String(s) => s
                .trim()
                .parse::<bool>()
                .map_err(|_| mismatch("a boolean", self)),
            other => Err(mismatch("a boolean", other)),
        }
    }

    /// Follows a dotted path through nested objects.
    fn lookup_path(&self, path: &str) -> Option<&ConfigValue> {
        path.split('.').try_fold(self, |value, segment| match value {
            ConfigValue::Object(map) => map.get(segment),
            _ => None,
        })
    }
}

fn mismatch(expected: &str, found: &ConfigValue) -> SingletonError {
    SingletonError::Config(format!("expected {}, found {:?}", expected, found))
}

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    /// Get a configuration value by dotted key
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// List all available keys
    fn keys(&self) -> Vec<String>;
}

/// Environment variable configuration source
///
/// A dotted key maps to an upper-cased variable with dots replaced by
/// underscores: `singleton.depth.max` reads `SINGLETON_DEPTH_MAX`, or
/// `MYAPP_SINGLETON_DEPTH_MAX` with the prefix `myapp`.
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn variable_name(&self, key: &str) -> String {
        let key = key.replace('.', "_").to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key),
            None => key,
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.variable_name(key)).ok().map(|value| {
            if let Ok(int_val) = value.parse::<i64>() {
                ConfigValue::Integer(int_val)
            } else if let Ok(float_val) = value.parse::<f64>() {
                ConfigValue::Float(float_val)
            } else if let Ok(bool_val) = value.parse::<bool>() {
                ConfigValue::Boolean(bool_val)
            } else {
                ConfigValue::String(value)
            }
        })
    }

    fn keys(&self) -> Vec<String> {
        env::vars()
            .filter_map(|(key, _)| match &self.prefix {
                Some(prefix) => {
                    let prefix_upper = format!("{}_", prefix.to_uppercase());
                    key.strip_prefix(&prefix_upper).map(dotted_key)
                }
                None => Some(dotted_key(&key)),
            })
            .collect()
    }
}

/// Inverse of `variable_name`: `SINGLETON_DEPTH_MAX` lists as `singleton.depth.max`.
fn dotted_key(variable: &str) -> String {
    variable.to_lowercase().replace('_', ".")
}

/// JSON configuration source
///
/// Accepts flat documents keyed by dotted names
/// (`{"singleton.depth.max": 16}`) as well as nested objects
/// (`{"singleton": {"depth": {"max": 16}}}`).
#[cfg(feature = "config")]
#[derive(Debug)]
pub struct JsonConfigSource {
    values: HashMap<String, ConfigValue>,
}

#[cfg(feature = "config")]
impl JsonConfigSource {
    pub fn parse(json: &str) -> SingletonResult<Self> {
        let values: HashMap<String, ConfigValue> = serde_json::from_str(json)
            .map_err(|e| SingletonError::Config(format!("invalid JSON configuration: {}", e)))?;
        Ok(Self { values })
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> SingletonResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SingletonError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }
}

#[cfg(feature = "config")]
impl ConfigSource for JsonConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        if let Some(value) = self.values.get(key) {
            return Some(value.clone());
        }
        let (head, rest) = key.split_once('.')?;
        self.values.get(head)?.lookup_path(rest).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Layered configuration lookup
///
/// Sources are consulted in the order they were added; the first one that
/// knows a key wins. Resolved values are cached.
pub struct ConfigProvider {
    sources: Vec<Box<dyn ConfigSource>>,
    cache: RwLock<HashMap<String, ConfigValue>>,
}

impl std::fmt::Debug for ConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigProvider")
            .field("sources", &self.sources)
            .field("cached", &read(&self.cache).len())
            .finish()
    }
}

impl ConfigProvider {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Add a configuration source (higher priority sources should be added first)
    pub fn add_source(&mut self, source: Box<dyn ConfigSource>) -> &mut Self {
        self.sources.push(source);
        self
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        if let Some(value) = read(&self.cache).get(key) {
            return Some(value.clone());
        }

        let value = self.sources.iter().find_map(|source| source.get(key))?;
        write(&self.cache).insert(key.to_string(), value.clone());
        Some(value)
    }

    pub fn get_string(&self, key: &str) -> SingletonResult<Option<String>> {
        self.get(key)
            .map(|v| v.as_string().map(str::to_string))
            .transpose()
            .map_err(|e| keyed(key, e))
    }

    pub fn get_i64(&self, key: &str) -> SingletonResult<Option<i64>> {
        self.get(key)
            .map(|v| v.as_i64())
            .transpose()
            .map_err(|e| keyed(key, e))
    }

    pub fn get_bool(&self, key: &str) -> SingletonResult<Option<bool>> {
        self.get(key)
            .map(|v| v.as_bool())
            .transpose()
            .map_err(|e| keyed(key, e))
    }

    /// Forces the next lookups back to the sources.
    pub fn invalidate_cache(&self) {
        write(&self.cache).clear();
    }

    pub fn all_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sources.iter().flat_map(|s| s.keys()).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

impl Default for ConfigProvider {
    fn default() -> Self {
        let mut provider = Self::new();
        provider.add_source(Box::new(EnvironmentConfigSource::new()));
        provider
    }
}

fn keyed(key: &str, err: SingletonError) -> SingletonError {
    match err {
        SingletonError::Config(msg) => SingletonError::Config(format!("{}: {}", key, msg)),
        other => other,
    }
}

/// Engine-wide settings
///
/// # Examples
///
/// ```rust
/// use ferrous_singleton::{ArgumentMismatch, EngineConfig};
///
/// let config = EngineConfig::default()
///     .with_argument_mismatch(ArgumentMismatch::Permissive)
///     .with_max_construction_depth(32);
///
/// assert_eq!(config.argument_mismatch, ArgumentMismatch::Permissive);
/// assert!(config.warn_on_derivable);
/// assert_eq!(config.max_construction_depth, 32);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EngineConfig {
    /// Mismatch mode given to wrapped types that don't pick their own
    pub argument_mismatch: ArgumentMismatch,
    /// Warn when a derivable singleton is wrapped
    pub warn_on_derivable: bool,
    /// Deepest allowed nesting of `construct` calls on one thread
    pub max_construction_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            argument_mismatch: ArgumentMismatch::Strict,
            warn_on_derivable: true,
            max_construction_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Resolves every setting through `config`, keeping defaults for missing
    /// keys. Values of the wrong shape are errors.
    pub fn load(config: &ConfigProvider) -> SingletonResult<Self> {
        let defaults = Self::default();

        let argument_mismatch = match config.get_string(KEY_ARGUMENT_MISMATCH)? {
            Some(mode) => mode.parse().map_err(|e| keyed(KEY_ARGUMENT_MISMATCH, e))?,
            None => defaults.argument_mismatch,
        };

        let warn_on_derivable = config
            .get_bool(KEY_WARN_ON_DERIVABLE)?
            .unwrap_or(defaults.warn_on_derivable);

        let max_construction_depth = match config.get_i64(KEY_MAX_DEPTH)? {
            Some(depth) if depth >= 1 => depth as usize,
            Some(depth) => {
                return Err(SingletonError::Config(format!(
                    "{}: must be at least 1, got {}",
                    KEY_MAX_DEPTH, depth
                )))
            }
            None => defaults.max_construction_depth,
        };

        Ok(Self {
            argument_mismatch,
            warn_on_derivable,
            max_construction_depth,
        })
    }

    /// Loads from environment variables (`SINGLETON_ARGUMENTS_MISMATCH`, ...).
    pub fn from_env() -> SingletonResult<Self> {
        Self::load(&ConfigProvider::default())
    }

    /// Loads from a JSON document.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> SingletonResult<Self> {
        let mut provider = ConfigProvider::new();
        provider.add_source(Box::new(JsonConfigSource::parse(json)?));
        Self::load(&provider)
    }

    pub fn with_argument_mismatch(mut self, mode: ArgumentMismatch) -> Self {
        self.argument_mismatch = mode;
        self
    }

    pub fn with_warn_on_derivable(mut self, warn: bool) -> Self {
        self.warn_on_derivable = warn;
        self
    }

    pub fn with_max_construction_depth(mut self, depth: usize) -> Self {
        self.max_construction_depth = depth.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[derive(Debug)]
    struct MapSource(HashMap<String, ConfigValue>);

    impl MapSource {
        fn new(entries: &[(&str, ConfigValue)]) -> Box<Self> {
            Box::new(Self(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            ))
        }
    }

    impl ConfigSource for MapSource {
        fn get(&self, key: &str) -> Option<ConfigValue> {
            self.0.get(key).cloned()
        }

        fn keys(&self) -> Vec<String> {
            self.0.keys().cloned().collect()
        }
    }

    #[test]
    #[serial]
    fn test_environment_source_maps_dots() {
        env::set_var("SINGLETON_DEPTH_MAX", "12");
        env::set_var("SINGLETON_ARGUMENTS_MISMATCH", "permissive");

        let source = EnvironmentConfigSource::new();
        assert_eq!(source.get(KEY_MAX_DEPTH), Some(ConfigValue::Integer(12)));
        assert_eq!(
            source.get(KEY_ARGUMENT_MISMATCH),
            Some(ConfigValue::String("permissive".to_string()))
        );

        env::remove_var("SINGLETON_DEPTH_MAX");
        env::remove_var("SINGLETON_ARGUMENTS_MISMATCH");
    }

    #[test]
    #[serial]
    fn test_environment_source_with_prefix() {
        env::set_var("MYAPP_SINGLETON_DERIVABLE_WARN", "false");

        let source = EnvironmentConfigSource::with_prefix("myapp");
        assert_eq!(source.get(KEY_WARN_ON_DERIVABLE), Some(ConfigValue::Boolean(false)));
        assert!(source.keys().contains(&KEY_WARN_ON_DERIVABLE.to_string()));

        env::remove_var("MYAPP_SINGLETON_DERIVABLE_WARN");
    }

    #[test]
    #[serial]
    fn test_environment_keys_resolve_through_get() {
        env::set_var("SINGLETON_DERIVABLE_WARN", "0");
        env::set_var("SINGLETON_DEPTH_MAX", "7");

        let mut provider = ConfigProvider::new();
        provider.add_source(Box::new(EnvironmentConfigSource::new()));
        for key in [KEY_WARN_ON_DERIVABLE, KEY_MAX_DEPTH] {
            assert!(provider.all_keys().contains(&key.to_string()));
            assert!(provider.get(key).is_some());
        }

        let config = EngineConfig::load(&provider).unwrap();
        assert!(!config.warn_on_derivable);
        assert_eq!(config.max_construction_depth, 7);

        env::remove_var("SINGLETON_DERIVABLE_WARN");
        env::remove_var("SINGLETON_DEPTH_MAX");
    }

    #[test]
    fn test_integer_booleans() {
        assert!(ConfigValue::Integer(1).as_bool().unwrap());
        assert!(!ConfigValue::Integer(0).as_bool().unwrap());
        assert!(ConfigValue::Integer(2).as_bool().is_err());
    }

    #[test]
    #[serial]
    fn test_engine_config_from_env() {
        env::set_var("SINGLETON_ARGUMENTS_MISMATCH", "Permissive");
        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.argument_mismatch, ArgumentMismatch::Permissive);
        assert!(config.warn_on_derivable);
        env::remove_var("SINGLETON_ARGUMENTS_MISMATCH");
    }

    #[test]
    fn test_first_source_wins() {
        let mut provider = ConfigProvider::new();
        provider
            .add_source(MapSource::new(&[(KEY_MAX_DEPTH, ConfigValue::Integer(8))]))
            .add_source(MapSource::new(&[
                (KEY_MAX_DEPTH, ConfigValue::Integer(99)),
                (KEY_WARN_ON_DERIVABLE, ConfigValue::Boolean(false)),
            ]));

        let config = EngineConfig::load(&provider).unwrap();
        assert_eq!(config.max_construction_depth, 8);
        assert!(!config.warn_on_derivable);
        assert_eq!(config.argument_mismatch, ArgumentMismatch::Strict);
        assert_eq!(provider.all_keys().len(), 2);
    }

    #[test]
    fn test_missing_keys_keep_defaults() {
        let provider = ConfigProvider::new();
        assert_eq!(EngineConfig::load(&provider).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let mut provider = ConfigProvider::new();
        provider.add_source(MapSource::new(&[(
            KEY_ARGUMENT_MISMATCH,
            ConfigValue::String("lenient".to_string()),
        )]));
        match EngineConfig::load(&provider) {
            Err(SingletonError::Config(msg)) => {
                assert!(msg.starts_with(KEY_ARGUMENT_MISMATCH));
                assert!(msg.contains("lenient"));
            }
            other => panic!("Expected Config error, got {:?}", other),
        }

        let mut provider = ConfigProvider::new();
        provider.add_source(MapSource::new(&[(KEY_MAX_DEPTH, ConfigValue::Integer(0))]));
        assert!(matches!(EngineConfig::load(&provider), Err(SingletonError::Config(_))));

        let mut provider = ConfigProvider::new();
        provider.add_source(MapSource::new(&[(
            KEY_WARN_ON_DERIVABLE,
            ConfigValue::Array(vec![]),
        )]));
        assert!(matches!(EngineConfig::load(&provider), Err(SingletonError::Config(_))));
    }

    #[test]
    fn test_bool_accepts_strings() {
        assert!(ConfigValue::String("true".to_string()).as_bool().unwrap());
        assert!(ConfigValue::String("nope".to_string()).as_bool().is_err());
        assert!(ConfigValue::Integer(1).as_string().is_err());
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_json_flat_and_nested() {
        let flat = EngineConfig::from_json(r#"{"singleton.depth.max": 16}"#).unwrap();
        assert_eq!(flat.max_construction_depth, 16);

        let nested = EngineConfig::from_json(
            r#"{"singleton": {"arguments": {"mismatch": "permissive"}, "derivable": {"warn": false}}}"#,
        )
        .unwrap();
        assert_eq!(nested.argument_mismatch, ArgumentMismatch::Permissive);
        assert!(!nested.warn_on_derivable);

        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(SingletonError::Config(_))
        ));
    }
}
