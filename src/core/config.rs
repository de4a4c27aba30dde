use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_path: PathBuf,

    // Refresh coordinator
    pub refresh_interval_secs: u64,
    pub source_timeout_secs: u64,
    pub persist_mirror: bool,

    // Query engine
    pub query_cache_size: usize,   // LRU entries, 0 disables
    pub featured_default_limit: usize,
    pub extended_search: bool,     // also match model/category/subcategory
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./database"),

            refresh_interval_secs: 10 * 60,
            source_timeout_secs: 30,
            persist_mirror: true,

            query_cache_size: 1024,
            featured_default_limit: 20,
            extended_search: false,
        }
    }
}

impl Config {
    /// Defaults overlaid with `CATALOG_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning and the default kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup("CATALOG_STORAGE_PATH") {
            config.storage_path = PathBuf::from(path);
        }
        overlay(&lookup, "CATALOG_REFRESH_INTERVAL_SECS", &mut config.refresh_interval_secs);
        overlay(&lookup, "CATALOG_SOURCE_TIMEOUT_SECS", &mut config.source_timeout_secs);
        overlay(&lookup, "CATALOG_PERSIST_MIRROR", &mut config.persist_mirror);
        overlay(&lookup, "CATALOG_QUERY_CACHE_SIZE", &mut config.query_cache_size);
        overlay(&lookup, "CATALOG_FEATURED_LIMIT", &mut config.featured_default_limit);
        overlay(&lookup, "CATALOG_EXTENDED_SEARCH", &mut config.extended_search);

        config
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs.max(1))
    }
}

fn overlay<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => log::warn!("[Config] Ignoring {}={:?}: not a valid value", key, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_the_ten_minute_refresh() {
        let config = Config::default();
        assert_eq!(config.refresh_interval(), Duration::from_secs(600));
        assert!(config.persist_mirror);
        assert!(!config.extended_search);
    }

    #[test]
    fn env_values_override_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CATALOG_STORAGE_PATH", "/tmp/catalog"),
            ("CATALOG_REFRESH_INTERVAL_SECS", "30"),
            ("CATALOG_EXTENDED_SEARCH", "true"),
            ("CATALOG_QUERY_CACHE_SIZE", "not-a-number"),
        ]);
        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.storage_path, PathBuf::from("/tmp/catalog"));
        assert_eq!(config.refresh_interval_secs, 30);
        assert!(config.extended_search);
        assert_eq!(config.query_cache_size, 1024);
    }
}
