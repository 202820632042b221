//! Layered configuration loading.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`<PREFIX>__<SECTION>__<FIELD>`)
//! 2. Config file (`<file_prefix>.toml`, or any format the `config` crate knows)
//! 3. Defaults of the section type

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Build the layered source set.
///
/// `list_keys` names dotted keys (e.g. `gateway.implementations`) whose
/// environment values are comma-separated lists.
pub fn layered(file_prefix: &str, env_prefix: &str, list_keys: &[&str]) -> Result<config::Config> {
    let mut env = config::Environment::with_prefix(env_prefix)
        .separator("__")
        .try_parsing(true);
    if !list_keys.is_empty() {
        env = env.list_separator(",");
        for key in list_keys {
            env = env.with_list_parse_key(key);
        }
    }

    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(env)
        .build()?;
    Ok(cfg)
}

/// Extract one section, falling back to its defaults when it is absent.
pub fn section<T>(cfg: &config::Config, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match cfg.get::<T>(key) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}
