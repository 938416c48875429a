use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::config::AppConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by layering a TOML file and `OMS_`-prefixed
    /// environment variables over the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a value fails to
    /// deserialize.
    pub fn load(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("OMS_").split("__"))
            .extract()?;

        Ok(config)
    }
}
