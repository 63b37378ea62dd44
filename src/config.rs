//! Runtime settings.
//!
//! Loaded from an optional `cfw_guide.toml` in the working directory, then
//! overridden by `CFW_GUIDE__*` environment variables, e.g.
//! `CFW_GUIDE__COOLDOWNS__MEME__PERIOD_SECS=10`. Every field has a default,
//! so an empty environment yields a working configuration.

use crate::error::ConfigError;
use crate::models::cooldown::Rate;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub cooldowns: CooldownSettings,
}

impl Settings {
    #[instrument]
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix("CFW_GUIDE")
            .separator("__")
            .try_parsing(true)
    }

    /// Defaults, then the optional file, then `env`; later sources win per key.
    fn load_from(env: Environment) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name("cfw_guide").required(false))
            .add_source(env)
            .build()?
            .try_deserialize()?;
        debug!(?settings, "loaded settings");
        Ok(settings)
    }
}

/// Catalog endpoints and how long each response stays fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub guide_url: String,
    pub guide_ttl_secs: u64,
    pub jba_apps_url: String,
    pub jba_apps_ttl_secs: u64,
    pub signed_status_url: String,
    pub signed_status_ttl_secs: u64,
    pub devices_url: String,
    pub devices_ttl_secs: u64,
    /// Producer timeout; zero disables it.
    pub fetch_timeout_secs: u64,
}

impl CatalogSettings {
    pub fn guide_ttl(&self) -> Duration {
        Duration::from_secs(self.guide_ttl_secs)
    }

    pub fn jba_apps_ttl(&self) -> Duration {
        Duration::from_secs(self.jba_apps_ttl_secs)
    }

    pub fn signed_status_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_status_ttl_secs)
    }

    pub fn devices_ttl(&self) -> Duration {
        Duration::from_secs(self.devices_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            guide_url: "https://ios.cfw.guide/main.json".to_string(),
            guide_ttl_secs: 3600,
            jba_apps_url: "https://jailbreaks.app/json/apps.json".to_string(),
            jba_apps_ttl_secs: 3600,
            signed_status_url: "https://jailbreaks.app/status.php".to_string(),
            signed_status_ttl_secs: 1800,
            devices_url: "https://api.ipsw.me/v4/devices".to_string(),
            devices_ttl_secs: 3600,
            fetch_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSettings {
    pub limit: u32,
    pub period_secs: u64,
}

impl RateSettings {
    pub fn rate(&self) -> Result<Rate, ConfigError> {
        Rate::per_seconds(self.limit, self.period_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownSettings {
    /// Per meme name.
    pub meme: RateSettings,
    /// Per guild.
    pub neural_net: RateSettings,
    pub sweep_interval_secs: u64,
    pub sweep_idle_windows: u32,
}

impl CooldownSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for CooldownSettings {
    fn default() -> Self {
        Self {
            meme: RateSettings {
                limit: 1,
                period_secs: 5,
            },
            neural_net: RateSettings {
                limit: 1,
                period_secs: 15,
            },
            sweep_interval_secs: 300,
            sweep_idle_windows: 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_command_cooldowns() {
        let settings = Settings::default();
        assert_eq!(settings.cooldowns.meme.rate().unwrap(), Rate::per_seconds(1, 5).unwrap());
        assert_eq!(
            settings.cooldowns.neural_net.rate().unwrap(),
            Rate::per_seconds(1, 15).unwrap()
        );
        assert_eq!(settings.catalog.signed_status_ttl(), Duration::from_secs(1800));
        assert_eq!(settings.catalog.fetch_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(
                "[catalog]\nguide_ttl_secs = 60\nfetch_timeout_secs = 0\n\n[cooldowns.meme]\nlimit = 3\nperiod_secs = 30\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.catalog.guide_ttl(), Duration::from_secs(60));
        assert_eq!(settings.catalog.fetch_timeout(), None);
        assert_eq!(settings.catalog.jba_apps_ttl_secs, 3600);
        assert_eq!(settings.cooldowns.meme.limit, 3);
        assert_eq!(settings.cooldowns.neural_net.period_secs, 15);
    }

    #[test]
    fn single_env_override_keeps_sibling_defaults() {
        let vars = [("CFW_GUIDE__COOLDOWNS__MEME__PERIOD_SECS".to_string(), "10".to_string())]
            .into_iter()
            .collect::<config::Map<String, String>>();
        let settings = Settings::load_from(Settings::environment().source(Some(vars))).unwrap();

        assert_eq!(settings.cooldowns.meme.period_secs, 10);
        assert_eq!(settings.cooldowns.meme.limit, 1);
        assert_eq!(settings.cooldowns.neural_net, CooldownSettings::default().neural_net);
        assert_eq!(settings.catalog, CatalogSettings::default());
    }

    #[test]
    fn empty_environment_loads_defaults() {
        let vars = config::Map::<String, String>::new();
        let settings = Settings::load_from(Settings::environment().source(Some(vars))).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn zero_period_is_rejected() {
        let rate = RateSettings {
            limit: 1,
            period_secs: 0,
        };
        assert!(matches!(rate.rate(), Err(ConfigError::ZeroPeriod)));
    }
}
