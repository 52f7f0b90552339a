use anyhow::{bail, Context};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "tidal-playlist";
const CONFIG_FILE: &str = "config.yaml";
const ENV_PREFIX: &str = "TIDAL_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tidal: TidalConfig,
    #[serde(default)]
    pub playlist: PlaylistConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    /// When set, logs are also written to a daily file in this directory.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TidalConfig {
    #[serde(default, deserialize_with = "loose_string")]
    pub client_id: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub client_secret: String,
    #[serde(default = "default_country_code", deserialize_with = "loose_string")]
    pub country_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    #[serde(default = "default_playlist_name")]
    pub default_name: String,
    /// Number of tracks to generate.
    #[serde(default)]
    pub count: usize,
}

/// Artist id filters. A non-empty whitelist wins over the blacklist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FiltersConfig {
    #[serde(default, deserialize_with = "loose_strings")]
    pub whitelist: Vec<String>,
    #[serde(default, deserialize_with = "loose_strings")]
    pub blacklist: Vec<String>,
}

/// Accepts a string or a bare number. TIDAL ids are numeric, and YAML and
/// environment values like `7804` arrive as integers.
struct LooseString(String);

impl<'de> Deserialize<'de> for LooseString {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct V;

        impl<'de> Visitor<'de> for V {
            type Value = LooseString;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or a number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<LooseString, E> {
                Ok(LooseString(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<LooseString, E> {
                Ok(LooseString(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<LooseString, E> {
                Ok(LooseString(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<LooseString, E> {
                Ok(LooseString(v.to_string()))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<LooseString, E> {
                Ok(LooseString(v.to_string()))
            }

            fn visit_i128<E: de::Error>(self, v: i128) -> Result<LooseString, E> {
                Ok(LooseString(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<LooseString, E> {
                Ok(LooseString(v.to_string()))
            }
        }

        d.deserialize_any(V)
    }
}

fn loose_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    LooseString::deserialize(d).map(|s| s.0)
}

fn loose_strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let items = Vec::<LooseString>::deserialize(d)?;
    Ok(items.into_iter().map(|s| s.0).collect())
}

fn default_country_code() -> String { "US".into() }
fn default_playlist_name() -> String { "My Artists Mix".into() }

impl Default for TidalConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            country_code: default_country_code(),
        }
    }
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            default_name: default_playlist_name(),
            count: 0,
        }
    }
}

impl Config {
    /// Load defaults, then the YAML file, then `TIDAL_*` environment variables.
    ///
    /// An explicit `path` must exist. Without one, `./config.yaml` and then
    /// `<config dir>/tidal-playlist/config.yaml` are tried; having neither is fine.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(p) => {
                if !p.exists() {
                    bail!("config file not found: {}", p.display());
                }
                Some(p.to_path_buf())
            }
            None => Self::discover(),
        };
        Self::figment(file.as_deref())
            .extract()
            .with_context(|| match &file {
                Some(p) => format!("failed to load config from {}", p.display()),
                None => "failed to load config".to_string(),
            })
    }

    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(p) = file {
            figment = figment.merge(Yaml::file(p));
        }
        figment
            // TIDAL_CLIENT_ID, TIDAL_CLIENT_SECRET, TIDAL_COUNTRY_CODE
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .only(&["client_id", "client_secret", "country_code"])
                    .map(|k| format!("tidal.{}", k).into()),
            )
            // TIDAL_PLAYLIST__COUNT=25 etc.
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|d| d.join(APP_DIR).join(CONFIG_FILE))
            .filter(|p| p.exists())
    }

    /// A positive `count` from the command line replaces the configured one.
    pub fn override_count(&mut self, count: Option<usize>) {
        if let Some(n) = count.filter(|n| *n > 0) {
            self.playlist.count = n;
        }
    }

    /// Positional name, then `--name`, then `playlist.default_name`.
    pub fn playlist_name(&self, positional: Option<String>, flag: Option<String>) -> String {
        positional
            .or(flag)
            .unwrap_or_else(|| self.playlist.default_name.clone())
    }

    pub fn validate_credentials(&self) -> anyhow::Result<()> {
        if self.tidal.client_id.trim().is_empty() {
            bail!("tidal.client_id is required");
        }
        if self.tidal.client_secret.trim().is_empty() {
            bail!("tidal.client_secret is required");
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_credentials()?;
        if self.playlist.count < 1 {
            bail!("playlist.count must be at least 1");
        }
        Ok(())
    }
}
