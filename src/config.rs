use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prefix of environment variables overriding config values, so
/// `SNDATA_DATA_DIR` overrides `data_dir`.
pub const ENV_PREFIX: &str = "SNDATA_";

const DEFAULT_DATA_DIR: &str = "sndata_data";

/// Where downloaded release data is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Provider chain, lowest to highest precedence: defaults, the JSON
    /// document `json` when given, then `SNDATA_*` environment variables.
    pub fn figment(json: Option<&str>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(json) = json {
            figment = figment.merge(Json::string(json));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Defaults overridden by the environment; `./sndata_data` when
    /// nothing is set.
    pub fn from_env() -> Result<Self> {
        Ok(Self::figment(None).extract()?)
    }

    /// Config file values, still overridden by the environment.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::figment(Some(&contents)).extract()?)
    }

    /// Directory holding the data of one survey release.
    ///
    /// Path components are lower-cased with spaces replaced by underscores,
    /// so `("CSP", "DR 3")` maps to `<data_dir>/csp/dr_3`.
    pub fn release_dir(&self, survey_abbrev: &str, release: &str) -> PathBuf {
        self.data_dir
            .join(safe_component(survey_abbrev))
            .join(safe_component(release))
    }
}

fn safe_component(s: &str) -> String {
    s.to_lowercase().replace(' ', "_")
}
