pub mod inspect;
pub mod run;
pub mod table;

use anyhow::{Context, Result};
use fracimperv::Config;

/// Load the config file if one was given, otherwise start from defaults.
pub(crate) fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}
