use crate::error::AppError;
use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `APP_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "APP";

/// Resolve `<service>/config` whether the process runs from the workspace
/// root or from inside the service directory.
pub fn config_directory(base_path: &Path, service_dir: &str) -> PathBuf {
    if base_path.ends_with(service_dir) {
        base_path.join("config")
    } else {
        base_path.join(service_dir).join("config")
    }
}

/// Load `base.yaml` from the service's config directory, overlaid by
/// `APP_`-prefixed environment variables (`__` separates nested keys).
///
/// `list_keys` names the settings whose environment value is a
/// comma-separated list.
pub fn load_settings<T: DeserializeOwned>(
    service_dir: &str,
    list_keys: &[&str],
) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let base_path = std::env::current_dir()?;
    let directory = config_directory(&base_path, service_dir);

    load_settings_from(&directory.join("base.yaml"), list_keys)
}

pub fn load_settings_from<T: DeserializeOwned>(
    file: &Path,
    list_keys: &[&str],
) -> Result<T, AppError> {
    let mut environment = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .try_parsing(true);
    for key in list_keys {
        environment = environment.with_list_parse_key(key);
    }

    let settings = Config::builder()
        .add_source(File::from(file).required(true))
        .add_source(environment)
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}
