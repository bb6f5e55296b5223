//! Project config file source: ./tether.toml and ./config/{env}.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::{File, FileFormat};
use std::path::Path;

/// Environment variable selecting the per-environment file
pub const ENV_NAME_VAR: &str = "TETHER_ENV";

/// Add project config files to builder.
/// Precedence: tether.toml (base) then config/{TETHER_ENV}.toml (env-specific).
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    project_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let env_name = std::env::var(ENV_NAME_VAR).unwrap_or_else(|_| "development".to_string());
    let mut builder = builder;

    let base_config_path = project_root.join("tether.toml");
    if base_config_path.exists() {
        builder = builder.add_source(
            File::from(base_config_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    }

    let env_config_path = project_root
        .join("config")
        .join(format!("{}.toml", env_name));
    if env_config_path.exists() {
        builder = builder.add_source(
            File::from(env_config_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    }

    Ok(builder)
}
