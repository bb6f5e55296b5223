//! Configuration layering: defaults, global file, project files, explicit
//! file and environment overrides.

use std::fs;
use tempfile::TempDir;
use tether::config::global_config_path;
use tether::types::CapabilityClass;
use tether::{ConfigLoader, GenerationClient, GenerationError, TetherConfig};

use crate::integration::with_isolated_env;

#[test]
fn empty_project_loads_defaults() {
    let test_dir = TempDir::new().unwrap();
    let project = test_dir.path().join("project");
    fs::create_dir_all(&project).unwrap();

    let config = with_isolated_env(&test_dir, || ConfigLoader::load(&project).unwrap());
    assert_eq!(config, TetherConfig::default());
}

#[test]
fn project_file_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    let project = test_dir.path().join("project");
    fs::create_dir_all(&project).unwrap();

    let config = with_isolated_env(&test_dir, || {
        let global = global_config_path().unwrap();
        assert!(global.starts_with(test_dir.path()));
        fs::create_dir_all(global.parent().unwrap()).unwrap();
        fs::write(
            &global,
            "[retry]\nmax_attempts_per_model = 4\ndefault_wait_secs = 2\n",
        )
        .unwrap();
        fs::write(
            project.join("tether.toml"),
            "[retry]\nmax_attempts_per_model = 3\n",
        )
        .unwrap();
        ConfigLoader::load(&project).unwrap()
    });

    assert_eq!(config.retry.max_attempts_per_model, 3);
    assert_eq!(config.retry.default_wait_secs, 2);
}

#[test]
fn environment_file_follows_tether_env() {
    let test_dir = TempDir::new().unwrap();
    let project = test_dir.path().join("project");
    fs::create_dir_all(project.join("config")).unwrap();
    fs::write(project.join("tether.toml"), "[defaults]\ntemperature = 0.3\n").unwrap();
    fs::write(
        project.join("config").join("staging.toml"),
        "[defaults]\ntemperature = 0.9\n",
    )
    .unwrap();

    let (development, staging) = with_isolated_env(&test_dir, || {
        let development = ConfigLoader::load(&project).unwrap();
        std::env::set_var("TETHER_ENV", "staging");
        let staging = ConfigLoader::load(&project).unwrap();
        (development, staging)
    });

    assert!((development.defaults.temperature - 0.3).abs() < f32::EPSILON);
    assert!((staging.defaults.temperature - 0.9).abs() < f32::EPSILON);
}

#[test]
fn environment_variables_override_files() {
    let test_dir = TempDir::new().unwrap();
    let project = test_dir.path().join("project");
    fs::create_dir_all(&project).unwrap();
    fs::write(
        project.join("tether.toml"),
        "[retry]\nmax_attempts_per_model = 3\n\n[api]\nbase_url = \"http://file.invalid\"\n",
    )
    .unwrap();

    let config = with_isolated_env(&test_dir, || {
        std::env::set_var("TETHER__RETRY__MAX_ATTEMPTS_PER_MODEL", "5");
        std::env::set_var("TETHER__API__BASE_URL", "http://env.invalid");
        ConfigLoader::load(&project).unwrap()
    });

    assert_eq!(config.retry.max_attempts_per_model, 5);
    assert_eq!(config.api.base_url, "http://env.invalid");
}

#[test]
fn explicit_file_sits_above_project_files() {
    let test_dir = TempDir::new().unwrap();
    let project = test_dir.path().join("project");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("tether.toml"), "[logging]\nlevel = \"info\"\n").unwrap();
    let explicit = test_dir.path().join("explicit.toml");
    fs::write(
        &explicit,
        r#"
[logging]
level = "debug"

[[catalog.fallback_models]]
id = "gemini-9-flash"
class = "fast"
"#,
    )
    .unwrap();

    let config = with_isolated_env(&test_dir, || {
        ConfigLoader::load_with(&project, Some(&explicit)).unwrap()
    });

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.catalog.fallback_models.len(), 1);
    assert_eq!(config.catalog.fallback_models[0].id, "gemini-9-flash");
    assert_eq!(config.catalog.fallback_models[0].class, CapabilityClass::Fast);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let test_dir = TempDir::new().unwrap();
    let missing = test_dir.path().join("nope.toml");
    let result = with_isolated_env(&test_dir, || {
        ConfigLoader::load_with(test_dir.path(), Some(&missing))
    });
    assert!(matches!(result, Err(config::ConfigError::NotFound(_))));
}

#[test]
fn invalid_values_are_reported_by_validate() {
    let test_dir = TempDir::new().unwrap();
    let project = test_dir.path().join("project");
    fs::create_dir_all(&project).unwrap();
    fs::write(
        project.join("tether.toml"),
        "[retry]\nmax_attempts_per_model = 0\n\n[logging]\nformat = \"yaml\"\n",
    )
    .unwrap();

    let config = with_isolated_env(&test_dir, || ConfigLoader::load(&project).unwrap());
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 2);
}

#[test]
fn client_from_config_reads_key_from_named_variable() {
    let test_dir = TempDir::new().unwrap();
    let mut config = TetherConfig::default();
    config.api.api_key_env = "TETHER_TEST_API_KEY".to_string();

    let result = with_isolated_env(&test_dir, || {
        let missing = GenerationClient::from_config(&config).map(|_| ());
        std::env::set_var("TETHER_TEST_API_KEY", "secret");
        let present = GenerationClient::from_config(&config).map(|c| c.transport_name().to_string());
        std::env::remove_var("TETHER_TEST_API_KEY");
        (missing, present)
    });

    assert!(matches!(result.0, Err(GenerationError::NotConfigured(_))));
    assert_eq!(result.1.unwrap(), "gemini");
}
