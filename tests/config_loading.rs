use std::env;
use std::fs;

use droidpilot_cli::cli::runtime::{load_config, load_env_file};
use droidpilot_cli::config::{ENV_API_BASE, ENV_MAX_STEPS, ENV_MODEL};
use serial_test::serial;

fn clear_overrides() {
    for key in [ENV_MAX_STEPS, ENV_MODEL, ENV_API_BASE] {
        env::remove_var(key);
    }
}

#[tokio::test]
#[serial]
async fn missing_file_falls_back_to_defaults() {
    clear_overrides();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let loaded = load_config(Some(&path)).await.unwrap();
    assert_eq!(loaded.path, path);
    assert_eq!(loaded.config.agent.max_steps, 100);
    assert_eq!(loaded.config.device.screen_width, 1080);
}

#[tokio::test]
#[serial]
async fn environment_overrides_file_values() {
    clear_overrides();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "agent:\n  max_steps: 12\nmodel:\n  model: from-file\n").unwrap();

    env::set_var(ENV_MAX_STEPS, "30");
    env::set_var(ENV_MODEL, "from-env");
    let loaded = load_config(Some(&path)).await;
    clear_overrides();

    let config = loaded.unwrap().config;
    assert_eq!(config.agent.max_steps, 30);
    assert_eq!(config.model.model, "from-env");
}

#[tokio::test]
#[serial]
async fn invalid_override_is_ignored() {
    clear_overrides();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "agent:\n  max_steps: 12\n").unwrap();

    env::set_var(ENV_MAX_STEPS, "many");
    let loaded = load_config(Some(&path)).await;
    clear_overrides();

    assert_eq!(loaded.unwrap().config.agent.max_steps, 12);
}

#[test]
#[serial]
fn env_file_does_not_clobber_existing_variables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.env");
    fs::write(
        &path,
        "# comment\nDROIDPILOT_TEST_FRESH=\"quoted value\"\nDROIDPILOT_TEST_KEPT=file\nnot a pair\n",
    )
    .unwrap();

    env::remove_var("DROIDPILOT_TEST_FRESH");
    env::set_var("DROIDPILOT_TEST_KEPT", "shell");
    load_env_file(&path);

    assert_eq!(env::var("DROIDPILOT_TEST_FRESH").unwrap(), "quoted value");
    assert_eq!(env::var("DROIDPILOT_TEST_KEPT").unwrap(), "shell");

    env::remove_var("DROIDPILOT_TEST_FRESH");
    env::remove_var("DROIDPILOT_TEST_KEPT");
}
