//! Tests for data folder resolution priority

use serial_test::serial;
use tagsense_common::config::{db_path, resolve_data_folder};

const TEST_ENV_VAR: &str = "TAGSENSE_TEST_DATA_FOLDER";

#[test]
#[serial]
fn test_cli_arg_wins_over_env() {
    std::env::set_var(TEST_ENV_VAR, "/from/env");

    let resolved = resolve_data_folder(Some("/from/cli"), TEST_ENV_VAR).unwrap();
    assert_eq!(resolved, std::path::PathBuf::from("/from/cli"));

    std::env::remove_var(TEST_ENV_VAR);
}

#[test]
#[serial]
fn test_env_used_when_no_cli_arg() {
    std::env::set_var(TEST_ENV_VAR, "/from/env");

    let resolved = resolve_data_folder(None, TEST_ENV_VAR).unwrap();
    assert_eq!(resolved, std::path::PathBuf::from("/from/env"));

    std::env::remove_var(TEST_ENV_VAR);
}

#[test]
#[serial]
fn test_empty_env_is_ignored() {
    std::env::set_var(TEST_ENV_VAR, "");

    let resolved = resolve_data_folder(None, TEST_ENV_VAR).unwrap();
    assert_ne!(resolved, std::path::PathBuf::from(""));

    std::env::remove_var(TEST_ENV_VAR);
}

#[test]
#[serial]
fn test_fallback_resolves_somewhere() {
    std::env::remove_var(TEST_ENV_VAR);

    // With no CLI arg, no env var and (almost certainly) no config file,
    // resolution still produces a usable path
    let resolved = resolve_data_folder(None, TEST_ENV_VAR).unwrap();
    assert!(!resolved.as_os_str().is_empty());
}

#[test]
fn test_db_path_appends_file_name() {
    let path = db_path(std::path::Path::new("/data/tagsense"));
    assert_eq!(path, std::path::PathBuf::from("/data/tagsense/tagsense.db"));
}
