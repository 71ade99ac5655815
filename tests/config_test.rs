use mdlive::{HostKind, Settings};
use std::env;
use std::fs;
use tempfile::TempDir;

// Env vars and the working directory are process-wide, so discovery and
// overrides are checked in one test.
#[test]
fn test_workspace_discovery_and_env_override() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("docs").join("guides");
    fs::create_dir_all(&nested).unwrap();
    fs::create_dir_all(temp_dir.path().join(".mdlive")).unwrap();
    fs::write(
        temp_dir.path().join(".mdlive").join("settings.toml"),
        r#"
host = "editor"

[logging]
default = "info"
"#,
    )
    .unwrap();

    let original_dir = env::current_dir().unwrap();
    env::set_current_dir(&nested).unwrap();

    let found = Settings::find_workspace_config().unwrap();
    assert!(found.ends_with(".mdlive/settings.toml"));

    let settings = Settings::load().unwrap();
    assert_eq!(settings.host, HostKind::Editor);
    assert_eq!(settings.logging.default, "info");

    unsafe {
        // Double underscore separates nested levels
        env::set_var("MDLIVE_HOST", "browser");
        env::set_var("MDLIVE_BROWSER__FILE_SYSTEM_ACCESS", "false");
        env::set_var("MDLIVE_LOGGING__DEFAULT", "debug");
    }

    let settings = Settings::load().unwrap();
    assert_eq!(settings.host, HostKind::Browser);
    assert!(!settings.browser.file_system_access);
    assert_eq!(settings.logging.default, "debug");

    unsafe {
        env::remove_var("MDLIVE_HOST");
        env::remove_var("MDLIVE_BROWSER__FILE_SYSTEM_ACCESS");
        env::remove_var("MDLIVE_LOGGING__DEFAULT");
    }

    env::set_current_dir(original_dir).unwrap();
}

#[test]
fn test_init_then_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();

    let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
    assert!(path.exists());
    assert!(Settings::init_config_file(temp_dir.path(), false).is_err());

    let mut edited = Settings::load_from(&path).unwrap();
    edited.watch.poll_interval_ms = 250;
    edited.watch.skip_unchanged_content = false;
    edited.picker.extensions = vec!["md".to_string()];
    edited.save(&path).unwrap();

    let loaded = Settings::load_from(&path).unwrap();
    assert_eq!(loaded.watch.poll_interval_ms, 250);
    assert!(!loaded.watch.skip_unchanged_content);
    assert_eq!(loaded.picker.extensions, vec!["md"]);
    assert!(!loaded.picker.matches("notes.txt"));

    // Forced init restores defaults
    Settings::init_config_file(temp_dir.path(), true).unwrap();
    let reset = Settings::load_from(&path).unwrap();
    assert_eq!(reset.watch.poll_interval_ms, 1000);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("partial.toml");
    fs::write(
        &path,
        r#"
[watch]
debounce_ms = 50
"#,
    )
    .unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.watch.debounce_ms, 50);
    assert_eq!(settings.watch.poll_interval_ms, 1000);
    assert_eq!(settings.watch.settle_ms, 100);

    let options = settings.watch.options();
    assert_eq!(
        options.effective_debounce(),
        std::time::Duration::from_millis(50)
    );
}

#[test]
fn test_unusable_intervals_are_rejected() {
    let temp_dir = TempDir::new().unwrap();

    for (body, key) in [
        ("[watch]\npoll_interval_ms = 0\n", "poll_interval_ms"),
        ("[watch]\ndebounce_ms = 9999999999999\n", "debounce_ms"),
        ("[watch]\nsettle_ms = 3600001\n", "settle_ms"),
    ] {
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, body).unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains(key), "{key}: {err}");
    }

    let path = temp_dir.path().join("edge.toml");
    fs::write(&path, "[watch]\npoll_interval_ms = 1\ndebounce_ms = 0\n").unwrap();
    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(
        settings.watch.options().effective_poll_interval(),
        std::time::Duration::from_millis(1)
    );
}
