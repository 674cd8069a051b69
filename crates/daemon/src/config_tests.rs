// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn parts(file: FileConfig, grace: Option<Duration>) -> Result<SupervisorConfig, ConfigError> {
    SupervisorConfig::from_parts("/state".into(), "/state/crawler.sock".into(), file, grace)
}

#[test]
fn defaults_without_file() {
    let config = parts(FileConfig::default(), None).unwrap();
    assert_eq!(config.grace, DEFAULT_GRACE);
    assert_eq!(config.restart, RestartPolicy::default());
    assert_eq!(config.processes[&ProcessName::Crawler].command, "hv-crawler");
    assert_eq!(config.processes[&ProcessName::Backend].command, "hv-backend");
    assert_eq!(config.lock_path, PathBuf::from("/state/hvd.pid"));
    assert_eq!(config.log_dir, PathBuf::from("/state/logs"));
}

#[test]
fn file_values_are_applied() {
    let file: FileConfig = toml::from_str(
        r#"
        grace_ms = 2500

        [restart]
        base_ms = 50
        max_restarts = 4

        [crawler]
        command = "node"
        args = ["crawler.js"]
        env = { NODE_ENV = "production" }
        "#,
    )
    .unwrap();
    let config = parts(file, None).unwrap();

    assert_eq!(config.grace, Duration::from_millis(2500));
    assert_eq!(config.restart.base, Duration::from_millis(50));
    assert_eq!(config.restart.max, Duration::from_millis(30_000));
    assert_eq!(config.restart.max_restarts, 4);
    let crawler = &config.processes[&ProcessName::Crawler];
    assert_eq!(crawler.args, vec!["crawler.js".to_string()]);
    assert_eq!(crawler.env["NODE_ENV"], "production");
}

#[test]
fn env_grace_overrides_file() {
    let file = FileConfig { grace_ms: Some(2500), ..Default::default() };
    let config = parts(file, Some(Duration::from_millis(100))).unwrap();
    assert_eq!(config.grace, Duration::from_millis(100));
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(toml::from_str::<FileConfig>("restart_base = 1").is_err());
}

#[test]
fn empty_command_is_rejected() {
    let file = FileConfig { backend: Some(ProcessSpec::new(" ")), ..Default::default() };
    assert!(matches!(parts(file, None), Err(ConfigError::EmptyCommand(ProcessName::Backend))));
}

#[test]
fn read_reports_parse_errors_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("harvest.toml");
    std::fs::write(&path, "grace_ms = \"soon\"").unwrap();
    let err = FileConfig::read(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("harvest.toml"));
}

#[test]
fn child_env_points_at_shared_paths() {
    let config = parts(FileConfig::default(), None).unwrap();
    assert_eq!(
        config.child_env(),
        vec![
            ("HV_STATE_DIR".to_string(), "/state".to_string()),
            ("HV_SOCKET".to_string(), "/state/crawler.sock".to_string()),
        ]
    );
}
