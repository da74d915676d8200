use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.remote.url = Some("https://file.example".to_string());

    let overrides = GlobalOverrides {
        log_level: Some("debug".to_string()),
        remote_url: Some("https://cli.example/base".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(
        settings.remote.url.expect("remote url").as_str(),
        "https://cli.example/base/"
    );
}

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::WARN);
    assert_eq!(settings.logging.format, LogFormat::Compact);
    assert!(settings.remote.url.is_none());
    assert_eq!(
        settings.remote.timeout,
        Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS)
    );
    assert_eq!(settings.cache.stale_after_ms, 5_000);
    assert_eq!(settings.cache.todo_detail_evict_after_ms, 10_000);
    assert_eq!(settings.storage.directory, PathBuf::from(DEFAULT_STORAGE_DIR));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.format, LogFormat::Json);
}

#[test]
fn stale_timer_must_precede_evict_timer() {
    let mut raw = RawSettings::default();
    raw.cache.stale_after_ms = 60_000;
    raw.cache.evict_after_ms = 30_000;

    let err = Settings::from_raw(raw).expect_err("invalid cache timers");
    assert!(matches!(err, LoadError::Invalid { key: "cache", .. }));
}

#[test]
fn zero_capacity_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.max_entries = 0;

    let err = Settings::from_raw(raw).expect_err("invalid capacity");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.max_entries",
            ..
        }
    ));
}

#[test]
fn remote_url_must_be_http() {
    let mut raw = RawSettings::default();
    raw.remote.url = Some("ftp://example.com".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid scheme");
    assert!(matches!(err, LoadError::Invalid { key: "remote.url", .. }));
}

#[test]
fn blank_api_key_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.remote.api_key = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.remote.api_key.is_none());
}

#[test]
fn parse_todo_list_with_filter() {
    let args = CliArgs::try_parse_from([
        "quire",
        "--storage-dir",
        "/tmp/quire",
        "todo",
        "list",
        "--filter",
        "done",
    ])
    .expect("parse todo list");

    assert_eq!(
        args.overrides.storage_dir.as_deref(),
        Some(std::path::Path::new("/tmp/quire"))
    );
    match args.command {
        Command::Todo(TodoCommand::List { filter }) => {
            assert_eq!(filter, crate::domain::todos::Filter::Completed);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_remote_profile() {
    let id = uuid::Uuid::new_v4();
    let args = CliArgs::try_parse_from(["quire", "remote", "profile", &id.to_string()])
        .expect("parse remote profile");

    match args.command {
        Command::Remote(RemoteCommand::Profile { id: parsed }) => assert_eq!(parsed, id),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn global_flags_follow_subcommand() {
    let args = CliArgs::try_parse_from(["quire", "remote", "posts", "--log-json", "true"])
        .expect("parse global flag after subcommand");

    assert_eq!(args.overrides.log_json, Some(true));
}
