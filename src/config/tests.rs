use std::io::Write;

use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.default_ttl, Duration::from_secs(3600));
    assert_eq!(settings.cache.capacity.get(), 1000);
    assert_eq!(settings.cache.consume_batch_limit.get(), 100);
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.database.url.is_none());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.cache.enabled = Some(true);

    raw.apply_logging_overrides(&LoggingOverrides {
        log_level: Some("debug".to_string()),
        log_json: Some(true),
    });
    raw.apply_cache_overrides(&CacheOverrides {
        cache_enabled: Some(false),
        consume_batch_limit: Some(7),
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(matches!(settings.logging.format, LogFormat::Json));
    assert!(!settings.cache.enabled);
    assert_eq!(settings.cache.consume_batch_limit.get(), 7);
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.default_ttl_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.default_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn zero_batch_limit_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.consume_batch_limit = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero batch");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.consume_batch_limit",
            ..
        }
    ));
}

#[test]
fn bad_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "logging.level",
            ..
        })
    ));
}

#[test]
fn blank_database_url_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn config_file_is_layered() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        "[cache]\ndefault_ttl_seconds = 60\ncapacity = 10\n\n[database]\nmax_connections = 2"
    )
    .expect("write config");

    let path = file.path().to_string_lossy().to_string();
    let args = CliArgs::parse_from(["corpsite", "--config-file", path.as_str(), "tags"]);
    let settings = load(&args).expect("settings");

    assert_eq!(settings.cache.default_ttl, Duration::from_secs(60));
    assert_eq!(settings.cache.capacity.get(), 10);
    assert_eq!(settings.database.max_connections.get(), 2);
}

#[test]
fn default_command_is_none() {
    let args = CliArgs::parse_from(["corpsite"]);
    assert!(args.command.is_none());
}

#[test]
fn parse_plan_arguments() {
    let args = CliArgs::parse_from([
        "corpsite",
        "plan",
        "--input",
        "/tmp/changes.jsonl",
        "--division",
        "7=acme",
        "--division",
        " 8 = beta ",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("plan command") {
        Command::Plan(plan) => {
            assert_eq!(
                plan.input.as_deref(),
                Some(std::path::Path::new("/tmp/changes.jsonl"))
            );
            assert_eq!(
                plan.divisions,
                vec![(7, "acme".to_string()), (8, "beta".to_string())]
            );
            assert_eq!(
                plan.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn malformed_division_is_rejected() {
    let result = CliArgs::try_parse_from(["corpsite", "plan", "--division", "acme"]);
    assert!(result.is_err());
}

#[test]
fn parse_tags_arguments() {
    let args = CliArgs::parse_from(["corpsite", "--log-level", "warn", "tags", "clients"]);

    assert_eq!(args.logging.log_level.as_deref(), Some("warn"));
    match args.command.expect("tags command") {
        Command::Tags(tags) => assert_eq!(tags.names, vec!["clients".to_string()]),
        _ => panic!("wrong command parsed"),
    }
}
