use clap::Parser;

use super::*;

fn base_raw() -> RawSettings {
    let mut raw = RawSettings::default();
    raw.signing.secret = Some("test-secret".to_string());
    raw
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = base_raw();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = base_raw();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn uploads_limit_defaults_to_10_mib() {
    let settings = Settings::from_raw(base_raw()).expect("valid settings");
    assert_eq!(
        settings.uploads.max_request_bytes.get(),
        DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
    );
}

#[test]
fn cache_ttls_default_below_signed_url_lifetime() {
    let settings = Settings::from_raw(base_raw()).expect("valid settings");
    assert_eq!(settings.cache.policy.search_ttl, Duration::from_secs(3600));
    assert_eq!(settings.cache.policy.record_ttl, Duration::from_secs(3000));
    assert!(settings.cache.policy.record_ttl < settings.signing.url_ttl);
}

#[test]
fn record_ttl_at_or_above_url_ttl_is_rejected() {
    let mut raw = base_raw();
    raw.cache.record_ttl_seconds = Some(3600);
    raw.signing.url_ttl_seconds = Some(3600);

    let err = Settings::from_raw(raw).expect_err("must reject");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.record_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn blank_signing_secret_is_rejected() {
    let mut raw = RawSettings::default();
    raw.signing.secret = Some("   ".to_string());

    let err = Settings::from_raw(raw).expect_err("must reject");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "signing.secret",
            ..
        }
    ));
}

#[test]
fn popular_searches_default_when_unset() {
    let settings = Settings::from_raw(base_raw()).expect("valid settings");
    assert_eq!(
        settings.cache.policy.popular_searches,
        default_popular_searches()
    );
}

#[test]
fn configured_popular_searches_replace_the_defaults() {
    let mut raw = base_raw();
    raw.cache.popular_searches = Some(vec![RawPopularSearch {
        subject: Some("Biology".to_string()),
        ..Default::default()
    }]);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.policy.popular_searches.len(), 1);
    assert_eq!(
        settings.cache.policy.popular_searches[0].subject.as_deref(),
        Some("Biology")
    );
}

#[test]
fn blank_redis_url_reads_as_absent() {
    let mut raw = base_raw();
    raw.cache.redis_url = Some("  ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.cache.redis_url.is_none());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["folio"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from(["folio", "migrate", "--database-url", "postgres://example"]);
    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(
                migrate.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
