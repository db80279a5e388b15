use super::*;

use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
}

#[test]
fn keeps_memory_and_full_urls() {
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(
        normalize_database_url("sqlite://shop.db?mode=rwc"),
        "sqlite://shop.db?mode=rwc"
    );
}

#[test]
fn empty_url_falls_back_to_default() {
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
            database_url = "sqlite://./shop.db"
            low_stock_threshold = 3
            sale_mode = "two_step"
        "#,
    )
    .expect("parse");

    assert_eq!(settings.database_url, "sqlite://./shop.db");
    assert_eq!(settings.low_stock_threshold, 3);
    assert_eq!(settings.sale_mode, SaleMode::TwoStep);
    assert_eq!(settings.log_filter, "warn");
}

#[test]
fn unknown_file_keys_are_rejected() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "bind_addr = \"0.0.0.0:80\"").is_err());
}

#[test]
fn prefixed_env_wins_over_plain_env() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env(&[
            ("DATABASE_URL", "sqlite://plain.db"),
            ("POS__DATABASE_URL", "sqlite://prefixed.db"),
            ("POS__SALE_MODE", "two-step"),
            ("RUST_LOG", "debug"),
        ]),
    )
    .expect("env");

    assert_eq!(settings.database_url, "sqlite://prefixed.db");
    assert_eq!(settings.sale_mode, SaleMode::TwoStep);
    assert_eq!(settings.log_filter, "debug");
}

#[test]
fn malformed_threshold_is_an_error() {
    let mut settings = Settings::default();
    let err = apply_env(&mut settings, env(&[("POS__LOW_STOCK_THRESHOLD", "lots")]))
        .expect_err("invalid");
    assert!(err.to_string().contains("POS__LOW_STOCK_THRESHOLD"));
}

#[test]
fn explicit_missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    assert!(load_settings(Some(&missing)).is_err());
}

#[test]
fn explicit_config_file_is_loaded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("pos.toml");
    fs::write(&path, "low_stock_threshold = 2\n").expect("write");

    let settings = load_settings(Some(&path)).expect("load");
    assert_eq!(settings.low_stock_threshold, 2);
}
