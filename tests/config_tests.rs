use std::io::Write;
use std::time::Duration;

use clap::ValueEnum;

use hmi_telemetry::config::{ConfigError, ServiceConfig, SourceKind};

#[test]
fn test_defaults_are_valid() {
    let config = ServiceConfig::default();
    config.validate().unwrap();
    assert_eq!(config.listen_addr, "127.0.0.1:5000");
    assert_eq!(config.stale_threshold(), Duration::from_millis(500));
    assert_eq!(config.source, SourceKind::Simulated);
    assert_eq!(config.catalog().len(), 3);
}

#[test]
fn test_partial_toml_fills_defaults() {
    let config = ServiceConfig::from_toml(
        r#"
        stale_threshold_ms = 250
        source = "stdin"

        [[signals]]
        id = "speed"
        unit = "km/h"
        scale = 0.01
        min = 0.0
        max = 250.0
        "#,
    )
    .unwrap();

    assert_eq!(config.stale_threshold_ms, 250);
    assert_eq!(config.disconnect_threshold_ms, 500);
    assert_eq!(config.source, SourceKind::Stdin);
    assert_eq!(config.signals.len(), 1);
    assert_eq!(config.signals[0].length, 16);
    assert_eq!(config.signals[0].offset, 0.0);
    config.validate().unwrap();
}

#[test]
fn test_validation_rejects_bad_values() {
    let zero = ServiceConfig {
        stale_threshold_ms: 0,
        ..ServiceConfig::default()
    };
    assert!(matches!(zero.validate(), Err(ConfigError::Invalid(_))));

    let prune_too_eager = ServiceConfig {
        prune_max_age_ms: 100,
        ..ServiceConfig::default()
    };
    assert!(prune_too_eager.validate().is_err());

    let inverted = ServiceConfig::from_toml(
        r#"
        [[signals]]
        id = "speed"
        unit = "km/h"
        min = 10.0
        max = 0.0
        "#,
    )
    .unwrap();
    assert!(inverted.validate().is_err());
}

#[test]
fn test_load_from_explicit_file() {
    let path = std::env::temp_dir().join(format!("hmi-telemetry-test-{}.toml", std::process::id()));
    {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "listen_addr = \"0.0.0.0:6000\"").unwrap();
        writeln!(file, "enforce_allow_list = false").unwrap();
    }

    let config = ServiceConfig::load(Some(&path)).unwrap();
    assert_eq!(config.listen_addr, "0.0.0.0:6000");
    assert!(!config.catalog().enforces_allow_list());
    std::fs::remove_file(&path).ok();

    let missing = ServiceConfig::load(Some(&path));
    assert!(matches!(missing, Err(ConfigError::Read { .. })));
}

#[test]
fn test_parse_error_names_file() {
    let path = std::env::temp_dir().join(format!("hmi-telemetry-bad-{}.toml", std::process::id()));
    std::fs::write(&path, "stale_threshold_ms = \"soon\"").unwrap();
    let err = ServiceConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("hmi-telemetry-bad"));
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_source_kind_cli_names_match_config_names() {
    for kind in SourceKind::value_variants() {
        let cli_name = kind.to_possible_value().unwrap().get_name().to_string();
        assert_eq!(SourceKind::from_str(&cli_name, false).unwrap(), *kind);

        let config = ServiceConfig::from_toml(&format!("source = \"{}\"", cli_name)).unwrap();
        assert_eq!(config.source, *kind);
    }
    assert!(SourceKind::from_str("can0", false).is_err());
}
