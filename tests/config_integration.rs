use std::io::Write;

use isaprobe::{ProbeConfig, ProbeError};
use tempfile::NamedTempFile;

#[test]
fn json_round_trip() {
    let mut config = ProbeConfig::default();
    config.seeds.max_tls_callbacks = 16;
    config.scan.max_instructions = Some(10_000);
    config.pipeline.timeout_ms = Some(250);

    let json = config.to_json_string().unwrap();
    assert_eq!(ProbeConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn missing_fields_take_defaults() {
    let config = ProbeConfig::from_json_str(r#"{ "scan": { "yield_every": 64 } }"#).unwrap();
    assert_eq!(config.scan.yield_every, 64);
    assert_eq!(config.scan.max_issues, ProbeConfig::default().scan.max_issues);
    assert_eq!(config.seeds, ProbeConfig::default().seeds);
    assert_eq!(config.pipeline.timeout_ms, None);
}

#[test]
fn invalid_values_are_rejected() {
    let err = ProbeConfig::from_json_str(r#"{ "scan": { "max_instructions": 0 } }"#).unwrap_err();
    assert!(matches!(err, ProbeError::InvalidConfig(_)));

    let err = ProbeConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, ProbeError::Serialization(_)));
}

#[test]
fn loads_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{ "seeds": {{ "max_symbols": 42 }} }}"#).unwrap();

    let config = ProbeConfig::from_path(file.path()).unwrap();
    assert_eq!(config.seeds.max_symbols, 42);

    let missing = ProbeConfig::from_path(file.path().with_extension("absent"));
    assert!(matches!(missing, Err(ProbeError::Io(_))));
}
