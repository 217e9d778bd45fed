//! Tests for configuration loading and validation

use std::time::Duration;

use prometheus_gang_shim::config::ShimConfig;

fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn test_default_config_is_valid() {
    let cfg = ShimConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.cluster_id, "mycluster");
    assert_eq!(cfg.policy_group, "queues");
    assert_eq!(cfg.scheduling_interval(), Duration::from_secs(1));
    assert!(cfg.worker_threads > 0);
}

#[test]
fn test_empty_cluster_id_rejected() {
    let cfg = ShimConfig {
        cluster_id: "  ".to_string(),
        ..ShimConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_interval_rejected() {
    let cfg = ShimConfig {
        scheduling_interval_ms: 0,
        ..ShimConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_worker_threads_rejected() {
    let cfg = ShimConfig {
        worker_threads: 0,
        ..ShimConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_from_json_fills_defaults() {
    let cfg =
        ShimConfig::from_json_str(r#"{"cluster_id": "prod-east", "scheduling_interval_ms": 250}"#)
            .expect("valid json");
    assert_eq!(cfg.cluster_id, "prod-east");
    assert_eq!(cfg.scheduling_interval(), Duration::from_millis(250));
    assert_eq!(cfg.policy_group, "queues");
}

#[test]
fn test_from_json_rejects_invalid_values() {
    assert!(ShimConfig::from_json_str(r#"{"dispatch_backlog_warn": 0}"#).is_err());
    assert!(ShimConfig::from_json_str("not json").is_err());
}

#[test]
fn test_from_vars_reads_prefixed_names() {
    let cfg = ShimConfig::from_vars(vars(&[
        ("SHIM_CLUSTER_ID", "edge-1"),
        ("SHIM_POLICY_GROUP", "batch"),
        ("SHIM_SCHEDULING_INTERVAL_MS", "50"),
        ("SHIM_WORKER_THREADS", "3"),
        ("CLUSTER_ID", "ignored"),
    ]))
    .expect("valid vars");
    assert_eq!(cfg.cluster_id, "edge-1");
    assert_eq!(cfg.policy_group, "batch");
    assert_eq!(cfg.scheduling_interval_ms, 50);
    assert_eq!(cfg.worker_threads, 3);
}

#[test]
fn test_from_vars_rejects_bad_numbers() {
    let err = ShimConfig::from_vars(vars(&[("SHIM_DISPATCH_BACKLOG_WARN", "lots")]))
        .expect_err("not a number");
    assert!(err.to_string().contains("SHIM_DISPATCH_BACKLOG_WARN"));
}

#[test]
fn test_from_vars_validates() {
    assert!(ShimConfig::from_vars(vars(&[("SHIM_SCHEDULING_INTERVAL_MS", "0")])).is_err());
}
