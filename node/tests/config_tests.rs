//! Config loading and defaults

use coursesync_node::config::{ConfigError, Mode, NodeConfig, SyncInterval};
use coursesync_sync::ConflictPolicy;
use coursesync_types::ContentKind;
use pretty_assertions::assert_eq;
use std::time::Duration;

#[test]
fn empty_file_yields_defaults() {
    let config = NodeConfig::from_toml("").unwrap();
    assert_eq!(config.mode, Mode::Master);
    assert_eq!(config.server.bind, "127.0.0.1:8080");
    assert_eq!(config.log_retention_days, 30);
    assert_eq!(config.sync.batch_size, 10);
    assert_eq!(config.push_timeout(), Duration::from_secs(45));
    assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
    assert_eq!(config.verify_timeout(), Duration::from_secs(15));
    assert_eq!(config.sync.conflict_policy, ConflictPolicy::Skip);
    assert_eq!(config.enabled_kinds(), ContentKind::ALL.to_vec());
}

#[test]
fn client_config_with_all_fields() {
    let config = NodeConfig::from_toml(
        r#"
mode = "client"
site_url = "https://school.example"
site_name = "School"
shared_secret = "abc"
database = "/var/lib/coursesync/client.db"
log_retention_days = 7

[server]
bind = "0.0.0.0:9000"

[client]
master_url = "https://master.example"
master_secret = "xyz"
auto_sync = true
sync_interval = "twicedaily"

[sync]
questions = false
topics = false
conflict_policy = "overwrite"
batch_size = 50
push_timeout_secs = 10
fetch_timeout_secs = 5
verify_timeout_secs = 3
"#,
    )
    .unwrap();

    assert_eq!(config.mode, Mode::Client);
    assert_eq!(config.client.sync_interval, SyncInterval::TwiceDaily);
    assert_eq!(config.client.sync_interval.period(), Duration::from_secs(43_200));
    assert_eq!(config.sync.conflict_policy, ConflictPolicy::Overwrite);
    assert_eq!(
        config.enabled_kinds(),
        vec![ContentKind::Course, ContentKind::Lesson, ContentKind::Quiz]
    );
    assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
    assert_eq!(config.verify_timeout(), Duration::from_secs(3));
    assert_eq!(config.database.to_str(), Some("/var/lib/coursesync/client.db"));
}

#[test]
fn batch_size_out_of_range_is_rejected() {
    for size in [0, 51] {
        let err = NodeConfig::from_toml(&format!("[sync]\nbatch_size = {size}")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }
}

#[test]
fn zero_verify_timeout_is_rejected() {
    let err = NodeConfig::from_toml("[sync]\nverify_timeout_secs = 0").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
}

#[test]
fn auto_sync_needs_a_master() {
    let err = NodeConfig::from_toml("mode = \"client\"\n[client]\nauto_sync = true").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn unknown_policy_is_a_parse_error() {
    let err = NodeConfig::from_toml("[sync]\nconflict_policy = \"merge\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.site_name, "CourseSync");
}

#[test]
fn example_config_parses() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("coursesync.example.toml");
    let config = NodeConfig::load(&path).unwrap();
    assert_eq!(config.mode, Mode::Master);
}

#[test]
fn display_name_falls_back_to_url() {
    let config = NodeConfig::from_toml("site_url = \"https://a.example\"\nsite_name = \"\"").unwrap();
    assert_eq!(config.display_name(), "https://a.example");
}
