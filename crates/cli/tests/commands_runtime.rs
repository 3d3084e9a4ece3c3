use std::env;
use std::sync::{Mutex, OnceLock};

use deskbook_cli::commands::{announce, doctor, migrate};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(
        &[("DESKBOOK_SLACK_BOT_TOKEN", "xoxb-test"), ("DESKBOOK_DATABASE_URL", "sqlite::memory:")],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");
            let message = payload["message"].as_str().unwrap_or_default();
            assert!(message.starts_with("schema up to date"));
        },
    );
}

#[test]
fn migrate_returns_config_failure_without_bot_token() {
    with_env(&[("DESKBOOK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn announce_requires_an_announcement_channel() {
    with_env(
        &[("DESKBOOK_SLACK_BOT_TOKEN", "xoxb-test"), ("DESKBOOK_DATABASE_URL", "sqlite::memory:")],
        || {
            let result = announce::run();
            assert_eq!(result.exit_code, 2);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "announce");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn announce_reports_degraded_when_slack_is_unreachable() {
    with_env(
        &[
            ("DESKBOOK_SLACK_BOT_TOKEN", "xoxb-test"),
            ("DESKBOOK_SLACK_CHANNEL_ID", "C-OFFICE"),
            ("DESKBOOK_SLACK_API_BASE_URL", "http://127.0.0.1:9"),
            ("DESKBOOK_SLACK_TIMEOUT_SECS", "2"),
            ("DESKBOOK_DATABASE_URL", "sqlite::memory:"),
        ],
        || {
            let result = announce::run();
            assert_eq!(result.exit_code, 0, "slack failures must not fail the scheduled job");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "degraded");
            assert_eq!(payload["error_class"], "slack_api");
        },
    );
}

#[test]
fn doctor_reports_missing_schema_then_passes_after_migrate() {
    let db_path = env::temp_dir().join(format!("deskbook-doctor-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&db_path);
    let database_url = format!("sqlite://{}", db_path.display());

    with_env(
        &[("DESKBOOK_SLACK_BOT_TOKEN", "xoxb-test"), ("DESKBOOK_DATABASE_URL", &database_url)],
        || {
            let before = parse_payload(&doctor::run(true));
            assert_eq!(before["overall_status"], "fail");
            assert!(has_check(&before, "booking_schema", "fail"));
            assert!(has_check(&before, "announcement_channel", "skipped"));

            assert_eq!(migrate::run().exit_code, 0);

            let after = parse_payload(&doctor::run(true));
            assert_eq!(after["overall_status"], "pass");
            assert!(has_check(&after, "database_connectivity", "pass"));
            assert!(has_check(&after, "booking_schema", "pass"));
        },
    );

    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", db_path.display()));
    }
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[], || {
        let report = parse_payload(&doctor::run(true));
        assert_eq!(report["overall_status"], "fail");
        assert!(has_check(&report, "config_validation", "fail"));
        assert!(has_check(&report, "database_connectivity", "skipped"));

        let human = doctor::run(false);
        assert!(human.starts_with("doctor: one or more readiness checks failed"));
        assert!(human.contains("- [fail] config_validation:"));
    });
}

fn has_check(report: &Value, name: &str, status: &str) -> bool {
    report["checks"]
        .as_array()
        .map(|checks| {
            checks.iter().any(|check| check["name"] == name && check["status"] == status)
        })
        .unwrap_or(false)
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "DESKBOOK_DATABASE_URL",
        "DESKBOOK_DATABASE_MAX_CONNECTIONS",
        "DESKBOOK_DATABASE_TIMEOUT_SECS",
        "DESKBOOK_SLACK_BOT_TOKEN",
        "DESKBOOK_SLACK_CHANNEL_ID",
        "DESKBOOK_SLACK_API_BASE_URL",
        "DESKBOOK_SLACK_TIMEOUT_SECS",
        "DESKBOOK_SERVER_BIND_ADDRESS",
        "DESKBOOK_SERVER_PORT",
        "DESKBOOK_OFFICE_DESK_COUNT",
        "DESKBOOK_OFFICE_MAP_IMAGE_URL",
        "DESKBOOK_LOGGING_LEVEL",
        "DESKBOOK_LOGGING_FORMAT",
        "DESKBOOK_LOG_LEVEL",
        "DESKBOOK_LOG_FORMAT",
        "PORT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
