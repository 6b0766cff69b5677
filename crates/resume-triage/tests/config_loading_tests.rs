//! Table-driven tests for configuration loading and validation.
//!
//! Covers JSON and YAML documents, file loading and secret resolution.

use std::path::PathBuf;

use secrecy::ExposeSecret;
use serial_test::serial;
use tempfile::TempDir;

use resume_triage::config::{load_config, load_config_from_str, AuthConfig, ConfigFormat};

/// Represents a single config loading test case.
struct ConfigTestCase {
    /// Test case name for identification.
    name: &'static str,
    content: &'static str,
    format: ConfigFormat,
    /// Whether loading should succeed.
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

/// All config loading test cases.
const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        content: r#"{ "version": "1.0", "job": { "title": "Desenvolvedor Python" } }"#,
        format: ConfigFormat::Json,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        content: r#"{
            "version": "1.0",
            "worker_count": 4,
            "job": {
                "title": "Farmacêutico",
                "description": "Farmacêutico responsável técnico para drogaria",
                "required_keywords": ["crf"],
                "desired_keywords": ["manipulacao"],
                "negative_keywords": ["estagio"],
                "formations": ["farmacia"],
                "formation_synonyms": { "farmacia": ["farmacia bioquimica"] },
                "threshold": 5
            },
            "mailbox": {
                "endpoint": "https://graph.microsoft.com/v1.0/users/rh@example.com/messages?$filter=isRead eq false",
                "mark_as_read": false,
                "auth": {
                    "method": "client_credentials",
                    "authority": "https://login.microsoftonline.com/tenant-id",
                    "client_id": "00000000-0000-0000-0000-000000000000",
                    "client_secret": { "env": "TRIAGE_CLIENT_SECRET" }
                }
            },
            "fetch": { "max_attempts": 3, "default_retry_after_secs": 10 },
            "downloads": { "include": ["*.pdf", "*.docx"], "exclude": ["*logo*"], "max_bytes": 1048576 },
            "ocr": { "enabled": true, "languages": ["por"], "dpi": 200, "min_text_chars": 40 },
            "scoring": { "required_weight": 5, "fuzzy_threshold": 0.9, "ceiling": 50 },
            "output": { "approved_directory": "/srv/triage", "cache_path": "/srv/triage/.cache.json", "report_path": "/srv/triage/report.json" }
        }"#,
        format: ConfigFormat::Json,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_yaml",
        content: r#"
version: "1.0"
job:
  title: Analista Contábil
  required_keywords: [sped, conciliacao]
mailbox:
  endpoint: "https://graph.microsoft.com/v1.0/users/rh@example.com/messages"
  auth:
    method: token
    token:
      file: ~/.config/triage/token
"#,
        format: ConfigFormat::Yaml,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "missing_job",
        content: r#"{ "version": "1.0" }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unsupported_version",
        content: r#"{ "version": "2.0", "job": { "title": "x" } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "blank_title",
        content: r#"{ "version": "1.0", "job": { "title": "   " } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("job.title must not be blank"),
    },
    ConfigTestCase {
        name: "threshold_above_ceiling",
        content: r#"{ "version": "1.0", "job": { "title": "x", "threshold": 60 }, "scoring": { "ceiling": 50 } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("exceeds scoring.ceiling"),
    },
    ConfigTestCase {
        name: "fuzzy_threshold_out_of_range",
        content: r#"{ "version": "1.0", "job": { "title": "x" }, "scoring": { "fuzzy_threshold": 1.5 } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("fuzzy_threshold"),
    },
    ConfigTestCase {
        name: "invalid_glob",
        content: r#"{ "version": "1.0", "job": { "title": "x" }, "downloads": { "exclude": ["[oops"] } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Invalid filename pattern"),
    },
    ConfigTestCase {
        name: "endpoint_not_a_url",
        content: r#"{
            "version": "1.0",
            "job": { "title": "x" },
            "mailbox": { "endpoint": "users/rh/messages", "auth": { "method": "token", "token": { "value": "t" } } }
        }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("http(s) URL"),
    },
    ConfigTestCase {
        name: "token_without_source",
        content: r#"{
            "version": "1.0",
            "job": { "title": "x" },
            "mailbox": {
                "endpoint": "https://graph.microsoft.com/v1.0/users/rh@example.com/messages",
                "auth": { "method": "token", "token": {} }
            }
        }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("has no source"),
    },
    ConfigTestCase {
        name: "unknown_auth_method",
        content: r#"{
            "version": "1.0",
            "job": { "title": "x" },
            "mailbox": {
                "endpoint": "https://graph.microsoft.com/v1.0/users/rh@example.com/messages",
                "auth": { "method": "password", "password": "hunter2" }
            }
        }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "malformed_json",
        content: r#"{ "version": "1.0", "job": "#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
    ConfigTestCase {
        name: "malformed_yaml",
        content: "version: \"1.0\"\njob: [unclosed\n",
        format: ConfigFormat::Yaml,
        should_succeed: false,
        expected_error: Some("Failed to parse config YAML"),
    },
];

#[test]
fn test_config_loading_cases() {
    let mut failures = Vec::new();

    for case in CONFIG_TESTS {
        let result = load_config_from_str(case.content, case.format);

        match (case.should_succeed, result) {
            (true, Ok(_)) => {}
            (true, Err(e)) => failures.push(format!("{}: expected success, got {}", case.name, e)),
            (false, Ok(_)) => failures.push(format!("{}: expected an error", case.name)),
            (false, Err(e)) => {
                if let Some(expected) = case.expected_error {
                    let message = e.to_string();
                    if !message.contains(expected) {
                        failures.push(format!(
                            "{}: error '{}' does not contain '{}'",
                            case.name, message, expected
                        ));
                    }
                }
            }
        }
    }

    assert!(failures.is_empty(), "Failures:\n{}", failures.join("\n"));
}

#[test]
fn test_full_config_values() {
    let case = CONFIG_TESTS
        .iter()
        .find(|c| c.name == "valid_full")
        .unwrap();
    let config = load_config_from_str(case.content, case.format).unwrap();

    assert_eq!(config.worker_count, 4);
    assert_eq!(config.effective_worker_count(), 4);
    assert_eq!(config.job.threshold, Some(5));
    assert_eq!(config.fetch.max_attempts, 3);
    assert_eq!(config.fetch.backoff_cap_secs, 30);
    assert_eq!(config.scoring.fuzzy_threshold, Some(0.9));
    assert_eq!(config.scoring.desired_weight, 1);
    assert_eq!(config.ocr.dpi, 200);
    assert_eq!(
        config.output.report_path,
        Some(PathBuf::from("/srv/triage/report.json"))
    );

    let mailbox = config.mailbox.unwrap();
    assert!(!mailbox.mark_as_read);
    match mailbox.auth {
        AuthConfig::ClientCredentials {
            client_secret,
            scope,
            ..
        } => {
            assert_eq!(client_secret.env.as_deref(), Some("TRIAGE_CLIENT_SECRET"));
            assert_eq!(scope, "https://graph.microsoft.com/.default");
        }
        other => panic!("unexpected auth: {:?}", other),
    }
}

#[test]
fn test_load_from_file_picks_format_by_extension() {
    let temp = TempDir::new().unwrap();

    let yaml_path = temp.path().join("triage.yml");
    std::fs::write(
        &yaml_path,
        "version: \"1.0\"\njob:\n  title: Químico\n  formations: [quimica]\n",
    )
    .unwrap();
    let config = load_config(&yaml_path).unwrap();
    assert_eq!(config.job.title, "Químico");

    let json_path = temp.path().join("triage.json");
    std::fs::write(&json_path, r#"{ "version": "1.0", "job": { "title": "Biomédico" } }"#).unwrap();
    let config = load_config(&json_path).unwrap();
    assert_eq!(config.job.title, "Biomédico");
}

#[test]
fn test_missing_file_is_read_error() {
    let err = load_config("/nonexistent/triage.json").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
#[serial]
fn test_secret_resolved_from_environment() {
    let content = r#"{
        "version": "1.0",
        "job": { "title": "x" },
        "mailbox": {
            "endpoint": "https://graph.microsoft.com/v1.0/users/rh@example.com/messages",
            "auth": { "method": "token", "token": { "env": "TRIAGE_TEST_TOKEN" } }
        }
    }"#;
    let config = load_config_from_str(content, ConfigFormat::Json).unwrap();
    let token = match config.mailbox.unwrap().auth {
        AuthConfig::Token { token } => token,
        other => panic!("unexpected auth: {:?}", other),
    };

    std::env::remove_var("TRIAGE_TEST_TOKEN");
    assert!(token.resolve("token").is_err());

    std::env::set_var("TRIAGE_TEST_TOKEN", "  abc123\n");
    let secret = token.resolve("token").unwrap();
    std::env::remove_var("TRIAGE_TEST_TOKEN");

    assert_eq!(secret.expose_secret(), "abc123");
}
