use super::*;
use crate::config::{
    layered_env, read_config_file, read_dotenv_file, resolve_completion_settings,
    CompletionSection, ConfigFile, API_KEY_ENV, BASE_URL_ENV, MODEL_ENV, TIMEOUT_ENV,
};
use crate::render::{
    format_error_lines, format_report_lines, output_style_for, render_status_line, OutputStyle,
    ProgressClient, TerminalRenderer,
};
use chrono::{TimeZone, Utc};
use clap::error::ErrorKind;
use selfup_completion::{
    CompletionClient, CompletionRequest, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS,
};
use selfup_core::UpgradeError;
use selfup_engine::{CycleError, CycleReport, CycleStage};
use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

static TEST_CONFIG_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

#[test]
fn cli_defaults_to_lenient_manifest_and_no_project_root() {
    let cli = Cli::try_parse_from(["selfup"]).expect("must parse");
    assert_eq!(cli.project_root, None);
    assert!(!cli.strict_manifest);
    assert_eq!(cli.load_policy(), ManifestLoadPolicy::Lenient);
}

#[test]
fn cli_accepts_project_root_and_strict_manifest() {
    let cli = Cli::try_parse_from(["selfup", "--project-root", "/tmp/demo", "--strict-manifest"])
        .expect("must parse");
    assert_eq!(cli.project_root, Some(PathBuf::from("/tmp/demo")));
    assert_eq!(cli.load_policy(), ManifestLoadPolicy::Strict);
}

#[test]
fn cli_rejects_unknown_flags() {
    let err = Cli::try_parse_from(["selfup", "--dry-run"]).expect_err("must reject");
    assert_eq!(err.kind(), ErrorKind::UnknownArgument);
}

#[test]
fn settings_use_defaults_when_only_api_key_is_set() {
    let env = env_from(&[(API_KEY_ENV, "sk-test")]);
    let settings =
        resolve_completion_settings(&ConfigFile::default(), lookup(&env)).expect("must resolve");

    assert_eq!(settings.api_key.expose(), "sk-test");
    assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    assert_eq!(settings.model, DEFAULT_MODEL);
    assert_eq!(settings.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
}

#[test]
fn settings_require_api_key() {
    let env = env_from(&[(MODEL_ENV, "some/model")]);
    let err = resolve_completion_settings(&ConfigFile::default(), lookup(&env))
        .expect_err("must fail without key");
    assert!(err.to_string().contains(API_KEY_ENV));
}

#[test]
fn settings_treat_blank_api_key_as_missing() {
    let env = env_from(&[(API_KEY_ENV, "   ")]);
    let err = resolve_completion_settings(&ConfigFile::default(), lookup(&env))
        .expect_err("must fail with blank key");
    assert!(err.to_string().contains("is not set"));
}

#[test]
fn settings_take_config_file_values_over_defaults() {
    let file = config_with("http://localhost:8080/v1", "local/model", 30);
    let env = env_from(&[(API_KEY_ENV, "sk-test")]);
    let settings = resolve_completion_settings(&file, lookup(&env)).expect("must resolve");

    assert_eq!(settings.base_url, "http://localhost:8080/v1");
    assert_eq!(settings.model, "local/model");
    assert_eq!(settings.timeout, Duration::from_secs(30));
}

#[test]
fn settings_take_environment_over_config_file() {
    let file = config_with("http://localhost:8080/v1", "local/model", 30);
    let env = env_from(&[
        (API_KEY_ENV, "sk-test"),
        (BASE_URL_ENV, "https://proxy.internal/api/v1"),
        (MODEL_ENV, "env/model"),
        (TIMEOUT_ENV, "45"),
    ]);
    let settings = resolve_completion_settings(&file, lookup(&env)).expect("must resolve");

    assert_eq!(settings.base_url, "https://proxy.internal/api/v1");
    assert_eq!(settings.model, "env/model");
    assert_eq!(settings.timeout, Duration::from_secs(45));
}

#[test]
fn settings_ignore_empty_environment_overrides() {
    let file = config_with("http://localhost:8080/v1", "local/model", 30);
    let env = env_from(&[(API_KEY_ENV, "sk-test"), (MODEL_ENV, ""), (TIMEOUT_ENV, " ")]);
    let settings = resolve_completion_settings(&file, lookup(&env)).expect("must resolve");

    assert_eq!(settings.model, "local/model");
    assert_eq!(settings.timeout, Duration::from_secs(30));
}

#[test]
fn settings_reject_non_numeric_timeout() {
    let env = env_from(&[(API_KEY_ENV, "sk-test"), (TIMEOUT_ENV, "five minutes")]);
    let err = resolve_completion_settings(&ConfigFile::default(), lookup(&env))
        .expect_err("must reject timeout");
    assert!(err.to_string().contains(TIMEOUT_ENV));
}

#[test]
fn settings_reject_zero_timeout() {
    let file = ConfigFile {
        completion: CompletionSection {
            timeout_secs: Some(0),
            ..CompletionSection::default()
        },
    };
    let env = env_from(&[(API_KEY_ENV, "sk-test")]);
    let err = resolve_completion_settings(&file, lookup(&env)).expect_err("must reject zero");
    assert!(err.to_string().contains("greater than zero"));
}

#[test]
fn settings_reject_base_url_without_http_scheme() {
    let env = env_from(&[(API_KEY_ENV, "sk-test"), (BASE_URL_ENV, "ftp://example.test")]);
    let err = resolve_completion_settings(&ConfigFile::default(), lookup(&env))
        .expect_err("must reject url");
    assert!(err.to_string().contains("http:// or https://"));
}

#[test]
fn settings_reject_blank_model_from_config_file() {
    let file = ConfigFile {
        completion: CompletionSection {
            model: Some("   ".to_string()),
            ..CompletionSection::default()
        },
    };
    let env = env_from(&[(API_KEY_ENV, "sk-test")]);
    let err = resolve_completion_settings(&file, lookup(&env)).expect_err("must reject model");
    assert!(err.to_string().contains("model must not be empty"));
}

#[test]
fn settings_debug_output_never_contains_api_key() {
    let env = env_from(&[(API_KEY_ENV, "sk-very-secret")]);
    let settings =
        resolve_completion_settings(&ConfigFile::default(), lookup(&env)).expect("must resolve");
    assert!(!format!("{settings:?}").contains("sk-very-secret"));
}

#[test]
fn read_config_file_returns_default_when_missing() {
    let dir = test_config_dir();
    let config = read_config_file(&dir.join("selfup.toml")).expect("must read");
    assert_eq!(config, ConfigFile::default());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn read_config_file_parses_completion_section() {
    let dir = test_config_dir();
    let path = dir.join("selfup.toml");
    fs::write(
        &path,
        "[completion]\nbase_url = \"http://localhost:1234/v1\"\nmodel = \"local/model\"\ntimeout_secs = 12\n",
    )
    .expect("must write config");

    let config = read_config_file(&path).expect("must read");
    assert_eq!(config, config_with("http://localhost:1234/v1", "local/model", 12));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn read_config_file_rejects_unknown_keys() {
    let dir = test_config_dir();
    let path = dir.join("selfup.toml");
    fs::write(&path, "[completion]\napi_key = \"sk-in-file\"\n").expect("must write config");

    let err = read_config_file(&path).expect_err("must reject unknown key");
    assert!(err.to_string().contains("failed parsing config"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn read_dotenv_file_returns_nothing_when_missing() {
    let dir = test_config_dir();
    let vars = read_dotenv_file(&dir.join(".env")).expect("must read");
    assert!(vars.is_empty());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn api_key_is_taken_from_project_dotenv() {
    let dir = test_config_dir();
    let path = dir.join(".env");
    fs::write(
        &path,
        "# local secrets\nOPENROUTER_API_KEY=sk-from-dotenv\nSELFUP_MODEL=\"dotenv/model\"\n",
    )
    .expect("must write env file");

    let dotenv = read_dotenv_file(&path).expect("must read env file");
    let process = HashMap::new();
    let settings = resolve_completion_settings(
        &ConfigFile::default(),
        layered_env(lookup(&process), &dotenv),
    )
    .expect("must resolve");

    assert_eq!(settings.api_key.expose(), "sk-from-dotenv");
    assert_eq!(settings.model, "dotenv/model");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn process_environment_beats_project_dotenv() {
    let dotenv = env_from(&[(API_KEY_ENV, "sk-from-dotenv"), (MODEL_ENV, "dotenv/model")]);
    let process = env_from(&[(API_KEY_ENV, "sk-from-process"), (MODEL_ENV, "")]);

    let settings = resolve_completion_settings(
        &ConfigFile::default(),
        layered_env(lookup(&process), &dotenv),
    )
    .expect("must resolve");

    assert_eq!(settings.api_key.expose(), "sk-from-process");
    assert_eq!(settings.model, "dotenv/model");
}

#[test]
fn error_lines_show_raw_response_once() {
    let raw = "I cannot help with that.";
    let err = anyhow::Error::new(CycleError {
        stage: CycleStage::ResponseReceived,
        error: UpgradeError::malformed("not a JSON object", raw),
    });

    let lines = format_error_lines(&err, OutputStyle::Rich);

    assert_eq!(
        lines[0],
        "[ERR] upgrade cycle failed after stage response_received"
    );
    assert!(lines[1].starts_with("caused by: malformed completion response"));
    assert_eq!(lines.join("\n").matches(raw).count(), 1);
}

#[test]
fn output_style_is_rich_only_on_terminal_without_no_color() {
    assert_eq!(output_style_for(true, false), OutputStyle::Rich);
    assert_eq!(output_style_for(true, true), OutputStyle::Plain);
    assert_eq!(output_style_for(false, false), OutputStyle::Plain);
}

#[test]
fn status_line_plain_is_bare_message() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "upgraded lib/a.ts"),
        "upgraded lib/a.ts"
    );
}

#[test]
fn status_line_rich_carries_badge() {
    assert_eq!(render_status_line(OutputStyle::Rich, "ok", "done"), "[OK] done");
    assert_eq!(render_status_line(OutputStyle::Rich, "warn", "hm"), "[WARN] hm");
    assert_eq!(render_status_line(OutputStyle::Rich, "err", "no"), "[ERR] no");
    assert_eq!(render_status_line(OutputStyle::Rich, "step", "go"), "[..] go");
}

#[test]
fn report_lines_list_next_steps() {
    let report = sample_report(vec!["add tests".to_string(), "split module".to_string()]);
    let lines = format_report_lines(&report, OutputStyle::Plain);
    assert_eq!(
        lines,
        vec![
            "upgraded lib/a.ts".to_string(),
            "backup: /p/src/backup/lib/a.ts.bak".to_string(),
            "summary: improved a".to_string(),
            "next steps:".to_string(),
            "- add tests".to_string(),
            "- split module".to_string(),
        ]
    );
}

#[test]
fn report_lines_say_none_without_next_steps() {
    let report = sample_report(Vec::new());
    let lines = format_report_lines(&report, OutputStyle::Rich);
    assert_eq!(lines[0], "[OK] upgraded lib/a.ts");
    assert_eq!(lines.last().map(String::as_str), Some("next steps: none"));
}

#[test]
fn progress_client_passes_response_through() {
    let inner = CountingClient {
        reply: Ok("{\"updatedCode\":\"x\"}".to_string()),
        calls: Cell::new(0),
    };
    let client = ProgressClient::new(&inner, TerminalRenderer::from_style(OutputStyle::Plain));

    let raw = client
        .complete(&CompletionRequest::upgrade("payload"))
        .expect("must pass through");
    assert_eq!(raw, "{\"updatedCode\":\"x\"}");
    assert_eq!(inner.calls.get(), 1);
}

#[test]
fn progress_client_passes_errors_through() {
    let inner = CountingClient {
        reply: Err(()),
        calls: Cell::new(0),
    };
    let client = ProgressClient::new(&inner, TerminalRenderer::from_style(OutputStyle::Plain));

    let err = client
        .complete(&CompletionRequest::upgrade("payload"))
        .expect_err("must pass error through");
    assert!(matches!(err, UpgradeError::CompletionUnavailable(_)));
    assert_eq!(inner.calls.get(), 1);
}

struct CountingClient {
    reply: std::result::Result<String, ()>,
    calls: Cell<usize>,
}

impl CompletionClient for CountingClient {
    fn complete(&self, _request: &CompletionRequest) -> selfup_core::Result<String> {
        self.calls.set(self.calls.get() + 1);
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(()) => Err(UpgradeError::CompletionUnavailable(
                "status=503 body='busy'".to_string(),
            )),
        }
    }
}

fn sample_report(next_steps: Vec<String>) -> CycleReport {
    CycleReport {
        file_path: "lib/a.ts".to_string(),
        backup_path: PathBuf::from("/p/src/backup/lib/a.ts.bak"),
        target_path: PathBuf::from("/p/src/lib/a.ts"),
        summary: "improved a".to_string(),
        next_steps,
        updated_at: Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp"),
        replaced_entry: true,
        remaining: 0,
    }
}

fn config_with(base_url: &str, model: &str, timeout_secs: u64) -> ConfigFile {
    ConfigFile {
        completion: CompletionSection {
            base_url: Some(base_url.to_string()),
            model: Some(model.to_string()),
            timeout_secs: Some(timeout_secs),
        },
    }
}

fn env_from(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn lookup(env: &HashMap<String, String>) -> impl Fn(&str) -> Option<String> + '_ {
    move |key| env.get(key).cloned()
}

fn test_config_dir() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    let counter = TEST_CONFIG_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "selfup-cli-tests-{}-{nanos}-{counter}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("must create test dir");
    assert!(Path::new(&dir).is_dir());
    dir
}
