use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use autotrack_core::Event;
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    work: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let work = base.join("work");

        for dir in [&home, &xdg_config, &xdg_state, &work] {
            fs::create_dir_all(dir).expect("failed to create test directory");
        }

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
            work,
        }
    }

    fn write_config(&self, content: &str) {
        let path = self.xdg_config.join("autotrack/config.toml");
        fs::create_dir_all(path.parent().expect("missing config parent"))
            .expect("failed to create config dir");
        fs::write(path, content).expect("failed to write config");
    }

    fn write_work_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.work.join(name);
        fs::write(&path, content).expect("failed to write work file");
        path
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    Command::new(assert_cmd::cargo::cargo_bin!("autotrack"))
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute autotrack: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    panic!(
        "autotrack {} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        args.join(" "),
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn read_events(path: &Path) -> Vec<Event> {
    fs::read_to_string(path)
        .expect("failed to read event output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("invalid event line"))
        .collect()
}

#[test]
fn rules_prints_default_rules_in_order() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["rules"]);
    assert_success(&["rules"], &output);

    let rules: Vec<serde_json::Value> =
        serde_json::from_slice(&output.stdout).expect("rules output should be JSON");
    let names: Vec<_> = rules
        .iter()
        .map(|r| r["event_name"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "button_clicked",
            "link_clicked",
            "form_submitted",
            "input_changed",
            "dropdown_changed",
            "option_selected"
        ]
    );
}

#[test]
fn check_fails_without_platforms() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["check"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Platforms:       0"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("at least one platform"));
}

#[test]
fn check_passes_with_configured_platform() {
    let env = CliTestEnv::new();
    env.write_config(
        r#"
[[platforms]]
kind = "console"
"#,
    );

    let output = run_bin(&env, &["check"]);
    assert_success(&["check"], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("  - console"));
    assert!(stdout.contains("Configuration OK"));
}

#[test]
fn replay_writes_matched_and_fallback_events() {
    let env = CliTestEnv::new();
    let events_path = env.work.join("events.jsonl");
    env.write_config(&format!(
        r#"
[[platforms]]
kind = "file"
name = "local"
path = "{}"

[[rules]]
selector = "button.buy"
event_type = "click"
event_name = "purchase_started"
"#,
        events_path.display()
    ));

    let replay = env.write_work_file(
        "session.jsonl",
        concat!(
            r#"{"event_type":"click","component":{"name":"button","classes":["buy"]},"screen":"/cart"}"#,
            "\n",
            r#"{"event_type":"click","component":{"name":"div"},"properties":{"element_text":"Show More"}}"#,
            "\n",
            "\n",
            r#"{"track":"cart_viewed","properties":{"items":3}}"#,
            "\n",
        ),
    );
    let replay_arg = replay.to_string_lossy().into_owned();
    let args = ["replay", replay_arg.as_str(), "--user-id", "user-7"];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Records replayed:     3"));
    assert!(stdout.contains("Deliveries failed:    0"));

    let events = read_events(&events_path);
    let names: Vec<_> = events.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["purchase_started", "cart_show_more_interaction", "cart_viewed"]
    );
    assert!(events.iter().all(|e| e.user_id.as_deref() == Some("user-7")));
    assert!(events.windows(2).all(|w| w[0].session_id == w[1].session_id));
    assert_eq!(events[2].properties["items"], 3);
}

#[test]
fn replay_component_tree_with_output_override() {
    let env = CliTestEnv::new();
    let replay = env.write_work_file(
        "native.jsonl",
        r#"{"event_type":"press","component":{"name":"TouchableOpacity"},"screen":"Home","properties":{"test_id":"get-started"}}"#,
    );
    let output_path = env.work.join("out/replayed.jsonl");
    let replay_arg = replay.to_string_lossy().into_owned();
    let output_arg = output_path.to_string_lossy().into_owned();
    let args = [
        "replay",
        replay_arg.as_str(),
        "--environment",
        "component-tree",
        "--output",
        output_arg.as_str(),
    ];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let events = read_events(&output_path);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "home_get_started_interaction");
    assert_eq!(events[0].properties["platform"], "native");
}

#[test]
fn replay_rejects_malformed_records() {
    let env = CliTestEnv::new();
    env.write_config("[[platforms]]\nkind = \"console\"\n");
    let replay = env.write_work_file("bad.jsonl", "{\"event_type\": 5}\n");
    let replay_arg = replay.to_string_lossy().into_owned();

    let output = run_bin(&env, &["replay", replay_arg.as_str()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid record on line 1"));
}
