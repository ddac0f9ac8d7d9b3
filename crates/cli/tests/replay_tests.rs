// Tests for `cellgrid replay` and `cellgrid eval`, run against the built binary

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn cellgrid() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cellgrid"));
    cmd.env_remove("CELLGRID_LOCALE");
    cmd
}

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

/// Replay with an explicit empty settings file so the user's config is never read.
fn replay(dir: &TempDir, script: &Path, args: &[&str]) -> Output {
    let config = write(dir, "settings.json", "{}");
    cellgrid()
        .arg("replay")
        .arg(script)
        .arg("--config")
        .arg(&config)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const FORMULAS: &str = r#"[
    {"type":"UPDATE_CELL","sheet_id":1,"position":"A1","content":"10"},
    {"type":"UPDATE_CELL","sheet_id":1,"position":"A2","content":"=A1+1"},
    {"type":"UPDATE_CELL","sheet_id":1,"position":"B1","content":"=A2*2"}
]"#;

const MERGE: &str = r#"[
    {"type":"UPDATE_CELL","sheet_id":1,"position":"A1","content":"keep"},
    {"type":"UPDATE_CELL","sheet_id":1,"position":"B1","content":"lose"},
    {"type":"ADD_MERGE","sheet_id":1,"zone":"A1:B1"}
]"#;

#[test]
fn test_replay_prints_evaluated_zone() {
    let dir = TempDir::new().unwrap();
    let script = write(&dir, "script.json", FORMULAS);
    let output = replay(&dir, &script, &["--print", "A1:B2"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "10\t22\n11\t\n");
}

#[test]
fn test_rejected_command_sets_exit_code() {
    let dir = TempDir::new().unwrap();
    let script = write(
        &dir,
        "script.json",
        r#"[
            {"type":"DELETE_SHEET","sheet_id":1},
            {"type":"UPDATE_CELL","sheet_id":1,"position":"A1","content":"still runs"}
        ]"#,
    );
    let output = replay(&dir, &script, &["--print", "A1"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("command 1 (DELETE_SHEET)"), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("a workbook needs at least one sheet"));
    assert_eq!(stdout(&output), "still runs\n");
}

#[test]
fn test_destructive_merge_needs_confirmation() {
    let dir = TempDir::new().unwrap();
    let script = write(&dir, "script.json", MERGE);

    // No answer on stdin declines
    let declined = replay(&dir, &script, &["--print", "A1:B1"]);
    assert_eq!(declined.status.code(), Some(1));
    assert_eq!(stdout(&declined), "keep\tlose\n");

    let accepted = replay(&dir, &script, &["--yes", "--print", "A1:B1"]);
    assert_eq!(accepted.status.code(), Some(0), "stderr: {}", stderr(&accepted));
    assert_eq!(stdout(&accepted), "keep\t\n");
}

#[test]
fn test_notifications_are_printed() {
    let dir = TempDir::new().unwrap();
    let script = write(
        &dir,
        "script.json",
        r#"[
            {"type":"UPDATE_CELL","sheet_id":1,"position":"A1","content":"  a  "},
            {"type":"TRIM_WHITESPACE","sheet_id":1,"zones":["A1:B2"]}
        ]"#,
    );
    let output = replay(&dir, &script, &[]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "[info] Trimmed whitespace from 1 cells.\n");
}

#[test]
fn test_locale_flag_changes_parsing_and_display() {
    let dir = TempDir::new().unwrap();
    let script = write(
        &dir,
        "script.json",
        r#"[{"type":"UPDATE_CELL","sheet_id":1,"position":"A1","content":"1,5"},
            {"type":"UPDATE_CELL","sheet_id":1,"position":"A2","content":"=A1*2"}]"#,
    );
    let output = replay(&dir, &script, &["--locale", "de-DE", "--print", "A1:A2"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "1,5\n3\n");
}

#[test]
fn test_invalid_elements_are_reported() {
    let dir = TempDir::new().unwrap();
    let script = write(&dir, "script.json", r#"[{"type":"NOT_A_COMMAND"},{"type":"EVALUATE_ALL"}]"#);
    let output = replay(&dir, &script, &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("command 1: invalid payload"));
}

#[test]
fn test_usage_errors_exit_2() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    assert_eq!(replay(&dir, &missing, &[]).status.code(), Some(2));

    let not_array = write(&dir, "object.json", r#"{"type":"EVALUATE_ALL"}"#);
    assert_eq!(replay(&dir, &not_array, &[]).status.code(), Some(2));

    let script = write(&dir, "script.json", FORMULAS);
    let output = replay(&dir, &script, &["--locale", "xx-XX"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("unknown locale 'xx-XX'"));
    assert_eq!(replay(&dir, &script, &["--print", "nope"]).status.code(), Some(2));
}

#[test]
fn test_eval() {
    let output = cellgrid().args(["eval", "=SUM(1,2,3)*2"]).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "12\n");

    let output = cellgrid().args(["eval", "=1/4", "--locale", "fr-FR"]).output().unwrap();
    assert_eq!(stdout(&output), "0,25\n");

    let output = cellgrid().args(["eval", "=1/0"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "#DIV/0!\n");

    let output = cellgrid().args(["eval", "1+1"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}
