//! Configuration integration tests.
//!
//! Config discovery, formats and precedence, observed end to end through
//! `commits`: with no Gerrit or Git credentials on disk the command fails on
//! the first configured source, so the error names which `tally.sources`
//! the binary actually loaded.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const GERRIT_FIRST: &str = "Gerrit credentials";
const GIT_FIRST: &str = "Git host credentials";

/// Returns a Command isolated from the user's own config and log dirs.
#[allow(deprecated)]
fn cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("REPOTALLY_LOG_DIR", home.join("logs"))
        .env_remove("REPOTALLY_LOG_PATH")
        .env_remove("RUST_LOG");
    cmd
}

/// Run `commits` from `dir` (with a projects file present) and expect it to
/// fail on the credentials of `first`.
fn assert_first_source(home: &Path, dir: &Path, first: &str) {
    fs::write(dir.join("projects.ini"), "[gerrit-users]\nalice@example.com\n").unwrap();
    cmd(home)
        .args(["-C", dir.to_str().unwrap(), "commits"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(first));
}

// =============================================================================
// Config File Discovery
// =============================================================================

#[test]
fn runs_with_defaults_without_config_file() {
    let tmp = TempDir::new().unwrap();
    assert_first_source(tmp.path(), tmp.path(), GERRIT_FIRST);
}

#[test]
fn discovers_dotfile_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".repotally.toml"), "[tally]\nsources = [\"git\"]\n").unwrap();
    assert_first_source(tmp.path(), tmp.path(), GIT_FIRST);
}

#[test]
fn discovers_regular_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("repotally.toml"), "[tally]\nsources = [\"git\"]\n").unwrap();
    assert_first_source(tmp.path(), tmp.path(), GIT_FIRST);
}

#[test]
fn discovers_config_in_parent_directory() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("nested").join("deep");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(tmp.path().join(".repotally.toml"), "[tally]\nsources = [\"git\"]\n").unwrap();
    assert_first_source(tmp.path(), &sub_dir, GIT_FIRST);
}

#[test]
fn dotfile_takes_precedence_over_regular_name() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".repotally.toml"), "[tally]\nsources = [\"git\"]\n").unwrap();
    fs::write(tmp.path().join("repotally.toml"), "[tally]\nsources = [\"gerrit\"]\n").unwrap();
    assert_first_source(tmp.path(), tmp.path(), GIT_FIRST);
}

#[test]
fn explicit_config_flag_is_used() {
    let tmp = TempDir::new().unwrap();
    let explicit = tmp.path().join("elsewhere.toml");
    fs::write(&explicit, "[tally]\nsources = [\"git\", \"gerrit\"]\n").unwrap();
    fs::write(tmp.path().join("projects.ini"), "[gerrit-users]\nalice@example.com\n").unwrap();

    cmd(tmp.path())
        .args(["-C", tmp.path().to_str().unwrap(), "-c", explicit.to_str().unwrap(), "commits"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(GIT_FIRST));
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_yaml_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".repotally.yaml"), "tally:\n  sources: [git]\n").unwrap();
    assert_first_source(tmp.path(), tmp.path(), GIT_FIRST);
}

#[test]
fn parses_yml_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".repotally.yml"), "tally:\n  sources:\n    - git\n").unwrap();
    assert_first_source(tmp.path(), tmp.path(), GIT_FIRST);
}

#[test]
fn parses_json_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".repotally.json"), r#"{"tally": {"sources": ["git"]}}"#).unwrap();
    assert_first_source(tmp.path(), tmp.path(), GIT_FIRST);
}

#[test]
fn toml_preferred_over_yaml_in_same_directory() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".repotally.toml"), "[tally]\nsources = [\"git\"]\n").unwrap();
    fs::write(tmp.path().join(".repotally.yaml"), "tally:\n  sources: [gerrit]\n").unwrap();
    assert_first_source(tmp.path(), tmp.path(), GIT_FIRST);
}

#[test]
fn configured_log_dir_receives_log_file() {
    let tmp = TempDir::new().unwrap();
    let log_dir = tmp.path().join("team-logs");
    fs::write(
        tmp.path().join(".repotally.toml"),
        format!("log_dir = {:?}\n", log_dir.to_str().unwrap()),
    )
    .unwrap();
    fs::write(tmp.path().join("projects.ini"), "[gerrit-users]\nalice@example.com\n").unwrap();

    cmd(tmp.path())
        .env_remove("REPOTALLY_LOG_DIR")
        .args(["-C", tmp.path().to_str().unwrap(), "commits"])
        .assert()
        .code(1);
    assert!(log_dir.join("repotally.jsonl").exists());
}

// =============================================================================
// Config Precedence
// =============================================================================

#[test]
fn closer_config_takes_precedence() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("project");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(tmp.path().join(".repotally.toml"), "[tally]\nsources = [\"git\"]\n").unwrap();
    fs::write(sub_dir.join(".repotally.toml"), "[tally]\nsources = [\"gerrit\"]\n").unwrap();
    assert_first_source(tmp.path(), &sub_dir, GERRIT_FIRST);
}

#[test]
fn git_boundary_stops_config_search() {
    let tmp = TempDir::new().unwrap();
    let parent = tmp.path().join("parent");
    let repo = parent.join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();
    fs::write(parent.join(".repotally.toml"), "[tally]\nsources = [\"git\"]\n").unwrap();

    assert_first_source(tmp.path(), &src, GERRIT_FIRST);
}

#[test]
fn config_in_same_dir_as_git_is_found() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();
    fs::write(repo.join(".repotally.toml"), "[tally]\nsources = [\"git\"]\n").unwrap();

    assert_first_source(tmp.path(), &src, GIT_FIRST);
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn invalid_toml_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".repotally.toml"), "this is not valid toml [[[").unwrap();

    cmd(tmp.path())
        .args(["-C", tmp.path().to_str().unwrap(), "commits"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}

#[test]
fn invalid_json_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".repotally.json"), "{not valid json}").unwrap();

    cmd(tmp.path())
        .args(["-C", tmp.path().to_str().unwrap(), "commits"])
        .assert()
        .failure();
}

#[test]
fn unknown_source_in_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".repotally.toml"), "[tally]\nsources = [\"svn\"]\n").unwrap();

    cmd(tmp.path())
        .args(["-C", tmp.path().to_str().unwrap(), "commits"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn unknown_config_field_is_ignored() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".repotally.toml"),
        "unknown_field = \"ignored\"\n\n[tally]\nsources = [\"git\"]\nanother_unknown = 42\n",
    )
    .unwrap();
    assert_first_source(tmp.path(), tmp.path(), GIT_FIRST);
}
