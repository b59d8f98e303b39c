// Drives the compiled binary against a throwaway data directory.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::tempdir;

fn walktest(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("walktest").unwrap();
    cmd.arg("--data-dir")
        .arg(dir.join("data"))
        .arg("--config")
        .arg(dir.join("config.json"))
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn replay_then_history_and_achievements() {
    let dir = tempdir().unwrap();
    let track = dir.path().join("track.json");
    fs::write(
        &track,
        r#"[
            {"latitude":0.0,"longitude":0.0,"timestamp":0},
            {"latitude":0.0,"longitude":0.001,"timestamp":1000}
        ]"#,
    )
    .unwrap();

    let out = stdout_of(walktest(dir.path()).arg("replay").arg(&track).arg("--stop-at-end"));
    assert!(out.contains("You walked 111 meters in 1 seconds."), "{out}");
    assert!(out.contains("Achievement unlocked: First Steps"), "{out}");
    assert!(dir.path().join("data").join("walk_results.json").exists());

    let out = stdout_of(walktest(dir.path()).args(["history", "--period", "all"]));
    assert!(out.contains("Tests: 1"), "{out}");
    assert!(out.contains("Best Distance: 111m"), "{out}");

    let out = stdout_of(walktest(dir.path()).args(["achievements", "--category", "frequency"]));
    assert!(out.contains("[x] First Steps"), "{out}");
    assert!(out.contains("[ ] Walking Expert"), "{out}");
    assert!(!out.contains("Distance Warrior"), "{out}");
}

#[test]
fn sqlite_backend_from_flag() {
    let dir = tempdir().unwrap();
    let track = dir.path().join("track.csv");
    fs::write(
        &track,
        "latitude,longitude,timestamp\n0.0,0.0,0\n0.001,0.0,2000\n",
    )
    .unwrap();

    stdout_of(
        walktest(dir.path())
            .args(["--storage", "sqlite", "replay"])
            .arg(&track)
            .arg("--stop-at-end"),
    );
    assert!(dir.path().join("data").join("walk_results.db").exists());

    let out = stdout_of(walktest(dir.path()).args(["--storage", "sqlite", "history", "-p", "all"]));
    assert!(out.contains("Tests: 1"), "{out}");
}

#[test]
fn profile_set_and_show() {
    let dir = tempdir().unwrap();

    let out = stdout_of(walktest(dir.path()).args(["profile", "show"]));
    assert!(out.contains("[?]"), "{out}");
    assert!(out.contains("Name: Not set"), "{out}");

    let out = stdout_of(walktest(dir.path()).args([
        "profile",
        "set",
        "--name",
        "grace",
        "--medical-conditions",
        "none",
    ]));
    assert!(out.contains("Profile saved"), "{out}");

    let out = stdout_of(walktest(dir.path()).args(["profile", "show"]));
    assert!(out.contains("[G]"), "{out}");
    assert!(out.contains("Name: grace"), "{out}");
    assert!(out.contains("Medical Conditions: none"), "{out}");
    assert!(out.contains("Weight: Not set"), "{out}");
}

#[test]
fn replay_of_missing_track_fails() {
    let dir = tempdir().unwrap();
    walktest(dir.path())
        .arg("replay")
        .arg(dir.path().join("nope.csv"))
        .assert()
        .failure();
    assert!(!dir.path().join("data").join("walk_results.json").exists());
}

#[test]
fn history_lists_recent_tests_and_empty_periods() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(
        data.join("walk_results.json"),
        r#"[
            {"date":"2024-01-02T10:00:00Z","distance":480,"duration":360,"coordinates":[]},
            {"date":"2024-01-09T15:30:00Z","distance":512,"duration":360,"coordinates":[]}
        ]"#,
    )
    .unwrap();

    let out = stdout_of(walktest(dir.path()).args(["history", "--period", "week"]));
    assert!(out.contains("Tests: 0"), "{out}");
    assert!(out.contains("No walk tests in this period"), "{out}");
    assert!(!out.contains("Progress:"), "{out}");

    let out = stdout_of(walktest(dir.path()).args(["history", "--period", "all"]));
    assert!(out.contains("Recent Tests:"), "{out}");
    let newer = out.find("January 9, 2024").expect("newer test listed");
    let older = out.find("January 2, 2024").expect("older test listed");
    assert!(newer < older, "{out}");
    assert!(out.contains("03:30 PM  512m"), "{out}");
}
