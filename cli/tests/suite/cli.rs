use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn cronctl() -> anyhow::Result<Command> {
    Ok(Command::cargo_bin("cronctl")?)
}

fn drop_in_args(dir: &Path) -> Vec<String> {
    vec![
        "--user".to_string(),
        "root".to_string(),
        "--drop-in-file".to_string(),
        "jobs".to_string(),
        "--drop-in-dir".to_string(),
        dir.display().to_string(),
    ]
}

#[test]
fn add_then_noop_round_trip() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let target = tmp.path().join("jobs");

    let assert = cronctl()?
        .args(["--name", "backup", "--command", "/usr/local/bin/backup"])
        .args(drop_in_args(tmp.path()))
        .assert()
        .success();
    let outcome: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(outcome["changed"], serde_json::json!(true));
    assert_eq!(outcome["state"], serde_json::json!("present"));
    assert_eq!(outcome["drop_in_file"], serde_json::json!("jobs"));
    assert_eq!(outcome["jobs"], serde_json::json!(["backup"]));
    assert_eq!(
        fs::read_to_string(&target)?,
        "#cronctl: backup\n* * * * * root /usr/local/bin/backup\n"
    );

    let assert = cronctl()?
        .args(["--name", "backup", "--command", "/usr/local/bin/backup"])
        .args(drop_in_args(tmp.path()))
        .assert()
        .success();
    let outcome: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(outcome["changed"], serde_json::json!(false));
    Ok(())
}

#[test]
fn absent_removes_the_entry_and_deletes_the_empty_file() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let target = tmp.path().join("jobs");
    fs::write(&target, "#cronctl: backup\n* * * * * root /usr/local/bin/backup\n")?;

    let assert = cronctl()?
        .args(["--name", "backup", "--state", "absent"])
        .args(drop_in_args(tmp.path()))
        .assert()
        .success();
    let outcome: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(outcome["changed"], serde_json::json!(true));
    assert_eq!(outcome["jobs"], serde_json::json!([]));
    assert!(!target.exists());
    Ok(())
}

#[test]
fn reboot_conflicts_with_time_fields() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    cronctl()?
        .args(["--name", "job", "--command", "/bin/true", "--reboot", "--hour", "5"])
        .args(drop_in_args(tmp.path()))
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "reboot schedule cannot be combined with explicit time fields",
        ));
    // Validation fires before any store access.
    assert!(!tmp.path().join("jobs").exists());
    Ok(())
}

#[test]
fn drop_in_file_without_user_is_rejected() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    cronctl()?
        .args(["--name", "job", "--command", "/bin/true"])
        .args([
            "--drop-in-file",
            "jobs",
            "--drop-in-dir",
            &tmp.path().display().to_string(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires an explicit principal"));
    Ok(())
}

#[test]
fn backup_path_is_reported() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let target = tmp.path().join("jobs");
    let original = "#cronctl: job\n* * * * * root /bin/old\n";
    fs::write(&target, original)?;

    let assert = cronctl()?
        .args(["--name", "job", "--command", "/bin/new", "--backup"])
        .args(drop_in_args(tmp.path()))
        .assert()
        .success();
    let outcome: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    let backup = outcome["backup"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("backup path missing"))?;
    assert_eq!(fs::read_to_string(backup)?, original);
    fs::remove_file(backup)?;
    Ok(())
}

#[test]
fn completion_subcommand_emits_a_script() -> anyhow::Result<()> {
    cronctl()?
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cronctl"));
    Ok(())
}
