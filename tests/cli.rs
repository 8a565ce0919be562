use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn shopfloor(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shopfloor").unwrap();
    cmd.env("HOME", home.path())
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("SHOPFLOOR_ACCESS_KEY")
        .current_dir(home.path());
    cmd
}

fn init(home: &TempDir) {
    let data_dir = home.path().join("data");
    shopfloor(home)
        .args(["init", "--user", "An", "--data-dir"])
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized shopfloor"));
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    shopfloor(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("report"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("dashboard"));
}

#[test]
fn add_list_approve_and_refuse_delete() {
    let home = TempDir::new().unwrap();
    init(&home);

    shopfloor(&home)
        .args(["stages", "set-price", "Cắt thô", "10000"])
        .assert()
        .success();

    shopfloor(&home)
        .args(["report", "add", "--stage", "Cắt thô", "--quantity", "50", "--date", "2025-03-22"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BC001"));

    shopfloor(&home)
        .args(["report", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BC001"))
        .stdout(predicate::str::contains("Pending"));

    shopfloor(&home)
        .args(["--as", "Dũng", "report", "approve", "BC001"])
        .assert()
        .success()
        .stdout(predicate::str::contains("500.000"));

    shopfloor(&home)
        .args(["report", "delete", "BC001", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot delete"));

    shopfloor(&home)
        .args(["report", "show", "BC001"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dũng - approved"));
}

#[test]
fn missing_fields_are_all_reported() {
    let home = TempDir::new().unwrap();
    init(&home);
    shopfloor(&home)
        .args(["report", "add", "--stage", " ", "--quantity", ""])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stage is required"))
        .stderr(predicate::str::contains("quantity is required"));
}

#[test]
fn template_then_import() {
    let home = TempDir::new().unwrap();
    init(&home);
    let path = home.path().join("mau.csv");

    shopfloor(&home)
        .args(["template", "--output"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    shopfloor(&home)
        .arg("import")
        .arg(&path)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 row(s) would be imported"));

    shopfloor(&home)
        .arg("import")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 imported"));

    shopfloor(&home)
        .arg("import")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("already been imported"));
}

#[test]
fn commands_need_a_user() {
    let home = TempDir::new().unwrap();
    shopfloor(&home)
        .args(["report", "add", "--stage", "Cắt thô", "--quantity", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no user set"));
}
