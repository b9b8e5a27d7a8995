#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn herdmeds(data: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin("herdmeds"));
    cmd.env_remove("HERDMEDS_LOG")
        .env_remove("HERDMEDS_DATA")
        .arg("--data-dir")
        .arg(data);
    cmd
}

fn picked(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// Add a record and return its id.
fn add(data: &Path, args: &[&str]) -> String {
    let out = herdmeds(data)
        .arg("--json")
        .arg("add")
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let record: serde_json::Value = serde_json::from_slice(&out).unwrap();
    record["id"].as_str().unwrap().to_string()
}

fn image_count(data: &Path) -> usize {
    fs::read_dir(data.join("medicine_images"))
        .map(|d| d.count())
        .unwrap_or(0)
}

#[test]
fn test_record_lifecycle() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let img = picked(temp.path(), "photo.jpg", b"jpeg bytes");

    let id = add(
        &data,
        &["Oxytetracycline", "-a", "cow", "-d", "10ml IM daily", "-i", img.to_str().unwrap()],
    );
    assert_eq!(image_count(&data), 1);

    herdmeds(&data)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Oxytetracycline"))
        .stdout(predicate::str::contains("1 img"));

    herdmeds(&data)
        .args(["show", &id[..8]])
        .assert()
        .success()
        .stdout(predicate::str::contains("10ml IM daily"))
        .stdout(predicate::str::contains("medicine_images"));

    herdmeds(&data)
        .args(["fav", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Favorited"));

    herdmeds(&data)
        .args(["list", "--favorites"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Oxytetracycline"));

    herdmeds(&data)
        .args(["delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted"));

    assert_eq!(image_count(&data), 0);
    herdmeds(&data)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No records yet"));
}

#[test]
fn test_form_rules_are_enforced() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");

    herdmeds(&data)
        .args(["add", "Neem", "-a", "goat", "-d", "Wounds", "-c", "home-remedy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("preparation method"));

    let images: Vec<String> = (0..4)
        .map(|i| {
            picked(temp.path(), &format!("{}.jpg", i), b"x")
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    let mut args = vec!["add", "Calcium", "-a", "cow", "-d", "Oral"];
    for image in &images {
        args.push("-i");
        args.push(image);
    }
    herdmeds(&data)
        .args(&args)
        .assert()
        .failure()
        .stderr(predicate::str::contains("at most 3 images"));

    herdmeds(&data)
        .args(["show", "deadbeef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Record not found"));
}

#[test]
fn test_edit_swaps_images() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let a = picked(temp.path(), "a.jpg", b"a");
    let b = picked(temp.path(), "b.png", b"b");

    let id = add(
        &data,
        &[
            "Ajwain water", "-a", "sheep", "-d", "For bloat", "-c", "home-remedy", "--prep",
            "Boil", "-i", a.to_str().unwrap(),
        ],
    );

    herdmeds(&data)
        .args(["edit", &id, "--remove-image", "1", "--add-image", b.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated"));

    let files: Vec<String> = fs::read_dir(data.join("medicine_images"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with(".png"));

    herdmeds(&data)
        .args(["edit", &id, "--clear-prep"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("preparation method"));
}

#[test]
fn test_backup_restore_and_startup() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let img = picked(temp.path(), "photo.jpg", b"jpeg bytes");

    herdmeds(&data)
        .arg("startup")
        .assert()
        .success()
        .stdout(predicate::str::contains("First launch"));

    add(&data, &["Ivermectin", "-a", "buffalo", "-d", "Pour on", "-i", img.to_str().unwrap()]);
    add(&data, &["Albendazole", "-a", "goat", "-d", "Oral"]);

    herdmeds(&data)
        .arg("backup")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 record(s)"));

    // Lose the collection the way a bad update would.
    fs::remove_file(data.join("kv").join("records.json")).unwrap();

    herdmeds(&data)
        .arg("startup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 2 record(s)"));

    herdmeds(&data)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ivermectin"))
        .stdout(predicate::str::contains("Albendazole"));
    assert_eq!(image_count(&data), 1);

    herdmeds(&data)
        .args(["restore", "--merge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 2 of 2"));

    let out = herdmeds(&data)
        .args(["--json", "stats"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stats: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(stats["currentRecordCount"], 4);
    assert_eq!(stats["hasBackup"], true);
}

#[test]
fn test_export_and_import_between_installs() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    let target = temp.path().join("target");
    let out = temp.path().join("out");
    let img = picked(temp.path(), "photo.jpg", &[0, 1, 2, 3]);

    add(&source, &["Calcium", "-a", "heifer", "-d", "After calving", "-i", img.to_str().unwrap()]);

    herdmeds(&source)
        .args(["export", "--snapshot", "--dir"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("herdmeds_backup_"));

    herdmeds(&source)
        .args(["export", "--dir"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("herdmeds_export_"));

    let snapshot = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().is_some_and(|e| e == "json"))
        .unwrap();

    herdmeds(&target)
        .arg("import")
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 1 of 1"));

    herdmeds(&target)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Calcium"));
    assert_eq!(image_count(&target), 1);

    let report = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().is_some_and(|e| e == "md"))
        .unwrap();
    herdmeds(&target)
        .arg("import")
        .arg(&report)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Corrupt snapshot"));
}
