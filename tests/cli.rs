use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn setup_project(root: &Path) {
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("secrets")).unwrap();
    fs::write(root.join("README.md"), "Acme Corp internal tool\n").unwrap();
    fs::write(root.join("src/config.env"), "PASSWORD=hunter2\nOWNER=Acme Corp\n").unwrap();
    fs::write(root.join("secrets/key.pem"), "-----BEGIN KEY-----\n").unwrap();
    fs::write(root.join("debug.log"), "noise\n").unwrap();
    fs::write(root.join(".gitignore"), "*.log\n").unwrap();
}

fn write_mapping(path: &Path) {
    fs::write(
        path,
        r#"{
            "ignore-folders": ["secrets"],
            "map": [
                { "scope": ".", "list": [ { "Acme Corp": "COMPANY" } ] },
                { "scope": "src/config.env", "list": [ { "hunter2": "PASSWORD_VALUE" } ] }
            ]
        }"#,
    )
    .unwrap();
}

#[test]
fn test_build_and_reconstruct_round_trip() {
    let work = tempdir().unwrap();
    let project = work.path().join("project");
    fs::create_dir_all(&project).unwrap();
    setup_project(&project);
    let mapping = work.path().join("mapping.json");
    write_mapping(&mapping);
    let artifact = work.path().join("bundle.json");

    Command::cargo_bin("portpack")
        .unwrap()
        .arg("build")
        .arg("--root")
        .arg(&project)
        .arg("--output")
        .arg(&artifact)
        .arg("--mapping")
        .arg(&mapping)
        .arg("--ignore-oracle")
        .arg("patterns")
        .arg("--all")
        .assert()
        .success()
        .stdout(predicate::str::contains("Packaged 2 files"));

    let json = fs::read_to_string(&artifact).unwrap();
    assert!(!json.contains("hunter2"));
    assert!(!json.contains("key.pem"));
    assert!(!json.contains("debug.log"));
    assert!(work.path().join("bundle.selection.json").exists());

    // Without the mapping, placeholders come back verbatim.
    let plain = work.path().join("plain");
    Command::cargo_bin("portpack")
        .unwrap()
        .arg("reconstruct")
        .arg(&artifact)
        .arg("--target")
        .arg(&plain)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 written, 0 skipped, 0 failed"));
    assert_eq!(
        fs::read_to_string(plain.join("src/config.env")).unwrap(),
        "PASSWORD=PASSWORD_VALUE\nOWNER=COMPANY\n"
    );

    // With the mapping, the original content is restored.
    let restored = work.path().join("restored");
    Command::cargo_bin("portpack")
        .unwrap()
        .arg("reconstruct")
        .arg(&artifact)
        .arg("--mapping")
        .arg(&mapping)
        .arg("--target")
        .arg(&restored)
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(restored.join("src/config.env")).unwrap(),
        "PASSWORD=hunter2\nOWNER=Acme Corp\n"
    );
    assert_eq!(
        fs::read_to_string(restored.join("README.md")).unwrap(),
        "Acme Corp internal tool\n"
    );
    assert!(!restored.join("secrets").exists());
}

#[test]
fn test_yes_overwrites_existing_files() {
    let work = tempdir().unwrap();
    let project = work.path().join("project");
    fs::create_dir_all(&project).unwrap();
    setup_project(&project);
    let artifact = work.path().join("bundle.json");

    Command::cargo_bin("portpack")
        .unwrap()
        .args(["build", "--all", "--ignore-oracle", "patterns", "--no-record"])
        .arg("--root")
        .arg(&project)
        .arg("--output")
        .arg(&artifact)
        .assert()
        .success();

    // Every file already exists in the original tree.
    Command::cargo_bin("portpack")
        .unwrap()
        .arg("reconstruct")
        .arg(&artifact)
        .arg("--target")
        .arg(&project)
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 skipped"));
}

#[test]
fn test_malformed_mapping_exits_with_mapping_status() {
    let work = tempdir().unwrap();
    let project = work.path().join("project");
    fs::create_dir_all(&project).unwrap();
    setup_project(&project);
    let mapping = work.path().join("mapping.json");
    fs::write(&mapping, r#"{"map":[{"scope":".","list":[{"a":"b","c":"d"}]}]}"#).unwrap();
    let artifact = work.path().join("bundle.json");

    Command::cargo_bin("portpack")
        .unwrap()
        .arg("build")
        .arg("--root")
        .arg(&project)
        .arg("--output")
        .arg(&artifact)
        .arg("--mapping")
        .arg(&mapping)
        .arg("--all")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid mapping specification"));

    assert!(!artifact.exists());
}

#[test]
fn test_missing_mapping_exits_with_mapping_status() {
    let work = tempdir().unwrap();
    let artifact = work.path().join("bundle.json");
    fs::write(
        &artifact,
        r#"{"format":"portpack/1","project":"p","created":"now","files":[],"tree":""}"#,
    )
    .unwrap();

    Command::cargo_bin("portpack")
        .unwrap()
        .arg("reconstruct")
        .arg(&artifact)
        .arg("--mapping")
        .arg(work.path().join("nope.json"))
        .arg("--target")
        .arg(work.path().join("out"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("mapping specification not found"));
}

#[test]
fn test_list_shows_files_and_tree() {
    let work = tempdir().unwrap();
    let project = work.path().join("project");
    fs::create_dir_all(&project).unwrap();
    setup_project(&project);
    let artifact = work.path().join("bundle.json");

    Command::cargo_bin("portpack")
        .unwrap()
        .args(["build", "--all", "--ignore-oracle", "patterns", "--no-record"])
        .arg("--root")
        .arg(&project)
        .arg("--output")
        .arg(&artifact)
        .assert()
        .success();

    Command::cargo_bin("portpack")
        .unwrap()
        .arg("list")
        .arg(&artifact)
        .assert()
        .success()
        .stdout(predicate::str::contains("src/config.env"))
        .stdout(predicate::str::contains("secrets/key.pem"))
        .stdout(predicate::str::contains("src/\n  config.env\n"));
}

#[test]
fn test_unsafe_artifact_is_rejected() {
    let work = tempdir().unwrap();
    let artifact = work.path().join("evil.json");
    // "eA==" is base64 for "x"
    fs::write(
        &artifact,
        r#"{"format":"portpack/1","project":"p","created":"now","files":[{"path":"../escape.txt","payload":"eA=="}],"tree":""}"#,
    )
    .unwrap();
    let target = work.path().join("out");

    Command::cargo_bin("portpack")
        .unwrap()
        .arg("reconstruct")
        .arg(&artifact)
        .arg("--target")
        .arg(&target)
        .arg("--yes")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsafe path"));

    assert!(!work.path().join("escape.txt").exists());
}

#[test]
fn test_git_oracle_outside_worktree_is_capability_error() {
    let work = tempdir().unwrap();
    let project = work.path().join("project");
    fs::create_dir_all(&project).unwrap();
    setup_project(&project);

    // Only meaningful when the temp dir is not itself inside a git checkout.
    let inside = std::process::Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(&project)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if inside {
        return;
    }

    Command::cargo_bin("portpack")
        .unwrap()
        .arg("build")
        .arg("--root")
        .arg(&project)
        .arg("--output")
        .arg(work.path().join("bundle.json"))
        .args(["--ignore-oracle", "git", "--all"])
        .assert()
        .code(3);
}

#[test]
fn test_config_paths_resolve_against_root() {
    let work = tempdir().unwrap();
    let project = work.path().join("project");
    fs::create_dir_all(&project).unwrap();
    setup_project(&project);
    write_mapping(&project.join("map.json"));
    fs::write(
        project.join("portpack.toml"),
        "output = \"bundle.json\"\nmapping = \"map.json\"\nignore-oracle = \"patterns\"\n",
    )
    .unwrap();

    // Run from outside the project so relative config paths cannot
    // accidentally resolve against the working directory.
    Command::cargo_bin("portpack")
        .unwrap()
        .current_dir(work.path())
        .args(["build", "--all", "--root", "project"])
        .assert()
        .success();

    let artifact = project.join("bundle.json");
    let json = fs::read_to_string(&artifact).unwrap();
    assert!(!json.contains("map.json"));
    assert!(!json.contains("bundle.json"));
    assert!(project.join("bundle.selection.json").exists());

    let restored = work.path().join("restored");
    Command::cargo_bin("portpack")
        .unwrap()
        .arg("reconstruct")
        .arg(&artifact)
        .arg("--target")
        .arg(&restored)
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(restored.join("src/config.env")).unwrap(),
        "PASSWORD=PASSWORD_VALUE\nOWNER=COMPANY\n"
    );
}

#[test]
fn test_no_include_vcs_overrides_config() {
    let work = tempdir().unwrap();
    let project = work.path().join("project");
    fs::create_dir_all(&project).unwrap();
    setup_project(&project);
    fs::write(
        project.join("portpack.toml"),
        "include-vcs = true\nignore-oracle = \"patterns\"\n",
    )
    .unwrap();

    let with_config = work.path().join("with.json");
    Command::cargo_bin("portpack")
        .unwrap()
        .args(["build", "--all", "--no-record"])
        .arg("--root")
        .arg(&project)
        .arg("--output")
        .arg(&with_config)
        .assert()
        .success();
    assert!(fs::read_to_string(&with_config).unwrap().contains(".gitignore"));

    let overridden = work.path().join("without.json");
    Command::cargo_bin("portpack")
        .unwrap()
        .args(["build", "--all", "--no-record", "--no-include-vcs"])
        .arg("--root")
        .arg(&project)
        .arg("--output")
        .arg(&overridden)
        .assert()
        .success();
    assert!(!fs::read_to_string(&overridden).unwrap().contains(".gitignore"));
}
