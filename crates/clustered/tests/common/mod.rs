use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A throwaway HOME plus a project directory holding `config/*.json`
pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("home")).unwrap();
        fs::create_dir_all(root.path().join("config")).unwrap();
        let project = Self { root };
        project.write_config(
            "Environment_config.json",
            &format!(
                r#"{{"DB_CONFIG": {{"DB_ENGINE": "sqlite", "DB_FILE": "{}"}}}}"#,
                project.db_path().display()
            ),
        );
        project
    }

    pub fn write_config(&self, file_name: &str, content: &str) {
        fs::write(self.path().join("config").join(file_name), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn db_path(&self) -> PathBuf {
        self.path().join("clustered.db")
    }

    pub fn workspace(&self) -> PathBuf {
        self.path().join("home").join(".clustered")
    }

    /// `clustered` isolated from the caller's HOME and CLUSTERED__* variables
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("clustered").unwrap();
        cmd.current_dir(self.path())
            .env("HOME", self.path().join("home"))
            .env_remove("CLUSTERED_LOG");
        for (key, _) in std::env::vars() {
            if key.starts_with("CLUSTERED__") {
                cmd.env_remove(key);
            }
        }
        cmd
    }

    #[allow(dead_code)]
    pub fn initiated() -> Self {
        let project = Self::new();
        project.cmd().arg("init").assert().success();
        project
    }

    /// Encryptor ENC1, repository REPO1 and cluster C1
    #[allow(dead_code)]
    pub fn with_cluster() -> Self {
        let project = Self::initiated();
        project
            .cmd()
            .args(["encryptor", "add", "enc1"])
            .assert()
            .success();
        project
            .cmd()
            .args([
                "repository",
                "add",
                "repo1",
                "enc1",
                "--access-key",
                "AKIA",
                "--secret-key",
                "SECRET",
            ])
            .assert()
            .success();
        project
            .cmd()
            .args(["cluster", "add", "c1", "repo1"])
            .assert()
            .success();
        project
    }
}
