#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use savestate_engine::CheckpointEngine;
use savestate_storage::SaveStatePaths;
use tempfile::TempDir;

/// A managed directory authorized against a local bare repository.
pub struct Fixture {
    pub root: TempDir,
    pub remote: PathBuf,
    pub engine: Arc<CheckpointEngine>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_files(&[]).await
    }

    /// Files written before authorization end up in the initial commit.
    pub async fn with_files(files: &[(&str, &str)]) -> Self {
        let root = tempfile::tempdir().unwrap();
        let remote = root.path().join("remote.git");
        git(root.path(), &["init", "--bare", remote.to_str().unwrap()]);

        let engine = Arc::new(unauthorized_engine(root.path(), "data", &remote).await);
        let fixture = Self {
            root,
            remote,
            engine,
        };
        for (path, contents) in files {
            fixture.write(path, contents);
        }

        fixture.engine.authorize(None).await.unwrap();
        fixture
    }

    /// A second client for the same remote.
    pub async fn second_engine(&self) -> CheckpointEngine {
        unauthorized_engine(self.root.path(), "second", &self.remote).await
    }

    pub fn workspace(&self) -> &Path {
        &self.engine.paths().workspace_dir
    }

    pub fn write(&self, path: &str, contents: &str) {
        let full = self.workspace().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, contents).unwrap();
    }

    pub fn read(&self, path: &str) -> Option<String> {
        std::fs::read_to_string(self.workspace().join(path)).ok()
    }

    /// Git in the managed directory.
    pub fn git(&self, args: &[&str]) -> String {
        git(self.workspace(), args)
    }

    pub fn local_tags(&self) -> Vec<String> {
        lines(&self.git(&["tag", "--list", "save_*"]))
    }

    pub fn remote_tags(&self) -> Vec<String> {
        lines(&git(&self.remote, &["tag", "--list", "save_*"]))
    }

    /// Commit a tag points at in the remote.
    pub fn remote_commit(&self, tag: &str) -> String {
        git(&self.remote, &["rev-parse", &format!("{tag}^{{commit}}")])
    }

    pub fn stash_count(&self) -> usize {
        lines(&self.git(&["stash", "list"])).len()
    }

    /// Point origin somewhere that does not exist.
    pub fn break_remote(&self) {
        let missing = self.root.path().join("missing.git");
        self.git(&["remote", "set-url", "origin", missing.to_str().unwrap()]);
    }
}

async fn unauthorized_engine(root: &Path, name: &str, remote: &Path) -> CheckpointEngine {
    let paths = SaveStatePaths::from_root(root.join(name));
    let engine = CheckpointEngine::open(paths).await.unwrap();
    let url = remote.to_str().unwrap().to_string();
    engine
        .config_store()
        .update(|c| {
            c.repo_url = url;
            c.display_name = "Tester".into();
        })
        .await
        .unwrap();
    engine
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Fixture")
        .env("GIT_AUTHOR_EMAIL", "fixture@localhost")
        .env("GIT_COMMITTER_NAME", "Fixture")
        .env("GIT_COMMITTER_EMAIL", "fixture@localhost")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
