//! Shared test support: an in-memory hosting provider and fixture helpers.
//! Compiled into the library so integration tests can use it too.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::error::{Error, Result};
use crate::github::{CodeHost, HookConfig, HostedRepo};

#[derive(Debug, Clone)]
pub struct RegisteredHook {
    pub id: i64,
    pub repo: String,
    pub url: String,
    pub secret: String,
}

/// In-memory stand-in for the hosting provider.
#[derive(Default)]
pub struct FakeHost {
    repos: Mutex<Vec<HostedRepo>>,
    hooks: Mutex<HashMap<i64, RegisteredHook>>,
    next_hook_id: AtomicI64,
    fail_list: AtomicBool,
    fail_hook_create: AtomicBool,
    fail_hook_delete: AtomicBool,
}

impl FakeHost {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_hook_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    pub fn add_repo(&self, id: i64, name: &str, clone_url: &str) {
        self.repos.lock().unwrap().push(HostedRepo {
            id,
            name: name.to_string(),
            clone_url: clone_url.to_string(),
            fork: false,
        });
    }

    pub fn remove_repo(&self, name: &str) {
        self.repos.lock().unwrap().retain(|r| r.name != name);
    }

    pub fn clear_repos(&self) {
        self.repos.lock().unwrap().clear();
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_hook_create(&self, fail: bool) {
        self.fail_hook_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_hook_delete(&self, fail: bool) {
        self.fail_hook_delete.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn hooks(&self) -> Vec<RegisteredHook> {
        self.hooks.lock().unwrap().values().cloned().collect()
    }
}

impl CodeHost for FakeHost {
    fn list_repos(&self, _token: &str) -> Result<Vec<HostedRepo>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::WebhookOperation("provider unavailable".to_string()));
        }
        Ok(self.repos.lock().unwrap().clone())
    }

    fn get_repo(&self, _token: &str, owner: &str, name: &str) -> Result<HostedRepo> {
        self.repos
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| Error::UpstreamNotFound(format!("{owner}/{name}")))
    }

    fn create_hook(
        &self,
        _token: &str,
        _owner: &str,
        name: &str,
        config: &HookConfig,
    ) -> Result<i64> {
        if self.fail_hook_create.load(Ordering::SeqCst) {
            return Err(Error::WebhookOperation("hook creation refused".to_string()));
        }
        let id = self.next_hook_id.fetch_add(1, Ordering::SeqCst);
        self.hooks.lock().unwrap().insert(
            id,
            RegisteredHook {
                id,
                repo: name.to_string(),
                url: config.url.clone(),
                secret: config.secret.clone(),
            },
        );
        Ok(id)
    }

    fn delete_hook(&self, _token: &str, _owner: &str, _name: &str, hook_id: i64) -> Result<()> {
        if self.fail_hook_delete.load(Ordering::SeqCst) {
            return Err(Error::WebhookOperation("hook deletion refused".to_string()));
        }
        self.hooks.lock().unwrap().remove(&hook_id);
        Ok(())
    }
}

/// Creates a git repository at `dir` containing `files` (path, contents) in a
/// single commit, and returns a URL suitable for cloning.
pub fn git_fixture(dir: &Path, files: &[(&str, &str)]) -> String {
    let repo = git2::Repository::init(dir).expect("init fixture repo");

    for (rel, contents) in files {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dirs");
        }
        std::fs::write(&path, contents).expect("write fixture file");
    }

    let mut index = repo.index().expect("index");
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .expect("add files");
    index.write().expect("write index");
    let tree_id = index.write_tree().expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");
    let sig = git2::Signature::now("fixture", "fixture@localhost").expect("signature");
    repo.commit(Some("HEAD"), &sig, &sig, "fixture", &tree, &[])
        .expect("commit");

    format!("file://{}", dir.display())
}

/// Writes a stand-in renderer script that copies its source argument to
/// `<output-dir>/index.html`. Returns the script path.
#[cfg(unix)]
pub fn stub_renderer(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("renderer.sh");
    std::fs::write(&script, "#!/bin/sh\nmkdir -p \"$2\"\ncp \"$1\" \"$2/index.html\"\n")
        .expect("write renderer stub");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("chmod renderer stub");
    script
}

/// A renderer that always exits non-zero, for failure-path tests.
#[cfg(unix)]
pub fn failing_renderer(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("failing-renderer.sh");
    std::fs::write(&script, "#!/bin/sh\nexit 3\n").expect("write renderer stub");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("chmod renderer stub");
    script
}
