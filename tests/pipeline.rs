//! End-to-end pipeline tests driving the library directly: synchronize an
//! account against the provider, activate a repository, build it from a git
//! fixture, then follow manifest changes across rebuilds.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use podium::config::ServerConfig;
use podium::lifecycle;
use podium::store::{SqliteStore, Store};
use podium::testing::{FakeHost, git_fixture, stub_renderer};
use podium::types::{Account, RepoState};
use podium::worker::{build, sync};

struct Harness {
    _dir: tempfile::TempDir,
    config: ServerConfig,
    store: Arc<SqliteStore>,
    host: FakeHost,
    account: Account,
}

fn harness() -> Harness {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let config = ServerConfig {
        data_dir: dir.path().join("data"),
        site: "example.org".to_string(),
        renderer: stub_renderer(dir.path()),
        ..ServerConfig::default()
    };
    fs::create_dir_all(config.public_root()).expect("public root");

    let store = Arc::new(SqliteStore::new(config.db_path()).expect("open store"));
    store.initialize().expect("initialize");

    let account = Account::new("alice", Some("token".to_string()));
    store.create_account(&account).expect("create account");

    Harness {
        _dir: dir,
        config,
        store,
        host: FakeHost::new(),
        account,
    }
}

/// Stages the working tree into a new commit on HEAD.
fn commit_all(dir: &Path) {
    let repo = git2::Repository::open(dir).expect("open fixture repo");
    let mut index = repo.index().expect("index");
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .expect("add files");
    index.write().expect("write index");
    let tree_id = index.write_tree().expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");
    let sig = git2::Signature::now("fixture", "fixture@localhost").expect("signature");
    let head = repo.head().expect("head").peel_to_commit().expect("commit");
    repo.commit(Some("HEAD"), &sig, &sig, "update", &tree, &[&head])
        .expect("commit");
}

#[test]
fn test_sync_activate_build_serve_cycle() {
    let h = harness();

    let fixture = tempfile::TempDir::new().expect("fixture dir");
    let clone_url = git_fixture(
        fixture.path(),
        &[
            (
                ".podium.yml",
                "talk:\n  assets:\n    - img/*\nworkshop:\n  source: deck/workshop.rst\n",
            ),
            ("talk.rst", "Talk\n====\n"),
            ("deck/workshop.rst", "Workshop\n========\n"),
            ("img/logo.png", "png-bytes"),
        ],
    );
    h.host.add_repo(10, "slides", &clone_url);

    // Synchronization mirrors the provider's repository list.
    let report = sync::synchronize(
        h.store.as_ref(),
        &h.host,
        &h.config,
        &h.account.username,
    )
    .expect("synchronize");
    assert_eq!(report.created, 1);

    let mut repo = h
        .store
        .get_repository_by_route("alice", "slides")
        .unwrap()
        .expect("repo row");
    assert_eq!(repo.github_id, 10);
    assert_eq!(repo.state, RepoState::Inactive);

    // Activation registers a webhook carrying the repository secret.
    lifecycle::activate(h.store.as_ref(), &h.host, &h.config, &mut repo).expect("activate");
    let hooks = h.host.hooks();
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0].secret, repo.secret);

    // A build renders both presentations and stages the declared assets.
    let report = build::build(h.store.as_ref(), &h.host, &h.config, &repo).expect("build");
    assert_eq!(report.built.len(), 2);
    assert!(report.skipped.is_empty());

    let talk = h
        .store
        .get_presentation(&repo.id, "talk")
        .unwrap()
        .expect("talk record");
    assert_eq!(talk.path, "talk.rst");
    let workshop = h
        .store
        .get_presentation(&repo.id, "workshop")
        .unwrap()
        .expect("workshop record");
    assert_eq!(workshop.path, "deck/workshop.rst");

    let public = h.config.public_root();
    assert!(public.join(&talk.id).join("index.html").is_file());
    assert!(public.join(&talk.id).join("img/logo.png").is_file());
    assert!(public.join(&workshop.id).join("index.html").is_file());
}

#[test]
fn test_rebuild_follows_manifest_changes() {
    let h = harness();

    let fixture = tempfile::TempDir::new().expect("fixture dir");
    let clone_url = git_fixture(
        fixture.path(),
        &[
            (".podium.yml", "talk:\nold:\n"),
            ("talk.rst", "Talk\n====\n"),
            ("old.rst", "Old\n===\n"),
        ],
    );
    h.host.add_repo(10, "slides", &clone_url);

    sync::synchronize(h.store.as_ref(), &h.host, &h.config, &h.account.username)
        .expect("synchronize");
    let repo = h
        .store
        .get_repository_by_route("alice", "slides")
        .unwrap()
        .expect("repo row");

    build::build(h.store.as_ref(), &h.host, &h.config, &repo).expect("first build");
    let old = h
        .store
        .get_presentation(&repo.id, "old")
        .unwrap()
        .expect("old record");
    let old_output = h.config.public_root().join(&old.id);
    assert!(old_output.join("index.html").is_file());

    // Drop one presentation from the manifest and push again.
    fs::write(fixture.path().join(".podium.yml"), "talk:\n").expect("rewrite manifest");
    commit_all(fixture.path());

    let report = build::build(h.store.as_ref(), &h.host, &h.config, &repo).expect("second build");
    assert_eq!(report.built, vec!["talk".to_string()]);
    assert_eq!(report.pruned, 1);

    assert!(h.store.get_presentation(&repo.id, "old").unwrap().is_none());
    assert!(!old_output.exists());
    assert!(h.store.get_presentation(&repo.id, "talk").unwrap().is_some());
}

#[test]
fn test_vanished_repository_is_deactivated_and_removed() {
    let h = harness();

    let fixture = tempfile::TempDir::new().expect("fixture dir");
    let clone_url = git_fixture(fixture.path(), &[("README", "hello\n")]);
    h.host.add_repo(10, "slides", &clone_url);

    sync::synchronize(h.store.as_ref(), &h.host, &h.config, &h.account.username)
        .expect("synchronize");
    let mut repo = h
        .store
        .get_repository_by_route("alice", "slides")
        .unwrap()
        .expect("repo row");
    lifecycle::activate(h.store.as_ref(), &h.host, &h.config, &mut repo).expect("activate");
    assert_eq!(h.host.hooks().len(), 1);

    // The repository disappears upstream; the next pass reconciles.
    h.host.remove_repo("slides");
    let report = sync::synchronize(h.store.as_ref(), &h.host, &h.config, &h.account.username)
        .expect("second synchronize");
    assert_eq!(report.removed, 1);

    assert!(
        h.store
            .get_repository_by_route("alice", "slides")
            .unwrap()
            .is_none()
    );
    assert!(h.host.hooks().is_empty());
}
