// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{commit_all, set_identity, settings, site_fixture, url, RepoFixture, RepoKind};

use anyhow::Result;
use git2::Repository;
use indicatif::ProgressBar;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    fs::{create_dir, read_to_string, write},
    path::{Path, PathBuf},
};
use tibl::{
    error::{Error, RemoteError},
    sync::{Change, ChangeKind, PullOutcome, PushOutcome, PushScope},
    Site,
};

/// Bare repository standing in for the user's remote.
fn remote_fixture() -> Result<String> {
    let path = std::env::current_dir()?.join("remote.git");
    RepoFixture::new(&path, RepoKind::Bare)?;
    Ok(url(path))
}

/// Site at `root` linked to `remote`, with a committer identity.
fn linked_site(root: &Path, remote: &str) -> Result<Site> {
    let mut site = Site::open(root, &settings())?;
    site.link_remote(remote)?;
    set_identity(root)?;
    Ok(site)
}

fn remote_head(remote: &str) -> Result<git2::Oid> {
    let repo = Repository::open_bare(remote)?;
    let oid = repo.find_reference("refs/heads/main")?.peel_to_commit()?.id();
    Ok(oid)
}

#[sealed_test]
fn status_lists_modified_and_untracked() -> Result<()> {
    let root = site_fixture("blog")?;
    let site = linked_site(&root, "https://example.com/blog.git")?;
    commit_all(&root, "init")?;
    write(root.join("index.html"), "<h1>my blog</h1>\n")?;
    write(root.join("data/topics/new.md"), "# New")?;

    let changes = site.sync(ProgressBar::hidden())?.status()?;
    assert_eq!(changes.len(), 2);
    assert!(changes.contains(&Change {
        kind: ChangeKind::Modified,
        path: PathBuf::from("index.html"),
    }));
    assert!(changes.contains(&Change {
        kind: ChangeKind::Untracked,
        path: PathBuf::from("data/topics/new.md"),
    }));

    Ok(())
}

#[sealed_test]
fn pull_refuses_dirty_work_tree() -> Result<()> {
    let root = site_fixture("blog")?;
    let site = linked_site(&root, "https://example.invalid/blog.git")?;
    let head = commit_all(&root, "init")?;
    write(root.join("index.html"), "<h1>my blog</h1>\n")?;

    let result = site.sync(ProgressBar::hidden())?.pull();
    assert!(matches!(
        result,
        Err(Error::Remote(RemoteError::Dirty { ref paths })) if *paths == vec![PathBuf::from("index.html")]
    ));

    let repo = Repository::open(&root)?;
    assert_eq!(repo.head()?.peel_to_commit()?.id(), head);
    assert_eq!(read_to_string(root.join("index.html"))?, "<h1>my blog</h1>\n");

    Ok(())
}

#[sealed_test]
fn push_clean_work_tree_does_nothing() -> Result<()> {
    let remote = remote_fixture()?;
    let root = site_fixture("blog")?;
    let site = linked_site(&root, &remote)?;
    commit_all(&root, "init")?;

    let outcome = site.sync(ProgressBar::hidden())?.push(PushScope::All)?;
    assert_eq!(outcome, PushOutcome::NothingToPush);
    assert!(Repository::open_bare(&remote)?
        .find_reference("refs/heads/main")
        .is_err());

    Ok(())
}

#[sealed_test]
fn push_then_pull_between_sites() -> Result<()> {
    let remote = remote_fixture()?;
    let alpha = site_fixture("alpha")?;
    let alpha_site = linked_site(&alpha, &remote)?;

    let outcome = alpha_site.sync(ProgressBar::hidden())?.push(PushScope::All)?;
    let PushOutcome::Pushed { commit: first, changes } = outcome else {
        panic!("expected push, got {outcome:?}");
    };
    assert_eq!(changes, 3);
    assert_eq!(remote_head(&remote)?, first);

    let beta = std::env::current_dir()?.join("beta");
    create_dir(&beta)?;
    let beta_site = linked_site(&beta, &remote)?;
    let outcome = beta_site.sync(ProgressBar::hidden())?.pull()?;
    assert_eq!(outcome, PullOutcome::FastForwarded { from: None, to: first });
    assert_eq!(
        read_to_string(beta.join("index.html"))?,
        read_to_string(alpha.join("index.html"))?
    );

    alpha_site.content().create_item("post", "hello", "Hello")?;
    let outcome = alpha_site.sync(ProgressBar::hidden())?.push(PushScope::All)?;
    let PushOutcome::Pushed { commit: second, changes } = outcome else {
        panic!("expected push, got {outcome:?}");
    };
    assert_eq!(changes, 2);

    let outcome = beta_site.sync(ProgressBar::hidden())?.pull()?;
    assert_eq!(
        outcome,
        PullOutcome::FastForwarded {
            from: Some(first),
            to: second
        }
    );
    assert_eq!(read_to_string(beta.join("data/topics/hello.md"))?, "# Hello");
    assert!(beta_site.sync(ProgressBar::hidden())?.status()?.is_empty());

    let outcome = beta_site.sync(ProgressBar::hidden())?.pull()?;
    assert_eq!(outcome, PullOutcome::UpToDate);

    Ok(())
}

#[sealed_test]
fn pull_diverged_history_is_refused() -> Result<()> {
    let remote = remote_fixture()?;
    let alpha = site_fixture("alpha")?;
    let alpha_site = linked_site(&alpha, &remote)?;
    alpha_site.sync(ProgressBar::hidden())?.push(PushScope::All)?;

    let beta = std::env::current_dir()?.join("beta");
    create_dir(&beta)?;
    let beta_site = linked_site(&beta, &remote)?;
    beta_site.sync(ProgressBar::hidden())?.pull()?;

    alpha_site.content().create_item("post", "hello", "Hello")?;
    alpha_site.sync(ProgressBar::hidden())?.push(PushScope::All)?;

    write(beta.join("index.html"), "<h1>beta</h1>\n")?;
    let local = commit_all(&beta, "local change")?;

    let result = beta_site.sync(ProgressBar::hidden())?.pull();
    assert!(matches!(
        result,
        Err(Error::Remote(RemoteError::Diverged { .. }))
    ));

    let repo = Repository::open(&beta)?;
    assert_eq!(repo.head()?.peel_to_commit()?.id(), local);
    assert!(!beta.join("data/topics/hello.md").exists());

    Ok(())
}

#[sealed_test]
fn push_data_only_ignores_outside_changes() -> Result<()> {
    let remote = remote_fixture()?;
    let root = site_fixture("blog")?;
    let site = linked_site(&root, &remote)?;
    let first = commit_all(&root, "init")?;
    write(root.join("index.html"), "<h1>my blog</h1>\n")?;

    let sync = site.sync(ProgressBar::hidden())?;
    assert_eq!(sync.push(PushScope::DataOnly)?, PushOutcome::NothingToPush);
    assert_eq!(Repository::open(&root)?.head()?.peel_to_commit()?.id(), first);

    site.content().create_item("post", "hello", "Hello")?;
    let outcome = sync.push(PushScope::DataOnly)?;
    let PushOutcome::Pushed { commit, changes } = outcome else {
        panic!("expected push, got {outcome:?}");
    };
    assert_eq!(changes, 2);
    assert_eq!(remote_head(&remote)?, commit);

    let changes = sync.status()?;
    assert_eq!(
        changes,
        vec![Change {
            kind: ChangeKind::Modified,
            path: PathBuf::from("index.html"),
        }]
    );

    Ok(())
}

#[sealed_test]
fn push_uses_commit_message_template() -> Result<()> {
    let remote = remote_fixture()?;
    let root = site_fixture("blog")?;
    let mut settings = settings();
    settings.sync.commit_message = "publish {count} files".into();

    let mut site = Site::open(&root, &settings)?;
    site.link_remote(&remote)?;
    set_identity(&root)?;

    let outcome = site.sync(ProgressBar::hidden())?.push(PushScope::All)?;
    let PushOutcome::Pushed { commit, .. } = outcome else {
        panic!("expected push, got {outcome:?}");
    };

    let repo = Repository::open_bare(&remote)?;
    let message = repo.find_commit(commit)?.message().map(str::to_string);
    assert_eq!(message.as_deref(), Some("publish 3 files"));

    Ok(())
}
