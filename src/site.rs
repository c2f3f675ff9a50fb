// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Site lifecycle.
//!
//! A __site__ is a directory holding a `data/topics` directory of markdown
//! items, and a `data/database.md` registry of posts. Sites are created by
//! cloning a template repository. The clone is then stripped of its Git
//! directory, so the new site starts out without the template's history and
//! never tracks the template as a fork.
//!
//! A site may later be linked to a single remote repository of the user's
//! choosing. The remote always goes by the name set in
//! [`RemoteSettings`](crate::config::RemoteSettings), "tibl" by default. Once
//! linked, content can be synchronized through [`SyncFacade`].

use crate::{
    auth::Credentials,
    config::Settings,
    content::ContentStore,
    error::{git, io, FileError, RemoteError, Result},
    sync::SyncFacade,
};

use git2::{build::RepoBuilder, ErrorCode, FetchOptions, Repository, RepositoryInitOptions};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fs::remove_dir_all,
    path::{Path, PathBuf},
    time,
};
use tracing::{debug, info, instrument};

/// Remote repository a site is linked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBinding {
    pub name: String,
    pub url: String,
}

/// A tibl site.
#[derive(Debug, Clone)]
pub struct Site {
    root: PathBuf,
    remote: Option<RemoteBinding>,
    settings: Settings,
}

impl Site {
    /// Create new site by cloning the template repository.
    ///
    /// Clone progress is displayed through the progress bar. If credentials
    /// are needed, the user is prompted with the progress bar suspended.
    ///
    /// # Errors
    ///
    /// - Return [`FileError::AlreadyExists`] if `path` already exists.
    /// - Return [`RemoteError::Clone`] if the template cannot be cloned.
    /// - Return [`FileError::Io`] if the template history cannot be removed.
    #[instrument(skip(path, settings, bar), level = "debug")]
    pub fn create(path: impl AsRef<Path>, settings: &Settings, bar: ProgressBar) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(FileError::AlreadyExists {
                path: path.to_path_buf(),
            }
            .into());
        }

        let url = settings.site.template.as_str();
        info!("clone template {url} into {:?}", path.display());
        let clone_error = |source: git2::Error| RemoteError::Clone {
            source,
            url: url.to_string(),
        };

        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_message(url.to_string());
        bar.enable_steady_tick(time::Duration::from_millis(100));

        let credentials = Credentials::new(bar).map_err(clone_error)?;
        let mut throttle = time::Instant::now();
        let mut rc = credentials.callbacks();
        rc.transfer_progress(|progress| {
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                credentials.bar().set_length(progress.total_objects() as u64);
                credentials.bar().set_position(progress.received_objects() as u64);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        let repository = RepoBuilder::new()
            .fetch_options(fo)
            .clone(url, path)
            .map_err(clone_error)?;
        credentials.bar().finish_and_clear();

        // INVARIANT: New site never carries template history.
        let gitdir = repository.path().to_path_buf();
        drop(repository);
        debug!("remove template history at {:?}", gitdir.display());
        remove_dir_all(&gitdir).map_err(io(&gitdir))?;

        Ok(Self {
            root: path.to_path_buf(),
            remote: None,
            settings: settings.clone(),
        })
    }

    /// Open existing site at `root`.
    ///
    /// Discovers the remote binding of the site. The binding is only present
    /// if `root` is a Git repository with a remote of the configured name.
    ///
    /// # Errors
    ///
    /// - Return [`FileError::Missing`] if `root` does not exist.
    /// - Return [`RemoteError::Git`] if `root` is a broken Git repository.
    #[instrument(skip(root, settings), level = "debug")]
    pub fn open(root: impl AsRef<Path>, settings: &Settings) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(FileError::Missing {
                path: root.to_path_buf(),
            }
            .into());
        }

        let remote = discover_remote(root, &settings.remote.name)?;
        debug!("site {:?} remote binding: {remote:?}", root.display());

        Ok(Self {
            root: root.to_path_buf(),
            remote,
            settings: settings.clone(),
        })
    }

    /// Path to site root.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Remote binding, if the site is linked.
    pub fn remote(&self) -> Option<&RemoteBinding> {
        self.remote.as_ref()
    }

    /// Content store of the site.
    pub fn content(&self) -> ContentStore {
        ContentStore::new(&self.root)
    }

    /// Link site to remote repository at `url`.
    ///
    /// Initializes a Git repository at the site root if there is none yet,
    /// then adds the remote, or points the existing one at `url`.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Git`] if repository initialization, or remote
    ///   configuration fails.
    #[instrument(skip(self, url), level = "debug")]
    pub fn link_remote(&mut self, url: impl Into<String>) -> Result<&RemoteBinding> {
        let url = url.into();
        let name = self.settings.remote.name.clone();
        let repository = match Repository::open(&self.root) {
            Ok(repository) => repository,
            Err(err) if err.code() == ErrorCode::NotFound => {
                info!("initialize repository at {:?}", self.root.display());
                let mut opts = RepositoryInitOptions::new();
                opts.initial_head(&self.settings.remote.branch);
                Repository::init_opts(&self.root, &opts).map_err(git("init"))?
            }
            Err(err) => return Err(git("open")(err)),
        };

        match repository.find_remote(&name) {
            Ok(_) => {
                info!("point remote {name} at {url}");
                repository
                    .remote_set_url(&name, &url)
                    .map_err(git(format!("remote set-url {name} {url}")))?;
            }
            Err(err) if err.code() == ErrorCode::NotFound => {
                info!("add remote {name} at {url}");
                repository
                    .remote(&name, &url)
                    .map_err(git(format!("remote add {name} {url}")))?;
            }
            Err(err) => return Err(git(format!("remote get-url {name}"))(err)),
        }

        Ok(self.remote.insert(RemoteBinding { name, url }))
    }

    /// Synchronization facade of the site.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::NotLinked`] if the site has no remote binding.
    /// - Return [`RemoteError::Git`] if the repository cannot be opened.
    pub fn sync(&self, bar: ProgressBar) -> Result<SyncFacade> {
        if self.remote.is_none() {
            return Err(RemoteError::NotLinked {
                remote: self.settings.remote.name.clone(),
            }
            .into());
        }

        let repository = Repository::open(&self.root).map_err(git("open"))?;
        Ok(SyncFacade::new(repository, &self.settings, bar))
    }
}

fn discover_remote(root: &Path, name: &str) -> Result<Option<RemoteBinding>> {
    let repository = match Repository::open(root) {
        Ok(repository) => repository,
        Err(err) if err.code() == ErrorCode::NotFound => return Ok(None),
        Err(err) => return Err(git("open")(err)),
    };

    let binding = match repository.find_remote(name) {
        Ok(remote) => remote.url().map(|url| RemoteBinding {
            name: name.to_string(),
            url: url.to_string(),
        }),
        Err(err) if err.code() == ErrorCode::NotFound => None,
        Err(err) => return Err(git(format!("remote get-url {name}"))(err)),
    };

    Ok(binding)
}
