// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Content synchronization with a linked remote.
//!
//! Synchronization follows a fast-forward only discipline. Pulling never
//! merges diverged history, and is refused outright while tracked files carry
//! uncommitted modifications. Thus, tibl never has to resolve a conflict on
//! the user's behalf. Pushing stages and commits everything that changed in
//! one go, and sends it to the remote's main branch.
//!
//! # Work Tree States
//!
//! - __clean__: pull, push, and status are all allowed. Push does nothing.
//! - __dirty__: push and status are allowed. Pull is refused.
//!
//! There is no state kept outside of the repository itself.

use crate::{
    auth::Credentials,
    config::{Settings, SyncSettings},
    error::{git, RemoteError, Result},
};

use git2::{
    build::CheckoutBuilder, ErrorCode, FetchOptions, IndexAddOption, Oid, PushOptions, Repository,
    Status, StatusOptions,
};
use indicatif::ProgressBar;
use std::{
    cell::RefCell,
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::{debug, info, instrument, warn};

/// Kind of change to a path in the work tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
    Renamed,
    TypeChange,
    Untracked,
    Conflicted,
}

impl ChangeKind {
    fn from_status(status: Status) -> Option<Self> {
        if status.is_conflicted() {
            Some(Self::Conflicted)
        } else if status.is_wt_new() && !status.is_index_new() {
            Some(Self::Untracked)
        } else if status.is_index_new() {
            Some(Self::Added)
        } else if status.is_index_deleted() || status.is_wt_deleted() {
            Some(Self::Removed)
        } else if status.is_index_renamed() || status.is_wt_renamed() {
            Some(Self::Renamed)
        } else if status.is_index_typechange() || status.is_wt_typechange() {
            Some(Self::TypeChange)
        } else if status.is_index_modified() || status.is_wt_modified() {
            Some(Self::Modified)
        } else {
            None
        }
    }
}

impl Display for ChangeKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
            Self::Renamed => "renamed",
            Self::TypeChange => "typechange",
            Self::Untracked => "untracked",
            Self::Conflicted => "conflicted",
        };
        fmt.write_str(label)
    }
}

/// Single change in the work tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl Display for Change {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{:<11} {}", format!("{}:", self.kind), self.path.display())
    }
}

/// Outcome of a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Local branch already contains remote history.
    UpToDate,

    /// Local branch moved forward to remote history.
    FastForwarded { from: Option<Oid>, to: Oid },
}

/// What a push should stage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PushScope {
    /// Every change in the work tree.
    #[default]
    All,

    /// Only changes below `data/`.
    DataOnly,
}

impl PushScope {
    fn pathspec(self) -> &'static str {
        match self {
            Self::All => "*",
            Self::DataOnly => "data",
        }
    }
}

/// Outcome of a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Work tree was clean, nothing was committed or pushed.
    NothingToPush,

    /// Changes were committed and pushed.
    Pushed { commit: Oid, changes: usize },
}

/// Push, pull, and status against the linked remote of a site.
pub struct SyncFacade {
    repository: Repository,
    remote: String,
    branch: String,
    sync: SyncSettings,
    bar: ProgressBar,
}

impl SyncFacade {
    /// Construct new synchronization facade.
    ///
    /// Remote name, branch, and commit message come from settings. The
    /// progress bar is only touched to suspend it for credential prompts.
    pub fn new(repository: Repository, settings: &Settings, bar: ProgressBar) -> Self {
        Self {
            repository,
            remote: settings.remote.name.clone(),
            branch: settings.remote.branch.clone(),
            sync: settings.sync.clone(),
            bar,
        }
    }

    fn branch_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    fn tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote, self.branch)
    }

    /// List changes in the work tree.
    ///
    /// Ignored files are left out.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Git`] if status cannot be determined.
    pub fn status(&self) -> Result<Vec<Change>> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .exclude_submodules(true);

        let statuses = self
            .repository
            .statuses(Some(&mut opts))
            .map_err(git("status"))?;

        let mut changes = Vec::new();
        for entry in statuses.iter() {
            let Some(kind) = ChangeKind::from_status(entry.status()) else {
                continue;
            };
            let path = PathBuf::from(String::from_utf8_lossy(entry.path_bytes()).into_owned());
            changes.push(Change { kind, path });
        }

        Ok(changes)
    }

    /// Pull remote history by fast-forward only.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Dirty`] if tracked files carry uncommitted
    ///   modifications. Nothing is fetched in that case.
    /// - Return [`RemoteError::MissingBranch`] if remote lacks the branch.
    /// - Return [`RemoteError::Diverged`] if history cannot be fast-forwarded.
    /// - Return [`RemoteError::Git`] if any libgit2 operation fails.
    #[instrument(skip(self), level = "debug")]
    pub fn pull(&self) -> Result<PullOutcome> {
        let dirty = self
            .status()?
            .into_iter()
            .filter(|change| change.kind != ChangeKind::Untracked)
            .map(|change| change.path)
            .collect::<Vec<_>>();
        if !dirty.is_empty() {
            return Err(RemoteError::Dirty { paths: dirty }.into());
        }

        self.fetch()?;
        self.switch_to_branch()?;
        self.fast_forward()
    }

    /// Commit all changes and push them to the remote.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Rejected`] if remote refuses the update.
    /// - Return [`RemoteError::Git`] if any libgit2 operation fails.
    #[instrument(skip(self), level = "debug")]
    pub fn push(&self, scope: PushScope) -> Result<PushOutcome> {
        if self.status()?.is_empty() {
            info!("work tree is clean");
            return Ok(PushOutcome::NothingToPush);
        }

        let Some((commit, changes)) = self.commit_changes(scope)? else {
            info!("no changes within {:?}", scope.pathspec());
            return Ok(PushOutcome::NothingToPush);
        };

        let head = self.repository.head().map_err(git("rev-parse HEAD"))?;
        let source = head.name().unwrap_or("HEAD").to_string();
        let refspec = format!("{source}:{}", self.branch_ref());
        self.push_refspec(&refspec)?;

        Ok(PushOutcome::Pushed { commit, changes })
    }

    fn fetch(&self) -> Result<()> {
        let context = format!("fetch {}", self.remote);
        info!("{context}");
        let mut remote = self
            .repository
            .find_remote(&self.remote)
            .map_err(git(context.as_str()))?;

        let credentials = Credentials::new(self.bar.clone()).map_err(git(context.as_str()))?;
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(credentials.callbacks());

        let refspec = format!("+{}:{}", self.branch_ref(), self.tracking_ref());
        remote
            .fetch(&[refspec.as_str()], Some(&mut fo), None)
            .map_err(git(context))?;

        Ok(())
    }

    fn switch_to_branch(&self) -> Result<()> {
        let target = self.branch_ref();
        let context = format!("switch {}", self.branch);
        let head = match self.repository.head() {
            Ok(head) if head.name() == Some(target.as_str()) => return Ok(()),
            Ok(head) => head,
            Err(err) if err.code() == ErrorCode::UnbornBranch => {
                debug!("point unborn HEAD at {target}");
                return self.repository.set_head(&target).map_err(git(context));
            }
            Err(err) => return Err(git(context)(err)),
        };

        match self.repository.find_reference(&target) {
            Ok(reference) => {
                let commit = reference.peel_to_commit().map_err(git(context.as_str()))?;
                self.repository
                    .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))
                    .map_err(git(context.as_str()))?;
            }
            Err(err) if err.code() == ErrorCode::NotFound => {
                let commit = head.peel_to_commit().map_err(git(context.as_str()))?;
                self.repository
                    .branch(&self.branch, &commit, false)
                    .map_err(git(context.as_str()))?;
            }
            Err(err) => return Err(git(context)(err)),
        }

        self.repository.set_head(&target).map_err(git(context))
    }

    fn fast_forward(&self) -> Result<PullOutcome> {
        let tracking = self.tracking_ref();
        let context = format!("merge --ff-only {}/{}", self.remote, self.branch);
        let reference = match self.repository.find_reference(&tracking) {
            Ok(reference) => reference,
            Err(err) if err.code() == ErrorCode::NotFound => {
                return Err(RemoteError::MissingBranch {
                    remote: self.remote.clone(),
                    branch: self.branch.clone(),
                }
                .into());
            }
            Err(err) => return Err(git(context)(err)),
        };

        let incoming = self
            .repository
            .reference_to_annotated_commit(&reference)
            .map_err(git(context.as_str()))?;
        let (analysis, _) = self
            .repository
            .merge_analysis(&[&incoming])
            .map_err(git(context.as_str()))?;

        if analysis.is_up_to_date() {
            info!("already up to date");
            return Ok(PullOutcome::UpToDate);
        }

        if !analysis.is_fast_forward() && !analysis.is_unborn() {
            warn!("cannot fast-forward to {tracking}");
            return Err(RemoteError::Diverged {
                remote: self.remote.clone(),
                branch: self.branch.clone(),
            }
            .into());
        }

        let to = incoming.id();
        let commit = self
            .repository
            .find_commit(to)
            .map_err(git(context.as_str()))?;

        // INVARIANT: Update work tree before moving the branch, so a failed
        // checkout leaves the branch where it was.
        self.repository
            .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))
            .map_err(git(context.as_str()))?;

        let target = self.branch_ref();
        let message = format!("tibl: fast-forward to {to}");
        let from = match self.repository.find_reference(&target) {
            Ok(mut branch) => {
                let from = branch.target();
                branch
                    .set_target(to, &message)
                    .map_err(git(context.as_str()))?;
                from
            }
            Err(err) if err.code() == ErrorCode::NotFound => {
                self.repository
                    .reference(&target, to, false, &message)
                    .map_err(git(context.as_str()))?;
                None
            }
            Err(err) => return Err(git(context)(err)),
        };
        self.repository.set_head(&target).map_err(git(context))?;
        info!("fast-forward {from:?} to {to}");

        Ok(PullOutcome::FastForwarded { from, to })
    }

    fn commit_changes(&self, scope: PushScope) -> Result<Option<(Oid, usize)>> {
        let context = "commit";
        let pathspec = [scope.pathspec()];
        let mut index = self.repository.index().map_err(git(context))?;
        index
            .add_all(pathspec, IndexAddOption::DEFAULT, None)
            .map_err(git(context))?;
        index.update_all(pathspec, None).map_err(git(context))?;
        index.write().map_err(git(context))?;
        let tree_oid = index.write_tree().map_err(git(context))?;
        let tree = self.repository.find_tree(tree_oid).map_err(git(context))?;

        // INVARIANT: Always determine latest parent commit to append to.
        let parent = match self.repository.head() {
            Ok(head) => Some(head.peel_to_commit().map_err(git(context))?),
            Err(err) if err.code() == ErrorCode::UnbornBranch => None,
            Err(err) => return Err(git(context)(err)),
        };

        let changes = match &parent {
            Some(parent) => {
                let parent_tree = parent.tree().map_err(git(context))?;
                self.repository
                    .diff_tree_to_tree(Some(&parent_tree), Some(&tree), None)
                    .map_err(git(context))?
                    .deltas()
                    .len()
            }
            None => index.len(),
        };
        if changes == 0 {
            return Ok(None);
        }

        let signature = self.repository.signature().map_err(git(context))?;
        let parents = parent.iter().collect::<Vec<_>>();
        let message = self.sync.commit_message(changes);
        let commit = self
            .repository
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                &message,
                &tree,
                &parents,
            )
            .map_err(git(context))?;
        info!("commit {commit}: {message}");

        Ok(Some((commit, changes)))
    }

    fn push_refspec(&self, refspec: &str) -> Result<()> {
        let context = format!("push {} {refspec}", self.remote);
        info!("{context}");
        let mut remote = self
            .repository
            .find_remote(&self.remote)
            .map_err(git(context.as_str()))?;

        let credentials = Credentials::new(self.bar.clone()).map_err(git(context.as_str()))?;
        let rejected = RefCell::new(None);
        let mut rc = credentials.callbacks();
        rc.push_update_reference(|refname, status| {
            if let Some(message) = status {
                *rejected.borrow_mut() = Some(RemoteError::Rejected {
                    refname: refname.to_string(),
                    message: message.to_string(),
                });
            }
            Ok(())
        });

        let mut po = PushOptions::new();
        po.remote_callbacks(rc);
        remote
            .push(&[refspec], Some(&mut po))
            .map_err(git(context))?;
        drop(po);

        match rejected.into_inner() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}
