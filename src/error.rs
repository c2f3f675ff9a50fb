// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Error kinds for site operations.
//!
//! Every failure that a site operation can report falls into exactly one of
//! three kinds:
//!
//! - __Format__: the caller supplied input of the wrong shape, or the registry
//!   holds a line that cannot be decoded. Nothing was written.
//! - __File__: a filesystem precondition did not hold, e.g., the target item
//!   already exists, or the registry is missing.
//! - __Remote__: the version control collaborator failed, or refused to act on
//!   the current state of the work tree.
//!
//! Each kind carries a structured payload so callers can branch on it without
//! picking apart a message string. Only the command line surface turns these
//! into human-readable text and exit codes.

use std::path::PathBuf;

/// Invalid input shape.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// Item kind is neither "post" nor "page".
    #[error("invalid item type {kind:?}, expected \"post\" or \"page\"")]
    UnknownKind { kind: String },

    /// Slug is empty.
    #[error("item name cannot be empty")]
    EmptySlug,

    /// Slug contains non-ASCII characters.
    #[error("invalid characters in item name {slug:?}, please use only ascii")]
    NonAsciiSlug { slug: String },

    /// Slug contains a space.
    #[error("item name {slug:?} contains spaces")]
    SlugHasSpace { slug: String },

    /// Slug contains a path separator.
    #[error("item name {slug:?} contains a path separator")]
    SlugHasSeparator { slug: String },

    /// Title cannot be written as a single registry line.
    #[error("item title {title:?} cannot contain line breaks or \"](t.html?\"")]
    UnencodableTitle { title: String },

    /// Registry line has the entry marker, but not the entry layout.
    #[error("malformed registry entry at line {line_number}: {line:?}")]
    MalformedEntry { line_number: usize, line: String },

    /// Registry line uses a type code other than "t" or "p".
    #[error("unknown type code {code:?} in registry entry at line {line_number}: {line:?}")]
    UnknownTypeCode {
        line_number: usize,
        line: String,
        code: String,
    },
}

/// Filesystem precondition violation.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// Target path is already taken.
    #[error("{:?} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    /// Required file or directory is absent.
    #[error("{:?} does not exist, ensure that you are in your site's directory", path.display())]
    Missing { path: PathBuf },

    /// Any other I/O failure on a path.
    #[error("failed to access {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Version control failure.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Template repository could not be cloned.
    #[error("failed to clone {url}")]
    Clone {
        #[source]
        source: git2::Error,
        url: String,
    },

    /// A libgit2 operation failed.
    #[error("git {context} failed: {}", source.message())]
    Git {
        #[source]
        source: git2::Error,
        context: String,
    },

    /// Site has no remote with the configured name.
    #[error("site is not linked to remote {remote:?}, run `tibl link` first")]
    NotLinked { remote: String },

    /// Tracked files carry uncommitted modifications.
    #[error(
        "refusing to pull with uncommitted modifications, push or revert them first: {}",
        paths.iter().map(|path| path.display().to_string()).collect::<Vec<_>>().join(", ")
    )]
    Dirty { paths: Vec<PathBuf> },

    /// Local and remote history cannot be fast-forwarded.
    #[error("local history diverged from {remote}/{branch}, cannot fast-forward")]
    Diverged { remote: String, branch: String },

    /// Remote does not carry the expected branch.
    #[error("remote {remote:?} has no branch {branch:?}")]
    MissingBranch { remote: String, branch: String },

    /// Remote rejected a reference update on push.
    #[error("remote rejected {refname}: {message}")]
    Rejected { refname: String, message: String },
}

/// Kind of a site operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    File,
    Remote,
}

/// Failure of a site operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl Error {
    /// Kind of failure, for callers that only care about the category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) => ErrorKind::Format,
            Self::File(_) => ErrorKind::File,
            Self::Remote(_) => ErrorKind::Remote,
        }
    }
}

/// Attach command context to a failed libgit2 call.
///
/// Meant for `map_err`, e.g., `remote.fetch(..).map_err(git("fetch tibl"))?`.
pub(crate) fn git(context: impl Into<String>) -> impl FnOnce(git2::Error) -> Error {
    let context = context.into();
    move |source| RemoteError::Git { source, context }.into()
}

/// Attach a path to a failed I/O call.
pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
    let path = path.into();
    move |source| FileError::Io { source, path }.into()
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_kind_follows_variant() {
        let format: Error = FormatError::EmptySlug.into();
        let file: Error = FileError::Missing {
            path: "data/database.md".into(),
        }
        .into();
        let remote: Error = RemoteError::NotLinked {
            remote: "tibl".into(),
        }
        .into();

        assert_eq!(format.kind(), ErrorKind::Format);
        assert_eq!(file.kind(), ErrorKind::File);
        assert_eq!(remote.kind(), ErrorKind::Remote);
    }

    #[test]
    fn git_context_is_kept() {
        let error = git("fetch tibl")(git2::Error::from_str("connection refused"));
        let message = error.to_string();
        assert_eq!(message, "git fetch tibl failed: connection refused");
    }

    #[test]
    fn unknown_type_code_names_line() {
        let error = FormatError::UnknownTypeCode {
            line_number: 3,
            line: "* [X](t.html?z=y)".into(),
            code: "z".into(),
        };
        assert!(error.to_string().contains("* [X](t.html?z=y)"));
        assert!(error.to_string().contains("line 3"));
    }
}
