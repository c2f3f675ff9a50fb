// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Site content management.
//!
//! All items of a site live as markdown files under `data/topics`. Posts are
//! stored as `<slug>.md`, and pages as `_<slug>.md`. Creating a post also
//! indexes it in the site registry, see [`registry`](crate::registry). Pages
//! are never indexed.

use crate::{
    error::{io, FileError, FormatError, Result},
    registry::{self, ItemKind, Registry, RegistryEntry},
};

use std::{
    fs::{read_dir, OpenOptions},
    io::{ErrorKind as IoErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Validated item name.
///
/// # Invariant
///
/// - Never empty.
/// - Pure ASCII.
/// - No space characters.
/// - No path separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slug(String);

impl Slug {
    /// Validate raw item name.
    ///
    /// # Errors
    ///
    /// - Return [`FormatError::EmptySlug`] if name is empty.
    /// - Return [`FormatError::NonAsciiSlug`] if name is not pure ASCII.
    /// - Return [`FormatError::SlugHasSpace`] if name contains a space.
    /// - Return [`FormatError::SlugHasSeparator`] if name contains `/` or `\`.
    pub fn parse(raw: impl Into<String>) -> Result<Self, FormatError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(FormatError::EmptySlug);
        }

        if !raw.is_ascii() {
            return Err(FormatError::NonAsciiSlug { slug: raw });
        }

        if raw.contains(' ') {
            return Err(FormatError::SlugHasSpace { slug: raw });
        }

        // INVARIANT: Item files never leave the topics directory.
        if raw.contains(['/', '\\']) {
            return Err(FormatError::SlugHasSeparator { slug: raw });
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Validated request for a new item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub kind: ItemKind,
    pub slug: Slug,
    pub title: String,
}

impl NewItem {
    /// Validate raw item request.
    ///
    /// Validation is done in full before anything touches the filesystem.
    ///
    /// # Errors
    ///
    /// - Return [`FormatError`] if item kind or slug is invalid.
    /// - Return [`FormatError::UnencodableTitle`] if title holds a line break,
    ///   or the registry link separator, since it could not be decoded back
    ///   from the registry.
    pub fn parse(kind: &str, slug: &str, title: impl Into<String>) -> Result<Self, FormatError> {
        let kind = kind.parse::<ItemKind>()?;
        let slug = Slug::parse(slug)?;
        let title = title.into();
        if title.contains(['\n', '\r']) || title.contains(registry::LINK_SEPARATOR) {
            return Err(FormatError::UnencodableTitle { title });
        }

        Ok(Self { kind, slug, title })
    }

    /// File name of item relative to topics directory.
    pub fn file_name(&self) -> String {
        self.kind.file_name(self.slug.as_str())
    }
}

/// What happened to the registry when an item got created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryUpdate {
    /// Post was indexed.
    Appended,

    /// Page was intentionally left out of the registry.
    Skipped,
}

/// Newly created item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub path: PathBuf,
    pub kind: ItemKind,
    pub registry: RegistryUpdate,
}

/// Existing item found in topics directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedItem {
    pub path: PathBuf,

    /// Registry title, only ever set for indexed posts.
    pub title: Option<String>,
}

/// Listing of all items of a site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemListing {
    pub pages: Vec<ListedItem>,
    pub posts: Vec<ListedItem>,
}

/// Content store of a site.
#[derive(Debug, Clone)]
pub struct ContentStore {
    topics: PathBuf,
    registry: Registry,
}

impl ContentStore {
    /// Construct content store for site at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            topics: root.as_ref().join("data").join("topics"),
            registry: Registry::new(root),
        }
    }

    /// Path to topics directory.
    pub fn topics_dir(&self) -> &Path {
        self.topics.as_path()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Create new item from raw input.
    ///
    /// Validates input through [`NewItem::parse`], then hands it to
    /// [`ContentStore::create`].
    ///
    /// # Errors
    ///
    /// - Return [`FormatError`] if input is invalid.
    /// - Return [`FileError`] if item cannot be created, or indexed.
    pub fn create_item(&self, kind: &str, slug: &str, title: &str) -> Result<Created> {
        let item = NewItem::parse(kind, slug, title)?;
        self.create(&item)
    }

    /// Create new item.
    ///
    /// Writes `# <title>` to the item file. Posts are appended to the registry
    /// afterwards. If the registry append fails, the item file stays on disk.
    ///
    /// # Errors
    ///
    /// - Return [`FileError::AlreadyExists`] if the item file already exists.
    /// - Return [`FileError::Missing`] if the topics directory, or the
    ///   registry, is absent.
    /// - Return [`FileError::Io`] for any other write failure.
    #[instrument(skip(self, item), level = "debug")]
    pub fn create(&self, item: &NewItem) -> Result<Created> {
        let path = self.topics.join(item.file_name());

        // INVARIANT: Never overwrite existing items.
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| match err.kind() {
                IoErrorKind::AlreadyExists => FileError::AlreadyExists {
                    path: path.clone(),
                }
                .into(),
                IoErrorKind::NotFound => FileError::Missing {
                    path: self.topics.clone(),
                }
                .into(),
                _ => io(&path)(err),
            })?;
        file.write_all(format!("# {}", item.title).as_bytes())
            .map_err(io(&path))?;
        info!("created {} at {:?}", item.kind, path.display());

        let registry = match item.kind {
            ItemKind::Post => {
                let entry = RegistryEntry::new(item.kind, item.slug.as_str(), item.title.as_str());
                self.registry.append(&entry)?;
                RegistryUpdate::Appended
            }
            ItemKind::Page => RegistryUpdate::Skipped,
        };

        Ok(Created {
            path,
            kind: item.kind,
            registry,
        })
    }

    /// List pages and posts of the site.
    ///
    /// Posts get their title from the registry when indexed. Both listings are
    /// sorted by path.
    ///
    /// # Errors
    ///
    /// - Return [`FileError::Missing`] if the topics directory, or the
    ///   registry, is absent.
    /// - Return [`FormatError`] if the registry holds a malformed entry.
    #[instrument(skip(self), level = "debug")]
    pub fn items(&self) -> Result<ItemListing> {
        let contents = self.registry.read()?;
        let mut titles = Vec::new();
        for entry in registry::list(&contents) {
            let entry = entry?;
            titles.push((entry.file_name(), entry.title));
        }

        let entries = read_dir(&self.topics).map_err(|err| match err.kind() {
            IoErrorKind::NotFound => FileError::Missing {
                path: self.topics.clone(),
            }
            .into(),
            _ => io(&self.topics)(err),
        })?;

        let mut listing = ItemListing::default();
        for entry in entries {
            let entry = entry.map_err(io(&self.topics))?;
            if !entry.path().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('_') {
                listing.pages.push(ListedItem {
                    path: entry.path(),
                    title: None,
                });
            } else {
                let title = titles
                    .iter()
                    .find(|(file_name, _)| *file_name == name)
                    .map(|(_, title)| title.clone());
                listing.posts.push(ListedItem {
                    path: entry.path(),
                    title,
                });
            }
        }

        listing.pages.sort_by(|a, b| a.path.cmp(&b.path));
        listing.posts.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(listing)
    }
}
