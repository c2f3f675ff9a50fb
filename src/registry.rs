// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Post registry codec.
//!
//! Every site keeps a flat index of its posts at `data/database.md`. The site
//! template renders this file as the post listing, so it is plain markdown
//! where each indexed item takes up exactly one line:
//!
//! ```text
//! * [<title>](t.html?<type-code>=<slug>)
//! ```
//!
//! The type code is "t" for posts, and "p" for pages. Any line that does not
//! carry the `* [` marker is free-form prose, and is skipped by the decoder.
//! There is no escaping or quoting, so titles containing `](t.html?`, or line
//! breaks, cannot be represented.
//!
//! # Append-Only
//!
//! Entries are only ever appended in creation order. The registry is never
//! rewritten or reordered by tibl.

use crate::error::{io, FileError, FormatError, Result};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, File, OpenOptions},
    io::{ErrorKind as IoErrorKind, Read, Seek, SeekFrom, Write},
    iter::{Enumerate, FusedIterator},
    path::{Path, PathBuf},
    str::{FromStr, Lines},
};
use tracing::{debug, instrument};

const ENTRY_MARKER: &str = "* [";
pub(crate) const LINK_SEPARATOR: &str = "](t.html?";

/// Kind of item a site can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Post,
    Page,
}

impl ItemKind {
    /// Type code used in registry links.
    pub fn code(self) -> &'static str {
        match self {
            Self::Post => "t",
            Self::Page => "p",
        }
    }

    /// File name of an item of this kind with given slug.
    ///
    /// Pages are prefixed with an underscore to tell them apart from posts.
    pub fn file_name(self, slug: &str) -> String {
        match self {
            Self::Post => format!("{slug}.md"),
            Self::Page => format!("_{slug}.md"),
        }
    }
}

impl FromStr for ItemKind {
    type Err = FormatError;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        match kind {
            "post" => Ok(Self::Post),
            "page" => Ok(Self::Page),
            _ => Err(FormatError::UnknownKind { kind: kind.into() }),
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Post => fmt.write_str("post"),
            Self::Page => fmt.write_str("page"),
        }
    }
}

/// Decoded registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub kind: ItemKind,
    pub slug: String,
    pub title: String,
}

impl RegistryEntry {
    /// Construct new registry entry.
    pub fn new(kind: ItemKind, slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind,
            slug: slug.into(),
            title: title.into(),
        }
    }

    /// File name of the item this entry points to, relative to `data/topics`.
    pub fn file_name(&self) -> String {
        self.kind.file_name(&self.slug)
    }
}

/// Encode entry into a registry line, trailing newline included.
pub fn encode(entry: &RegistryEntry) -> String {
    format!(
        "{ENTRY_MARKER}{}{LINK_SEPARATOR}{}={})\n",
        entry.title,
        entry.kind.code(),
        entry.slug
    )
}

/// Result of decoding a single registry line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Line is an entry.
    Entry(RegistryEntry),

    /// Line is prose.
    Skip,
}

/// Decode a single registry line.
///
/// The line number is only used to make errors attributable, and should be
/// 1-based.
///
/// # Errors
///
/// - Return [`FormatError::MalformedEntry`] if the line carries the entry
///   marker without the link layout.
/// - Return [`FormatError::UnknownTypeCode`] if the type code is not "t" or "p".
pub fn decode(line_number: usize, line: &str) -> Result<Decoded, FormatError> {
    let Some(start) = line.find(ENTRY_MARKER) else {
        return Ok(Decoded::Skip);
    };

    let malformed = || FormatError::MalformedEntry {
        line_number,
        line: line.to_string(),
    };

    let body = line[start + ENTRY_MARKER.len()..].trim_end_matches(['\n', '\r']);
    let body = body.strip_suffix(')').unwrap_or(body);
    let (title, link) = body.split_once(LINK_SEPARATOR).ok_or_else(malformed)?;
    let (code, slug) = link.split_once('=').ok_or_else(malformed)?;
    if slug.is_empty() {
        return Err(malformed());
    }

    let kind = match code {
        "t" => ItemKind::Post,
        "p" => ItemKind::Page,
        _ => {
            return Err(FormatError::UnknownTypeCode {
                line_number,
                line: line.to_string(),
                code: code.to_string(),
            })
        }
    };

    Ok(Decoded::Entry(RegistryEntry::new(kind, slug, title)))
}

/// List all entries of registry contents.
///
/// The returned iterator is lazy, and can be recreated from the same contents
/// any number of times. It stops right after yielding the first format error.
pub fn list(contents: &str) -> Entries<'_> {
    Entries {
        lines: contents.lines().enumerate(),
        failed: false,
    }
}

/// Iterator over decoded registry entries.
///
/// See [`list`].
#[derive(Debug, Clone)]
pub struct Entries<'a> {
    lines: Enumerate<Lines<'a>>,
    failed: bool,
}

impl Iterator for Entries<'_> {
    type Item = Result<RegistryEntry, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        for (index, line) in self.lines.by_ref() {
            match decode(index + 1, line) {
                Ok(Decoded::Entry(entry)) => return Some(Ok(entry)),
                Ok(Decoded::Skip) => continue,
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            }
        }

        None
    }
}

impl FusedIterator for Entries<'_> {}

/// Registry file of a site.
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
}

impl Registry {
    /// Construct registry handle for site at `root`.
    ///
    /// Does not check if the registry file exists.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join("data").join("database.md"),
        }
    }

    /// Path to registry file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Read full registry contents.
    ///
    /// # Errors
    ///
    /// - Return [`FileError::Missing`] if the registry file does not exist.
    /// - Return [`FileError::Io`] if the registry file cannot be read.
    pub fn read(&self) -> Result<String> {
        read_to_string(&self.path).map_err(|err| match err.kind() {
            IoErrorKind::NotFound => FileError::Missing {
                path: self.path.clone(),
            }
            .into(),
            _ => io(&self.path)(err),
        })
    }

    /// Append entry to the end of the registry.
    ///
    /// Never creates the registry file.
    ///
    /// # Errors
    ///
    /// - Return [`FileError::Missing`] naming the registry file, or its parent
    ///   directory, whichever is absent.
    /// - Return [`FileError::Io`] if the registry cannot be written to.
    #[instrument(skip(self, entry), level = "debug")]
    pub fn append(&self, entry: &RegistryEntry) -> Result<()> {
        let line = encode(entry);
        debug!("append {:?} to {:?}", line.trim_end(), self.path.display());

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| match err.kind() {
                IoErrorKind::NotFound => FileError::Missing {
                    path: self.missing_path(),
                }
                .into(),
                _ => io(&self.path)(err),
            })?;

        // INVARIANT: Every entry starts on a line of its own.
        let line = if ends_mid_line(&mut file).map_err(io(&self.path))? {
            format!("\n{line}")
        } else {
            line
        };
        file.write_all(line.as_bytes()).map_err(io(&self.path))?;

        Ok(())
    }

    fn missing_path(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.is_dir() => parent.to_path_buf(),
            _ => self.path.clone(),
        }
    }
}

/// Check if file has content whose last byte is not a line feed.
fn ends_mid_line(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }

    let mut last = [0; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;

    Ok(last[0] != b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    #[test]
    fn decode_posts_and_pages() -> anyhow::Result<()> {
        let contents = "* [Hello](t.html?t=hello)\n* [About](t.html?p=about)\n";
        let result = list(contents).collect::<Result<Vec<_>, _>>()?;
        let expect = vec![
            RegistryEntry::new(ItemKind::Post, "hello", "Hello"),
            RegistryEntry::new(ItemKind::Page, "about", "About"),
        ];
        assert_eq!(result, expect);
        assert_eq!(result[0].file_name(), "hello.md");
        assert_eq!(result[1].file_name(), "_about.md");

        Ok(())
    }

    #[test]
    fn decode_skips_prose() -> anyhow::Result<()> {
        let contents = indoc! {r#"
            # Posts

            Some words about this blog.
            * [First post](t.html?t=first)

            - not an entry either
            * [Second post](t.html?t=second)
        "#};
        let result = list(contents)
            .map(|entry| entry.map(|entry| entry.slug))
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(result, vec!["first".to_string(), "second".to_string()]);

        Ok(())
    }

    #[test]
    fn decode_unknown_type_code() {
        let result = decode(1, "* [X](t.html?z=y)\n");
        let expect = Err(FormatError::UnknownTypeCode {
            line_number: 1,
            line: "* [X](t.html?z=y)\n".into(),
            code: "z".into(),
        });
        assert_eq!(result, expect);
    }

    #[test_case("* [No link here]"; "missing link")]
    #[test_case("* [Title](t.html?hello)"; "missing type code")]
    #[test_case("* [Title](t.html?t=)"; "empty slug")]
    #[test]
    fn decode_malformed_entry(line: &str) {
        let result = decode(7, line);
        let expect = Err(FormatError::MalformedEntry {
            line_number: 7,
            line: line.into(),
        });
        pretty_assertions::assert_eq!(result, expect);
    }

    #[test]
    fn list_stops_at_first_error() {
        let contents = indoc! {r#"
            * [One](t.html?t=one)
            * [Bad](t.html?x=bad)
            * [Two](t.html?t=two)
        "#};
        let mut entries = list(contents);
        assert_eq!(
            entries.next(),
            Some(Ok(RegistryEntry::new(ItemKind::Post, "one", "One")))
        );
        assert!(matches!(
            entries.next(),
            Some(Err(FormatError::UnknownTypeCode { line_number: 2, .. }))
        ));
        assert_eq!(entries.next(), None);

        // Restartable from the same contents.
        assert_eq!(list(contents).count(), 2);
    }

    #[test_case(ItemKind::Post, "hello-world", "Hello, world!"; "post")]
    #[test_case(ItemKind::Page, "about", "About me"; "page")]
    #[test]
    fn encode_then_decode(kind: ItemKind, slug: &str, title: &str) -> anyhow::Result<()> {
        let entry = RegistryEntry::new(kind, slug, title);
        let line = encode(&entry);
        assert!(line.ends_with(")\n"));
        pretty_assertions::assert_eq!(decode(1, &line)?, Decoded::Entry(entry));

        Ok(())
    }

    #[test]
    fn encode_post_layout() {
        let result = encode(&RegistryEntry::new(ItemKind::Post, "hello", "Hi"));
        assert_eq!(result, "* [Hi](t.html?t=hello)\n");
    }

    #[test_case("post", Ok(ItemKind::Post); "post")]
    #[test_case("page", Ok(ItemKind::Page); "page")]
    #[test_case("Post", Err(FormatError::UnknownKind { kind: "Post".into() }); "case sensitive")]
    #[test_case("draft", Err(FormatError::UnknownKind { kind: "draft".into() }); "unknown")]
    #[test]
    fn parse_item_kind(input: &str, expect: Result<ItemKind, FormatError>) {
        pretty_assertions::assert_eq!(input.parse::<ItemKind>(), expect);
    }

    #[sealed_test]
    fn append_after_missing_trailing_newline() -> anyhow::Result<()> {
        std::fs::create_dir("data")?;
        std::fs::write("data/database.md", "* [A](t.html?t=a)")?;

        let registry = Registry::new(".");
        registry.append(&RegistryEntry::new(ItemKind::Post, "b", "B"))?;
        let contents = registry.read()?;
        assert_eq!(contents, "* [A](t.html?t=a)\n* [B](t.html?t=b)\n");

        let result = list(&contents).collect::<Result<Vec<_>, _>>()?;
        let expect = vec![
            RegistryEntry::new(ItemKind::Post, "a", "A"),
            RegistryEntry::new(ItemKind::Post, "b", "B"),
        ];
        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test]
    fn append_to_empty_registry() -> anyhow::Result<()> {
        std::fs::create_dir("data")?;
        std::fs::write("data/database.md", "")?;

        let registry = Registry::new(".");
        registry.append(&RegistryEntry::new(ItemKind::Post, "a", "A"))?;
        assert_eq!(registry.read()?, "* [A](t.html?t=a)\n");

        Ok(())
    }

    #[sealed_test]
    fn append_names_missing_data_directory() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        let result = Registry::new(&root).append(&RegistryEntry::new(ItemKind::Post, "a", "A"));
        assert!(matches!(
            result,
            Err(Error::File(FileError::Missing { ref path })) if *path == root.join("data")
        ));
        assert!(!root.join("data").exists());

        Ok(())
    }

    #[sealed_test]
    fn append_names_missing_registry_file() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        std::fs::create_dir(root.join("data"))?;
        let result = Registry::new(&root).append(&RegistryEntry::new(ItemKind::Post, "a", "A"));
        assert!(matches!(
            result,
            Err(Error::File(FileError::Missing { ref path })) if *path == root.join("data/database.md")
        ));
        assert!(!root.join("data/database.md").exists());

        Ok(())
    }

    #[sealed_test]
    fn read_missing_registry() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        let result = Registry::new(&root).read();
        assert!(matches!(
            result,
            Err(Error::File(FileError::Missing { ref path })) if *path == root.join("data/database.md")
        ));

        Ok(())
    }
}
