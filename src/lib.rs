// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Manage tibl sites.
//!
//! A tibl site is a static blog whose posts are markdown files rendered in the
//! browser. This crate scaffolds new sites from a template repository, creates
//! posts and pages while keeping the post registry in sync, serves a site
//! locally, and synchronizes site content with a single remote repository.
//!
//! # Site Layout
//!
//! ```text
//! <site>/
//! ├── data/
//! │   ├── database.md     registry of posts
//! │   └── topics/
//! │       ├── hello.md    post
//! │       └── _about.md   page
//! ├── index.html
//! └── t.html
//! ```
//!
//! # See Also
//!
//! 1. [`registry`]
//! 2. [`content`]
//! 3. [`site`]
//! 4. [`sync`]

pub mod auth;
pub mod config;
pub mod content;
pub mod error;
pub mod path;
pub mod registry;
pub mod serve;
pub mod site;
pub mod sync;

pub use config::Settings;
pub use error::{Error, ErrorKind, Result};
pub use site::{RemoteBinding, Site};
