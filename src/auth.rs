// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Credential handling for remote operations.
//!
//! Cloning a template, fetching, and pushing may all require credentials.
//! These are resolved through [`auth_git2`], which tries the SSH agent, SSH
//! keys, and Git credential helpers first. Only when all of those fail is the
//! user prompted, with the progress spinner suspended so the prompt does not
//! get drawn over.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{Config, RemoteCallbacks};
use indicatif::ProgressBar;
use inquire::{Password, Text};
use std::path::Path;
use tracing::{info, instrument};

/// Credential source for libgit2 remote callbacks.
pub struct Credentials {
    authenticator: GitAuthenticator,
    config: Config,
    bar: ProgressBar,
}

impl Credentials {
    /// Construct new credential source reporting to progress bar.
    ///
    /// # Errors
    ///
    /// - Return [`git2::Error`] if the default Git configuration cannot be
    ///   opened.
    pub fn new(bar: ProgressBar) -> Result<Self, git2::Error> {
        let prompter = IndicatifPrompter::new(bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter);
        let config = Config::open_default()?;

        Ok(Self {
            authenticator,
            config,
            bar,
        })
    }

    /// Progress bar used for reporting.
    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    /// Remote callbacks that resolve credentials.
    pub fn callbacks(&self) -> RemoteCallbacks<'_> {
        let mut rc = RemoteCallbacks::new();
        rc.credentials(self.authenticator.credentials(&self.config));
        rc
    }
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}
