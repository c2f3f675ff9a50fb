// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use tibl::{
    content::{ItemListing, RegistryUpdate},
    path::{default_config_file, expand_path},
    serve::serve,
    sync::{PullOutcome, PushOutcome, PushScope},
    Settings, Site,
};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::ProgressBar;
use inquire::Text;
use std::{path::PathBuf, process::exit};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "tibl [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self, settings: Settings) -> Result<()> {
        let site = self.global.site;
        match self.command {
            Command::Create(opts) => run_create(opts, &settings),
            Command::New(opts) => run_new(site, opts, &settings),
            Command::Serve(opts) => run_serve(site, opts, &settings),
            Command::Items => run_items(site, &settings),
            Command::Link(opts) => run_link(site, opts, &settings),
            Command::Push(opts) => run_push(site, opts, &settings),
            Command::Pull => run_pull(site, &settings),
            Command::Changes => run_changes(site, &settings),
        }
    }
}

#[derive(Debug, Clone, Args)]
struct GlobalOptions {
    /// Path to site directory.
    #[arg(short = 'C', long, global = true, value_name = "dir", default_value = ".")]
    pub site: PathBuf,

    /// Show debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Create a new tibl site.
    #[command(override_usage = "tibl create [--name <dir>]")]
    Create(CreateOptions),

    /// Create a new post or page.
    #[command(override_usage = "tibl new [--post_type <post|page>] [--post_name <slug>] [--title <text>]")]
    New(NewOptions),

    /// Serve your website locally.
    #[command(override_usage = "tibl serve [--port <port>]")]
    Serve(ServeOptions),

    /// List posts and pages.
    Items,

    /// Link site to a remote repository.
    #[command(override_usage = "tibl link [--url <url>]")]
    Link(LinkOptions),

    /// Commit and push site content to the linked remote.
    #[command(override_usage = "tibl push [--only-data]")]
    Push(PushOptions),

    /// Fast-forward site content from the linked remote.
    Pull,

    /// Show uncommitted changes of the site.
    Changes,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CreateOptions {
    /// Directory to create site in.
    #[arg(long, value_name = "dir")]
    pub name: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NewOptions {
    /// Item type, can be post or page.
    #[arg(long = "post_type", value_name = "type")]
    pub post_type: Option<String>,

    /// File name of item, don't use spaces or non-ascii characters.
    #[arg(long = "post_name", value_name = "slug")]
    pub post_name: Option<String>,

    /// Title of item.
    #[arg(long, value_name = "text")]
    pub title: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ServeOptions {
    /// Server port.
    #[arg(short, long, value_name = "port")]
    pub port: Option<u16>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct LinkOptions {
    /// URL of remote repository.
    #[arg(long, value_name = "url")]
    pub url: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PushOptions {
    /// Only push changes below the data directory.
    #[arg(long)]
    pub only_data: bool,
}

fn main() {
    let cli = Cli::parse();

    let settings = match default_config_file()
        .map_err(anyhow::Error::from)
        .and_then(|path| Ok(Settings::load(path)?))
    {
        Ok(settings) => settings,
        Err(error) => {
            say_err(format!("{error:#}"));
            exit(1);
        }
    };

    let directive = if cli.global.verbose {
        "debug".to_string()
    } else if cli.global.quiet {
        "error".to_string()
    } else {
        settings.log.level.clone()
    };
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run(settings) {
        say_err(format!("{error:#}"));
        exit(1);
    }

    exit(0)
}

fn say_ok(message: impl AsRef<str>) {
    println!("{}", format!("🗿 {}", message.as_ref()).green());
}

fn say_warn(message: impl AsRef<str>) {
    println!("{}", format!("🗿 {}", message.as_ref()).yellow());
}

fn say_err(message: impl AsRef<str>) {
    eprintln!("{}", format!("🗿 {}", message.as_ref()).red());
}

fn prompt(value: Option<String>, message: &str, default: Option<&str>) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }

    let mut text = Text::new(message);
    if let Some(default) = default {
        text = text.with_default(default);
    }

    Ok(text.prompt()?)
}

fn run_create(opts: CreateOptions, settings: &Settings) -> Result<()> {
    let name = prompt(opts.name, "Site directory:", None)?;
    let path = expand_path(&name)?;

    println!("Creating tibl site...");
    let bar = ProgressBar::new_spinner();
    let result = Site::create(&path, settings, bar.clone());
    bar.finish_and_clear();
    result?;

    say_ok(format!("tibl site {name} created!"));
    Ok(())
}

fn run_new(site: PathBuf, opts: NewOptions, settings: &Settings) -> Result<()> {
    let kind = prompt(opts.post_type, "Item type:", Some("post"))?;
    let slug = prompt(opts.post_name, "File name:", Some("hello"))?;
    let title = prompt(opts.title, "Item title:", Some("Hi"))?;

    let site = Site::open(site, settings)?;
    let created = site.content().create_item(&kind, &slug, &title)?;
    say_ok(format!("Created {kind} at {}", created.path.display()));
    if created.registry == RegistryUpdate::Skipped {
        say_warn("Not updating database since you've created a page");
    }

    Ok(())
}

fn run_serve(site: PathBuf, opts: ServeOptions, settings: &Settings) -> Result<()> {
    let site = Site::open(site, settings)?;
    let port = opts.port.unwrap_or(settings.serve.port);
    say_ok(format!("Your site lives here: http://localhost:{port}"));
    serve(site.root(), port)?;

    Ok(())
}

fn run_items(site: PathBuf, settings: &Settings) -> Result<()> {
    say_warn("database.md support is experimental");
    let site = Site::open(site, settings)?;
    let ItemListing { pages, posts } = site.content().items()?;

    println!("\nPages:");
    println!("------");
    for page in pages {
        println!("{}", format!("  - {}", page.path.display()).yellow().bold());
    }

    println!("\nPosts (Path -> Title):");
    println!("------");
    for post in posts {
        match post.title {
            Some(title) => println!(
                "{}",
                format!("  - {} -> {title}", post.path.display()).green().bold()
            ),
            None => println!("{}", format!("  - {} -> ", post.path.display()).red().bold()),
        }
    }
    println!();

    Ok(())
}

fn run_link(site: PathBuf, opts: LinkOptions, settings: &Settings) -> Result<()> {
    let url = prompt(opts.url, "Remote URL:", None)?;
    let mut site = Site::open(site, settings)?;
    let binding = site.link_remote(url)?;
    say_ok(format!("Linked to {} at {}", binding.name, binding.url));

    Ok(())
}

fn run_push(site: PathBuf, opts: PushOptions, settings: &Settings) -> Result<()> {
    let scope = if opts.only_data {
        PushScope::DataOnly
    } else {
        PushScope::All
    };

    let site = Site::open(site, settings)?;
    let bar = ProgressBar::new_spinner();
    let result = site.sync(bar.clone())?.push(scope);
    bar.finish_and_clear();

    match result? {
        PushOutcome::NothingToPush => say_warn("Nothing to push"),
        PushOutcome::Pushed { commit, changes } => {
            say_ok(format!("Pushed {changes} changes in commit {commit}"))
        }
    }

    Ok(())
}

fn run_pull(site: PathBuf, settings: &Settings) -> Result<()> {
    let site = Site::open(site, settings)?;
    let bar = ProgressBar::new_spinner();
    let result = site.sync(bar.clone())?.pull();
    bar.finish_and_clear();

    match result? {
        PullOutcome::UpToDate => say_ok("Already up to date"),
        PullOutcome::FastForwarded { to, .. } => say_ok(format!("Fast-forwarded to {to}")),
    }

    Ok(())
}

fn run_changes(site: PathBuf, settings: &Settings) -> Result<()> {
    let site = Site::open(site, settings)?;
    let changes = site.sync(ProgressBar::hidden())?.status()?;
    if changes.is_empty() {
        say_ok("Nothing changed");
        return Ok(());
    }

    for change in changes {
        println!("  {change}");
    }

    Ok(())
}
