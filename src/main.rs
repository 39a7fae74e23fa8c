mod api;
mod commands;
mod config;
mod contact;
mod csv_io;
mod events;
mod import;
mod merge;
mod photo;
mod search;
mod session;
mod store;
mod ui;
mod view;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use config::Config;
use view::{SortDirection, SortMode};

#[derive(Parser, Debug)]
#[command(name = "cbook", version, about = "Contact book for a remote contacts API")]
struct Cli {
    /// Configuration file (defaults to the platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a starter configuration file
    Init(InitArgs),
    /// Create an account and sign in
    Register(RegisterArgs),
    /// Sign in and store the session token
    Login(LoginArgs),
    /// Forget the stored session
    Logout,
    /// Show or change the signed-in account
    Profile(ProfileArgs),
    /// Print one page of contacts grouped by initial
    List(ListArgs),
    /// Print every field of one contact
    Show(IdArgs),
    /// Print the most recently added contacts
    Recent,
    /// Add a contact
    Add(AddArgs),
    /// Edit a contact; omitted fields keep their value
    Edit(EditArgs),
    /// Delete a contact
    Delete(DeleteArgs),
    /// Toggle the star on a contact
    Star(IdArgs),
    /// Create contacts from a CSV file
    Import(ImportArgs),
    /// Write every contact to a CSV file
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    /// API base URL to write into the file
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Replace an existing file
    #[arg(long, default_value_t = false)]
    force: bool,
}

#[derive(Args, Debug)]
struct RegisterArgs {
    username: String,
    email: String,

    /// Read the password from the first line of stdin without prompting
    #[arg(long, default_value_t = false)]
    password_stdin: bool,
}

#[derive(Args, Debug)]
struct LoginArgs {
    email: String,

    /// Read the password from the first line of stdin without prompting
    #[arg(long, default_value_t = false)]
    password_stdin: bool,
}

#[derive(Args, Debug)]
struct ProfileArgs {
    #[command(subcommand)]
    action: Option<ProfileAction>,
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    /// Change username and/or email
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Change the account password
    Password {
        /// Read current, new and confirmation passwords as three stdin lines
        #[arg(long, default_value_t = false)]
        password_stdin: bool,
    },
    /// Set or remove the profile picture kept with the session
    Picture {
        #[arg(value_name = "FILE", required_unless_present = "remove")]
        file: Option<PathBuf>,
        #[arg(long, conflicts_with = "file")]
        remove: bool,
    },
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Case-insensitive search over names, email, phone, company and title
    #[arg(long, short = 'q')]
    query: Option<String>,

    /// Only starred contacts
    #[arg(long)]
    starred: bool,

    #[arg(long, value_enum)]
    sort: Option<SortMode>,

    #[arg(long, value_enum)]
    order: Option<SortDirection>,

    #[arg(long, default_value_t = 1)]
    page: usize,

    #[arg(long)]
    page_size: Option<usize>,
}

#[derive(Args, Debug)]
struct IdArgs {
    id: String,
}

/// Field flags shared by `add` and `edit`.
#[derive(Args, Debug, Default)]
struct ContactArgs {
    #[arg(long = "first")]
    first_name: Option<String>,
    #[arg(long = "last")]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    job_title: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    /// Social media link; repeat for several
    #[arg(long = "social", value_name = "URL")]
    social: Vec<String>,
    /// Picture URL stored as-is
    #[arg(long, value_name = "URL", conflicts_with = "picture_file")]
    picture: Option<String>,
    /// Image file embedded as a data URL (max 5MB)
    #[arg(long, value_name = "FILE")]
    picture_file: Option<PathBuf>,
    #[arg(long, conflicts_with = "unstar")]
    star: bool,
    #[arg(long)]
    unstar: bool,
}

/// Answer to a duplicate-phone prompt given up front.
#[derive(Args, Debug, Default)]
struct MergeArgs {
    /// Merge into the contact that already has this phone
    #[arg(long, conflicts_with = "no_merge")]
    merge: bool,
    /// Keep a separate contact even if the phone is taken
    #[arg(long)]
    no_merge: bool,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[command(flatten)]
    fields: ContactArgs,
    #[command(flatten)]
    merge: MergeArgs,
}

#[derive(Args, Debug)]
struct EditArgs {
    id: String,
    #[command(flatten)]
    fields: ContactArgs,
    #[command(flatten)]
    merge: MergeArgs,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    id: String,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[arg(value_name = "PATH")]
    input: PathBuf,

    /// Validate rows and print the report without contacting the server
    #[arg(long)]
    dry_run: bool,

    /// Merge rows whose phone matches an existing contact
    #[arg(long)]
    yes_merge: bool,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Output path (defaults to contacts_export_<date>.csv)
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Init(args)) = &cli.command {
        init_stderr_logging();
        return commands::handle_init(args, cli.config.as_deref());
    }

    let config = config::load(cli.config.as_deref())?;

    let Some(command) = cli.command else {
        let _guard = init_file_logging(&config)?;
        report_warnings(&config);
        tracing::info!(config = %config.config_path.display(), "starting terminal ui");
        let mut app = ui::app::App::new(&config)?;
        return app.run();
    };

    init_stderr_logging();
    report_warnings(&config);
    commands::run(command, &config)
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("warn"))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// The terminal UI owns stdout and stderr, so diagnostics go to a file.
/// The returned guard flushes the writer when dropped.
fn init_file_logging(config: &Config) -> Result<WorkerGuard> {
    let path = &config.log_file;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "cbook.log".into());

    let appender = tracing_appender::rolling::never(&dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(guard)
}

fn report_warnings(config: &Config) {
    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }
}
