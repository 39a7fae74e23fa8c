//! Handlers for the non-interactive subcommands.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use crossterm::tty::IsTty;
use indicatif::ProgressBar;

use crate::api::ApiClient;
use crate::config::{self, Config};
use crate::contact::{is_valid_email, Contact, ContactDraft};
use crate::csv_io;
use crate::import::{self, ImportOptions, ImportReport};
use crate::photo;
use crate::session::Session;
use crate::store::{ContactStore, MergeDecision, MergeProposal, SaveOutcome};
use crate::view::{self, FilterMode, RECENT_LIMIT};
use crate::{
    AddArgs, Command, ContactArgs, DeleteArgs, EditArgs, ExportArgs, IdArgs, ImportArgs, InitArgs,
    ListArgs, LoginArgs, MergeArgs, ProfileAction, ProfileArgs, RegisterArgs,
};

const MIN_PASSWORD_LEN: usize = 6;

pub fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Init(args) => handle_init(&args, Some(config.config_path.as_path())),
        Command::Register(args) => handle_register(args, config),
        Command::Login(args) => handle_login(args, config),
        Command::Logout => handle_logout(config),
        Command::Profile(args) => handle_profile(args, config),
        Command::List(args) => handle_list(args, config),
        Command::Show(args) => handle_show(args, config),
        Command::Recent => handle_recent(config),
        Command::Add(args) => handle_add(args, config),
        Command::Edit(args) => handle_edit(args, config),
        Command::Delete(args) => handle_delete(args, config),
        Command::Star(args) => handle_star(args, config),
        Command::Import(args) => handle_import(args, config),
        Command::Export(args) => handle_export(args, config),
    }
}

pub fn handle_init(args: &InitArgs, path: Option<&Path>) -> Result<()> {
    let written = config::write_default(path, args.api_url.as_deref(), args.force)?;
    println!("Wrote configuration to {}", written.display());
    Ok(())
}

// ============================================================================
// Session and account
// ============================================================================

fn connect(config: &Config) -> Result<ApiClient> {
    let session = Session::load(&config.session_file);
    ApiClient::new(
        &config.api_url,
        Duration::from_secs(config.timeout_secs),
        session,
    )
}

fn connect_signed_in(config: &Config) -> Result<ApiClient> {
    let client = connect(config)?;
    if !client.session().is_active() {
        bail!("not logged in (run `cbook login <email>` first)");
    }
    Ok(client)
}

fn handle_register(args: RegisterArgs, config: &Config) -> Result<()> {
    let username = args.username.trim();
    let email = args.email.trim();
    if username.is_empty() {
        bail!("Username is required.");
    }
    if !is_valid_email(email) {
        bail!("Invalid email.");
    }
    let password = read_secret("Password: ", args.password_stdin)?;
    if !args.password_stdin {
        let confirm = read_secret("Confirm password: ", false)?;
        if confirm != password {
            bail!("Passwords do not match.");
        }
    }
    check_password_length(&password)?;

    let mut client = connect(config)?;
    let user = client.register(username, email, &password)?;
    println!("Registered and signed in as {} <{}>", user.username, user.email);
    Ok(())
}

fn handle_login(args: LoginArgs, config: &Config) -> Result<()> {
    let email = args.email.trim();
    if email.is_empty() {
        bail!("Email is required.");
    }
    let password = read_secret("Password: ", args.password_stdin)?;
    if password.is_empty() {
        bail!("Password is required.");
    }

    let mut client = connect(config)?;
    let user = client.login(email, &password)?;
    println!("Signed in as {} <{}>", user.username, user.email);
    Ok(())
}

fn handle_logout(config: &Config) -> Result<()> {
    let mut client = connect(config)?;
    let was_active = client.session().is_active();
    client.logout()?;
    if was_active {
        println!("Signed out.");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

fn handle_profile(args: ProfileArgs, config: &Config) -> Result<()> {
    let mut client = connect_signed_in(config)?;

    match args.action {
        None => {
            let user = client.profile()?;
            println!("Username: {}", user.username);
            println!("Email:    {}", user.email);
            println!("Picture:  {}", photo::describe(&user.profile_picture));
        }
        Some(ProfileAction::Update { username, email }) => {
            let current = client
                .session()
                .user()
                .cloned()
                .ok_or_else(|| anyhow!("no profile stored; run `cbook profile` first"))?;
            let username = username.unwrap_or(current.username);
            let email = email.unwrap_or(current.email);
            let username = username.trim();
            let email = email.trim();
            if username.is_empty() {
                bail!("Username is required.");
            }
            if email.is_empty() {
                bail!("Email is required.");
            }
            if !is_valid_email(email) {
                bail!("Invalid email.");
            }
            let user = client.update_profile(username, email)?;
            println!("Profile updated: {} <{}>", user.username, user.email);
        }
        Some(ProfileAction::Password { password_stdin }) => {
            let current = read_secret("Current password: ", password_stdin)?;
            let new = read_secret("New password: ", password_stdin)?;
            let confirm = read_secret("Confirm new password: ", password_stdin)?;
            if current.is_empty() {
                bail!("Current password is required.");
            }
            check_password_length(&new)?;
            if new != confirm {
                bail!("Passwords do not match.");
            }
            let message = client.change_password(&current, &new)?;
            println!("{}", message);
        }
        Some(ProfileAction::Picture { file, remove }) => {
            let picture = match file {
                Some(path) if !remove => photo::load_data_url(&path)?,
                _ => String::new(),
            };
            let removing = picture.is_empty();
            client.session_mut().set_profile_picture(picture)?;
            if removing {
                println!("Profile picture removed.");
            } else {
                println!("Profile picture updated.");
            }
        }
    }
    Ok(())
}

fn check_password_length(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("Password must be at least {} characters.", MIN_PASSWORD_LEN);
    }
    Ok(())
}

// ============================================================================
// Contacts
// ============================================================================

fn open_store(config: &Config, client: &mut ApiClient) -> Result<ContactStore> {
    let mut store = ContactStore::new(config.view.initial_state());
    store.load(client)?;
    Ok(store)
}

fn handle_list(args: ListArgs, config: &Config) -> Result<()> {
    let page_size = args.page_size.unwrap_or(config.view.page_size);
    if page_size == 0 {
        bail!("page size must be at least 1");
    }

    let mut client = connect_signed_in(config)?;
    let mut store = open_store(config, &mut client)?;
    store.update_view(|state| {
        state.query = args.query.unwrap_or_default();
        if args.starred {
            state.filter = FilterMode::Starred;
        }
        if let Some(sort) = args.sort {
            state.sort = sort;
        }
        if let Some(order) = args.order {
            state.direction = order;
        }
        state.page_size = page_size;
        state.page = args.page.max(1);
    });

    let state = store.view_state().clone();
    let view = store.view();
    if view.filtered_count() == 0 {
        println!("No contacts found.");
        return Ok(());
    }

    let mut heading = format!(
        "Contacts ({}) sorted by {} ({})",
        view.filtered_count(),
        state.sort,
        state.direction
    );
    if state.filter == FilterMode::Starred {
        heading.push_str(", starred only");
    }
    println!("{}", heading);

    for group in &view.groups {
        println!("-- {} --", group.initial);
        for contact in &group.contacts {
            println!("{}", list_line(contact));
        }
    }
    println!("Page {} of {}", view.page, view.total_pages);
    Ok(())
}

fn list_line(contact: &Contact) -> String {
    let star = if contact.starred { '*' } else { ' ' };
    format!(
        "{} {:<28} {:<16} {:<28} [{}]",
        star,
        contact.display_name(),
        contact.phone,
        contact.email,
        contact.id
    )
}

fn handle_show(args: IdArgs, config: &Config) -> Result<()> {
    let mut client = connect_signed_in(config)?;
    let store = open_store(config, &mut client)?;
    let contact = store
        .contact(&args.id)
        .ok_or_else(|| anyhow!("no contact with id {}", args.id))?;
    print_contact(contact);
    Ok(())
}

fn print_contact(contact: &Contact) {
    let rows = [
        ("Name", contact.display_name().to_string()),
        ("Phone", contact.phone.clone()),
        ("Email", contact.email.clone()),
        ("Company", contact.company.clone()),
        ("Job Title", contact.job_title.clone()),
        ("Address", contact.address.clone()),
        ("Starred", if contact.starred { "yes" } else { "no" }.to_string()),
        ("Picture", photo::describe(&contact.profile_picture)),
    ];
    for (label, value) in rows {
        if !value.is_empty() {
            println!("{:<10} {}", format!("{}:", label), value);
        }
    }
    for link in &contact.social_media {
        println!("{:<10} {}", "Social:", link);
    }
    if !contact.notes.is_empty() {
        println!("Notes:");
        for line in contact.notes.lines() {
            println!("  {}", line);
        }
    }
    println!("{:<10} {}", "Id:", contact.id);
}

fn handle_recent(config: &Config) -> Result<()> {
    let mut client = connect_signed_in(config)?;
    let store = open_store(config, &mut client)?;
    let recent = view::recent(store.contacts(), RECENT_LIMIT);
    if recent.is_empty() {
        println!("No contacts yet.");
        return Ok(());
    }
    for contact in recent {
        println!("{}", list_line(contact));
    }
    Ok(())
}

/// Copy the flags that were given onto `draft`.
fn apply_args(draft: &mut ContactDraft, args: ContactArgs) -> Result<()> {
    let ContactArgs {
        first_name,
        last_name,
        email,
        phone,
        company,
        job_title,
        address,
        notes,
        social,
        picture,
        picture_file,
        star,
        unstar,
    } = args;

    let assign = |slot: &mut Option<String>, value: Option<String>| {
        if value.is_some() {
            *slot = value;
        }
    };
    assign(&mut draft.first_name, first_name);
    assign(&mut draft.last_name, last_name);
    assign(&mut draft.email, email);
    assign(&mut draft.phone, phone);
    assign(&mut draft.company, company);
    assign(&mut draft.job_title, job_title);
    assign(&mut draft.address, address);
    assign(&mut draft.notes, notes);
    assign(&mut draft.profile_picture, picture);

    if let Some(path) = picture_file {
        draft.profile_picture = Some(photo::load_data_url(&path)?);
    }
    if !social.is_empty() {
        draft.social_media = Some(social);
    }
    if star {
        draft.starred = Some(true);
    } else if unstar {
        draft.starred = Some(false);
    }
    Ok(())
}

fn handle_add(args: AddArgs, config: &Config) -> Result<()> {
    let mut draft = ContactDraft::default();
    apply_args(&mut draft, args.fields)?;

    let mut client = connect_signed_in(config)?;
    let mut store = open_store(config, &mut client)?;
    let outcome = store.save(&mut client, draft, None)?;
    finish_save(&mut store, &mut client, outcome, &args.merge)
}

fn handle_edit(args: EditArgs, config: &Config) -> Result<()> {
    let mut client = connect_signed_in(config)?;
    let mut store = open_store(config, &mut client)?;
    let existing = store
        .contact(&args.id)
        .ok_or_else(|| anyhow!("no contact with id {}", args.id))?;
    let mut draft = ContactDraft::from_contact(existing);
    apply_args(&mut draft, args.fields)?;

    let outcome = store.save(&mut client, draft, Some(&args.id))?;
    finish_save(&mut store, &mut client, outcome, &args.merge)
}

fn finish_save(
    store: &mut ContactStore,
    client: &mut ApiClient,
    outcome: SaveOutcome,
    merge: &MergeArgs,
) -> Result<()> {
    let outcome = match outcome {
        SaveOutcome::NeedsConfirmation(proposal) => {
            let decision = if merge.merge {
                MergeDecision::Merge
            } else if merge.no_merge {
                MergeDecision::KeepSeparate
            } else {
                ask_merge(&proposal)?
            };
            store.resolve_merge(client, decision)?
        }
        other => other,
    };

    let name_of = |id: &str| {
        store
            .contact(id)
            .map(|c| c.display_name().to_string())
            .unwrap_or_else(|| id.to_string())
    };
    match outcome {
        SaveOutcome::Created(id) => println!("Created {} [{}]", name_of(&id), id),
        SaveOutcome::Updated(id) => println!("Updated {} [{}]", name_of(&id), id),
        SaveOutcome::Merged(id) => println!("Merged into {} [{}]", name_of(&id), id),
        SaveOutcome::Cancelled => println!("Cancelled; nothing was saved."),
        SaveOutcome::NeedsConfirmation(_) => bail!("merge decision was not applied"),
    }
    Ok(())
}

fn ask_merge(proposal: &MergeProposal) -> Result<MergeDecision> {
    let target = &proposal.target;
    eprintln!(
        "A contact with phone {} already exists: {} [{}]",
        target.phone,
        target.display_name(),
        target.id
    );
    let answer = prompt_line("Merge into it? [y]es / [n]o, keep both / [c]ancel: ")?;
    Ok(match answer.as_deref().map(str::trim) {
        Some(a) if a.eq_ignore_ascii_case("y") || a.eq_ignore_ascii_case("yes") => {
            MergeDecision::Merge
        }
        Some(a) if a.eq_ignore_ascii_case("n") || a.eq_ignore_ascii_case("no") => {
            MergeDecision::KeepSeparate
        }
        _ => MergeDecision::Cancel,
    })
}

fn handle_delete(args: DeleteArgs, config: &Config) -> Result<()> {
    let mut client = connect_signed_in(config)?;
    let mut store = open_store(config, &mut client)?;
    let name = store
        .contact(&args.id)
        .map(|c| c.display_name().to_string())
        .ok_or_else(|| anyhow!("no contact with id {}", args.id))?;

    if !args.yes {
        let answer = prompt_line(&format!("Delete {}? [y/N]: ", name))?;
        let confirmed = answer
            .as_deref()
            .map(str::trim)
            .is_some_and(|a| a.eq_ignore_ascii_case("y") || a.eq_ignore_ascii_case("yes"));
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if store.delete(&mut client, &args.id)? {
        println!("Deleted {}.", name);
    } else {
        println!("The server did not delete {}.", name);
    }
    Ok(())
}

fn handle_star(args: IdArgs, config: &Config) -> Result<()> {
    let mut client = connect_signed_in(config)?;
    let mut store = open_store(config, &mut client)?;
    let starred = store.toggle_star(&mut client, &args.id)?;
    let name = store
        .contact(&args.id)
        .map(|c| c.display_name().to_string())
        .unwrap_or_else(|| args.id.clone());
    if starred {
        println!("Starred {}.", name);
    } else {
        println!("Unstarred {}.", name);
    }
    Ok(())
}

// ============================================================================
// CSV
// ============================================================================

fn handle_import(args: ImportArgs, config: &Config) -> Result<()> {
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let decoded = csv_io::decode(&text);
    for error in &decoded.errors {
        eprintln!("warning: line {}: {}", error.line, error.message);
    }
    if decoded.drafts.is_empty() {
        bail!("No contacts found in {}", args.input.display());
    }

    let unreadable_count = decoded.errors.len();

    if args.dry_run {
        let mut report = import::check_drafts(&decoded.drafts);
        report.unreadable_count = unreadable_count;
        print_report(&report);
        return Ok(());
    }

    let mut client = connect_signed_in(config)?;
    let mut store = open_store(config, &mut client)?;
    let mut progress = ProgressBar::new(decoded.drafts.len() as u64);
    let mut report = store.import(
        &mut client,
        decoded.drafts,
        ImportOptions {
            merge_duplicates: args.yes_merge,
        },
        &mut progress,
    )?;
    report.unreadable_count = unreadable_count;
    print_report(&report);
    Ok(())
}

fn print_report(report: &ImportReport) {
    println!("{}", report.summary());
    for failure in &report.failures {
        let name = if failure.name.is_empty() {
            "(no name)"
        } else {
            failure.name.as_str()
        };
        println!("  row {} ({}): {}", failure.row, name, failure.message);
    }
}

fn handle_export(args: ExportArgs, config: &Config) -> Result<()> {
    let mut client = connect_signed_in(config)?;
    let store = open_store(config, &mut client)?;
    if store.contacts().is_empty() {
        println!("No contacts to export.");
        return Ok(());
    }

    let text = csv_io::encode(store.contacts())?;
    let path = args
        .output
        .unwrap_or_else(|| csv_io::export_file_name_today().into());
    fs::write(&path, text)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!(
        "Exported {} contacts to {}",
        store.contacts().len(),
        path.display()
    );
    Ok(())
}

// ============================================================================
// Prompts
// ============================================================================

/// Prompt on stderr and read one line from stdin. `None` on end of input.
fn prompt_line(prompt: &str) -> Result<Option<String>> {
    eprint!("{}", prompt);
    io::stderr().flush().ok();
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

/// With `from_stdin` the password is one plain line and no prompt is
/// printed. On a terminal it is typed with echo off.
fn read_secret(prompt: &str, from_stdin: bool) -> Result<String> {
    let line = if from_stdin {
        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read from stdin")?;
        (read > 0).then(|| line.trim_end_matches(&['\r', '\n'][..]).to_string())
    } else if io::stdin().is_tty() {
        read_hidden(prompt)?
    } else {
        prompt_line(prompt)?
    };
    line.ok_or_else(|| anyhow!("no password given on stdin"))
}

fn read_hidden(prompt: &str) -> Result<Option<String>> {
    eprint!("{}", prompt);
    io::stderr().flush().ok();
    terminal::enable_raw_mode().context("failed to switch the terminal to raw mode")?;
    let result = read_hidden_keys();
    terminal::disable_raw_mode().context("failed to restore the terminal")?;
    eprintln!();
    result
}

fn read_hidden_keys() -> Result<Option<String>> {
    let mut secret = String::new();
    loop {
        let Event::Key(key) = event::read().context("failed to read key")? else {
            continue;
        };
        match apply_secret_key(&mut secret, key) {
            SecretInput::Typing => {}
            SecretInput::Done => return Ok(Some(secret)),
            SecretInput::EndOfInput => return Ok(None),
            SecretInput::Interrupted => bail!("interrupted"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SecretInput {
    Typing,
    Done,
    EndOfInput,
    Interrupted,
}

fn apply_secret_key(secret: &mut String, key: KeyEvent) -> SecretInput {
    if key.kind == KeyEventKind::Release {
        return SecretInput::Typing;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Enter => SecretInput::Done,
        KeyCode::Char('c') if ctrl => SecretInput::Interrupted,
        KeyCode::Char('d') if ctrl && secret.is_empty() => SecretInput::EndOfInput,
        KeyCode::Char(_) if ctrl => SecretInput::Typing,
        KeyCode::Char(c) => {
            secret.push(c);
            SecretInput::Typing
        }
        KeyCode::Backspace => {
            secret.pop();
            SecretInput::Typing
        }
        _ => SecretInput::Typing,
    }
}
