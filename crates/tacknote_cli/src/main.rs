//! App shell for tacknote.
//!
//! # Responsibility
//! - Classify launch input (plain launch vs deep link) before printing
//!   anything, so a detail deep link never shows the list first.
//! - Dispatch note commands through the presentation layer.
//! - Host the long-lived reminder daemon.

mod config;

use clap::{Parser, Subcommand};
use config::AppPaths;
use log::warn;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tacknote_core::{
    classify_launch, core_version, default_log_level, init_logging, now_epoch_ms,
    DesktopSink, LaunchTarget, Note, NoteId, NoteStore, NotificationSink, ReminderScheduler,
    SqliteNoteRepository, TimerAlarmService, DEFAULT_FEED_GRACE,
};
use tacknote_core::db::open_db;
use tacknote_core::repo::note_repo::NoteRepository;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "tacknote", version, about = "Notes with timed reminders")]
struct Cli {
    /// Data directory override (database and logs live here).
    #[arg(long, env = "TACKNOTE_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Add a new note and print its assigned identity.
    Add {
        title: String,
        /// Note body text.
        #[arg(long, default_value = "")]
        body: String,
        /// Reminder time as local "YYYY-MM-DD HH:MM".
        #[arg(long, value_parser = parse_local_datetime)]
        remind_at: Option<i64>,
    },
    /// Edit an existing note in place.
    Edit {
        id: NoteId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
        /// New reminder time as local "YYYY-MM-DD HH:MM".
        #[arg(long, value_parser = parse_local_datetime, conflicts_with = "clear_reminder")]
        remind_at: Option<i64>,
        /// Remove the reminder.
        #[arg(long)]
        clear_reminder: bool,
    },
    /// Delete a note.
    Delete { id: NoteId },
    /// Show one note.
    Show { id: NoteId },
    /// List all notes, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Re-enter the app through a deep link or a plain note identity.
    Open { target: String },
    /// Run the reminder daemon until interrupted.
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let paths = AppPaths::resolve(cli.data_dir.clone());
    paths.ensure_dirs()?;
    if let Err(err) = init_logging(
        default_log_level(),
        &paths.log_dir.display().to_string(),
    ) {
        // Logging is best-effort for the shell; the app stays usable.
        eprintln!("warning: logging disabled: {err}");
    }

    match cli.command {
        None => run_list(&paths, false).await,
        Some(Command::Add {
            title,
            body,
            remind_at,
        }) => run_add(&paths, title, body, remind_at).await,
        Some(Command::Edit {
            id,
            title,
            body,
            remind_at,
            clear_reminder,
        }) => run_edit(&paths, id, title, body, remind_at, clear_reminder).await,
        Some(Command::Delete { id }) => run_delete(&paths, id).await,
        Some(Command::Show { id }) => run_show(&paths, id).await,
        Some(Command::List { json }) => run_list(&paths, json).await,
        Some(Command::Open { target }) => run_open(&paths, &target).await,
        Some(Command::Daemon) => run_daemon(&paths).await,
    }
}

struct App {
    store: NoteStore,
    scheduler: Arc<ReminderScheduler>,
    fired_rx: mpsc::UnboundedReceiver<tacknote_core::AlarmPayload>,
}

/// Wires the presentation layer over the live database.
///
/// Returns the pending reminders read before the connection moves into the
/// store, so the daemon can reschedule them.
fn open_app(paths: &AppPaths) -> Result<(App, Vec<Note>), Box<dyn Error>> {
    let conn = open_db(&paths.db_path)?;
    let pending = SqliteNoteRepository::new(&conn).list_notes_with_reminders()?;

    let (alarms, fired_rx) = TimerAlarmService::new(true);
    let sink: Arc<dyn NotificationSink> = Arc::new(DesktopSink::new());
    let scheduler = Arc::new(ReminderScheduler::new(alarms, Arc::clone(&sink)));
    let store = NoteStore::open(conn, Arc::clone(&scheduler), sink, DEFAULT_FEED_GRACE);

    Ok((
        App {
            store,
            scheduler,
            fired_rx,
        },
        pending,
    ))
}

async fn run_add(
    paths: &AppPaths,
    title: String,
    body: String,
    remind_at: Option<i64>,
) -> Result<(), Box<dyn Error>> {
    let (app, _) = open_app(paths)?;

    let mut note = Note::new(title, body);
    note.reminder_at = remind_at;
    // The awaited insert: the identity must exist before the scheduler can
    // hold a registration for it.
    let id = app.store.create(note).await?;

    println!("added note {id}");
    if remind_at.is_some() {
        println!("reminder registered; it fires while the daemon runs");
    }
    Ok(())
}

async fn run_edit(
    paths: &AppPaths,
    id: NoteId,
    title: Option<String>,
    body: Option<String>,
    remind_at: Option<i64>,
    clear_reminder: bool,
) -> Result<(), Box<dyn Error>> {
    let (app, _) = open_app(paths)?;

    let Some(current) = app.store.get(id).await? else {
        println!("note {id} is not available");
        return Ok(());
    };

    let mut edited = current;
    if let Some(title) = title {
        edited.title = title;
    }
    if let Some(body) = body {
        edited.body = body;
    }
    if clear_reminder {
        edited.reminder_at = None;
    } else if remind_at.is_some() {
        edited.reminder_at = remind_at;
    }

    app.store.create(edited).await?;
    println!("saved note {id}");
    Ok(())
}

async fn run_delete(paths: &AppPaths, id: NoteId) -> Result<(), Box<dyn Error>> {
    let (app, _) = open_app(paths)?;

    app.store.delete(id);
    // Commands execute in order; the awaited read flushes the delete before
    // the process exits.
    app.store.get(id).await?;
    println!("deleted note {id}");
    Ok(())
}

async fn run_show(paths: &AppPaths, id: NoteId) -> Result<(), Box<dyn Error>> {
    let (app, _) = open_app(paths)?;
    print_detail(&app.store, id).await
}

async fn run_list(paths: &AppPaths, json: bool) -> Result<(), Box<dyn Error>> {
    let (app, _) = open_app(paths)?;

    let mut sub = app.store.subscribe();
    sub.changed().await;
    let notes = sub.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
        return Ok(());
    }

    if notes.is_empty() {
        println!("no notes yet");
        return Ok(());
    }
    for note in &notes {
        let marker = match note.reminder_at {
            Some(at_ms) => format!("  [reminder {}]", format_local(at_ms)),
            None => String::new(),
        };
        println!("{:>4}  {}{marker}", note.id, note.title);
    }
    Ok(())
}

async fn run_open(paths: &AppPaths, target: &str) -> Result<(), Box<dyn Error>> {
    // Classification happens before any output: a detail deep link must
    // never flash the list first.
    let launch = match target.parse::<NoteId>() {
        Ok(id) => classify_launch(None, Some(id)),
        Err(_) => classify_launch(Some(target), None),
    };

    match launch {
        LaunchTarget::NoteDetail(id) => {
            let (app, _) = open_app(paths)?;
            print_detail(&app.store, id).await
        }
        LaunchTarget::NoteList => run_list(paths, false).await,
    }
}

async fn run_daemon(paths: &AppPaths) -> Result<(), Box<dyn Error>> {
    let (app, pending) = open_app(paths)?;
    let App {
        store,
        scheduler,
        mut fired_rx,
    } = app;

    scheduler.reschedule_all(&pending, now_epoch_ms());

    let fired_scheduler = Arc::clone(&scheduler);
    tokio::spawn(async move {
        while let Some(payload) = fired_rx.recv().await {
            fired_scheduler.on_fired(&payload);
        }
    });

    let mut sub = store.subscribe();
    println!(
        "tacknote {} daemon running ({} pending reminders); ctrl-c to stop",
        core_version(),
        pending.len()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            live = sub.changed() => {
                if !live {
                    warn!("event=daemon_feed module=cli status=closed");
                    break;
                }
                println!("{} notes", sub.snapshot().len());
            }
        }
    }

    println!("daemon stopped");
    Ok(())
}

async fn print_detail(store: &NoteStore, id: NoteId) -> Result<(), Box<dyn Error>> {
    match store.get(id).await? {
        Some(note) => {
            println!("# {} (note {})", note.title, note.id);
            if !note.body.is_empty() {
                println!("{}", note.body);
            }
            if let Some(at_ms) = note.reminder_at {
                println!("reminder: {}", format_local(at_ms));
            }
            Ok(())
        }
        None => {
            // Deleted between navigation and load: non-fatal by contract.
            println!("note {id} is not available");
            Ok(())
        }
    }
}

fn parse_local_datetime(value: &str) -> Result<i64, String> {
    use chrono::{Local, NaiveDateTime, TimeZone};

    let naive = NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M")
        .map_err(|err| format!("expected \"YYYY-MM-DD HH:MM\", got `{value}`: {err}"))?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| format!("`{value}` is ambiguous or invalid in the local timezone"))
}

fn format_local(at_ms: i64) -> String {
    use chrono::{Local, TimeZone};

    match Local.timestamp_millis_opt(at_ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => format!("{at_ms}ms"),
    }
}
