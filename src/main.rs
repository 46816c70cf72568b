use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use clap::Parser;
use kdam::{BarExt, tqdm};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use vidseek::{
    ConfigDb,
    DataDir,
    Error,
    ModelManager,
    Result,
    Session,
    Settings,
    error::TranslationError,
    index_store::Occurrence,
    persistence,
    pipeline::{ProgressEvent, ProgressKind, RunReport},
    player::{CommandPlayer, PlaybackRequest, Player},
    query,
    settings::{self, KNOWN_SETTINGS, keys},
    translator::{self, OllamaTranslator},
};

mod cli;
mod shell;

use cli::{Cli, Command, ConfigAction, FolderArgs};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("VIDSEEK_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;
    let settings = Settings::load(&config_db)?;

    match cli.command {
        Command::Open { folder } => cmd_open(&config_db, &folder)?,
        Command::Build(args) => {
            cmd_build(&config_db, &settings, &args.folder, args.rebuild)?;
        }
        Command::Rebuild(args) => {
            cmd_build(&config_db, &settings, &args, true)?;
        }
        Command::Search(args) => {
            let mut session = open_session(&settings, &args.folder)?;
            let results = session.search(&args.query);
            if args.json {
                print_results_json(&args.query, results)?;
            } else {
                print_results(results);
            }
        }
        Command::Words(args) => {
            let session = open_session(&settings, &args.folder)?;
            let words = session.words();
            if args.json {
                println!("{}", serde_json::to_string(&words)?);
            } else {
                for word in &words {
                    println!("{word}");
                }
            }
        }
        Command::Play(args) => cmd_play(&settings, &args)?,
        Command::Translate { text } => {
            let translator = OllamaTranslator::new(
                &settings.translator_url,
                &settings.translator_model,
            )?;
            match translator.try_translate(&text) {
                Ok(translation) => println!("{translation}"),
                Err(e) => {
                    eprintln!("{}", translator::failure_hint(&e));
                    return Err(e.into());
                }
            }
        }
        Command::Status(args) => {
            cmd_status(&config_db, &data_dir, &settings, args.json)?;
        }
        Command::Config { action } => cmd_config(&config_db, action)?,
        Command::Shell(args) => {
            let folder = match args.folder {
                Some(folder) => Some(canonical_folder(&folder)?),
                None => settings.active_folder.clone(),
            };
            shell::run(&config_db, &settings, folder)?;
        }
        Command::Completions(args) => args.generate(),
    }

    Ok(())
}

/// Resolve a folder argument to an absolute directory path.
pub(crate) fn canonical_folder(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        return Err(Error::NotFound {
            kind: "folder",
            name: path.display().to_string(),
        });
    }
    path.canonicalize().map_err(|e| {
        Error::Config(format!("cannot resolve path {}: {e}", path.display()))
    })
}

fn resolve_folder(settings: &Settings, args: &FolderArgs) -> Result<PathBuf> {
    match (&args.folder, &settings.active_folder) {
        (Some(folder), _) => canonical_folder(folder),
        (None, Some(folder)) => Ok(folder.clone()),
        (None, None) => Err(Error::NoFolder),
    }
}

fn open_session(settings: &Settings, args: &FolderArgs) -> Result<Session> {
    let folder = resolve_folder(settings, args)?;
    let mut session = Session::new(settings.extension_match);
    session.open(&folder)?;
    Ok(session)
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn cmd_open(config_db: &ConfigDb, folder: &Path) -> Result<()> {
    let folder = canonical_folder(folder)?;
    let words = persistence::load(&folder)?.map_or(0, |store| store.len());
    config_db
        .set_setting(keys::ACTIVE_FOLDER, &folder.to_string_lossy())?;

    if words > 0 {
        println!("Opened {} ({words} words indexed)", folder.display());
    } else {
        println!(
            "Opened {} (not indexed yet, run `vidseek build`)",
            folder.display()
        );
    }
    Ok(())
}

fn cmd_build(
    config_db: &ConfigDb,
    settings: &Settings,
    args: &FolderArgs,
    rebuild: bool,
) -> Result<()> {
    let folder = resolve_folder(settings, args)?;
    let mut session = Session::new(settings.extension_match);
    match session.open(&folder) {
        Ok(_) => {}
        Err(Error::CorruptState { path, reason }) if rebuild => {
            tracing::warn!(
                path = %path.display(),
                reason,
                "ignoring corrupt index, rebuilding"
            );
        }
        Err(e) => return Err(e),
    }

    let mut model = ModelManager::new(settings);
    let transcriber = model.ensure_loaded()?;
    session.start_build(rebuild, transcriber)?;

    let mut pb = tqdm!(total = 100, desc = "Indexing", unit = "%");
    loop {
        match session.next_progress(Duration::from_millis(200)) {
            Some(event) => render_progress(&mut pb, &event)?,
            None if !session.is_running() => {
                for event in session.poll_progress() {
                    render_progress(&mut pb, &event)?;
                }
                break;
            }
            None => {}
        }
    }
    eprintln!();

    let report = session.wait()?.unwrap_or_default();
    finish_run(config_db, &folder, &report)?;
    model.unload();
    Ok(())
}

fn render_progress(
    pb: &mut kdam::Bar,
    event: &ProgressEvent,
) -> std::io::Result<()> {
    match event.kind {
        ProgressKind::Processing => {
            if let Some(file) = &event.file {
                pb.set_description(file.as_str());
            }
        }
        ProgressKind::FileFailed => pb.write(event.message.as_str())?,
        ProgressKind::Completed | ProgressKind::Cancelled => {
            pb.set_description(event.message.as_str());
        }
        ProgressKind::FileIndexed => {}
    }
    pb.update_to(usize::from(event.percent))?;
    Ok(())
}

/// Report a finished run and remember the folder.
pub(crate) fn finish_run(
    config_db: &ConfigDb,
    folder: &Path,
    report: &RunReport,
) -> Result<()> {
    println!("{}", report.summary());
    for failure in &report.failures {
        println!("  failed: {}: {}", failure.file, failure.error);
    }
    if let Some(e) = &report.save_error {
        eprintln!("Warning: index could not be saved: {e}");
    }

    if !report.cancelled {
        let folder = folder.to_string_lossy();
        config_db.record_folder(&folder, unix_now())?;
        config_db.set_setting(keys::ACTIVE_FOLDER, &folder)?;
    }
    Ok(())
}

pub(crate) fn print_results(results: &[Occurrence]) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }
    for (i, occurrence) in results.iter().enumerate() {
        println!("{:>3}. {}", i + 1, query::format_result(occurrence));
    }
}

#[derive(Serialize)]
struct JsonResults<'a> {
    query: &'a str,
    result_count: usize,
    results: &'a [Occurrence],
}

fn print_results_json(query: &str, results: &[Occurrence]) -> Result<()> {
    let out = JsonResults {
        query,
        result_count: results.len(),
        results,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Print the segment text and, when possible, its translation.
pub(crate) fn show_segment(
    occurrence: &Occurrence,
    translator: Option<&OllamaTranslator>,
) {
    println!("{}", occurrence.text.trim());
    let Some(translator) = translator else {
        return;
    };
    match translator.try_translate(&occurrence.text) {
        Ok(translation) => println!("{translation}"),
        Err(TranslationError::EmptyInput) => {}
        Err(e) => {
            tracing::warn!(error = %e, "translation failed");
            eprintln!("(no translation: {})", translator::failure_hint(&e));
        }
    }
}

fn cmd_play(settings: &Settings, args: &cli::PlayArgs) -> Result<()> {
    let mut session = open_session(settings, &args.folder)?;
    let count = session.search(&args.query).len();
    let occurrence = args
        .position
        .checked_sub(1)
        .and_then(|i| session.result(i))
        .cloned()
        .ok_or_else(|| Error::NotFound {
            kind: "result",
            name: format!("#{} of {count}", args.position),
        })?;

    let translator = if args.no_translate {
        None
    } else {
        Some(OllamaTranslator::new(
            &settings.translator_url,
            &settings.translator_model,
        )?)
    };
    show_segment(&occurrence, translator.as_ref());

    let folder = session.folder().ok_or(Error::NoFolder)?;
    let request = PlaybackRequest::from_occurrence(folder, &occurrence);
    let mut player = CommandPlayer::new(&settings.player_command);
    player.play(&request)?;
    player.wait()
}

#[derive(Serialize)]
struct StatusJson<'a> {
    data_dir: String,
    data_dir_source: &'static str,
    folder: Option<String>,
    indexed: bool,
    words: usize,
    occurrences: usize,
    transcriber: &'a str,
    known_folders: Vec<FolderJson>,
}

#[derive(Serialize)]
struct FolderJson {
    path: String,
    indexed_at: u64,
}

fn cmd_status(
    config_db: &ConfigDb,
    data_dir: &DataDir,
    settings: &Settings,
    json: bool,
) -> Result<()> {
    let folder = settings.active_folder.as_deref();
    let store = match folder {
        Some(folder) => persistence::load(folder)?,
        None => None,
    };
    let words = store.as_ref().map_or(0, |s| s.len());
    let occurrences = store.as_ref().map_or(0, |s| s.occurrence_count());
    let transcriber = settings.transcriber.as_str();
    let known = config_db.list_folders()?;

    if json {
        let status = StatusJson {
            data_dir: data_dir.root().display().to_string(),
            data_dir_source: data_dir.source().as_str(),
            folder: folder.map(|f| f.display().to_string()),
            indexed: store.is_some(),
            words,
            occurrences,
            transcriber,
            known_folders: known
                .into_iter()
                .map(|(path, indexed_at)| FolderJson { path, indexed_at })
                .collect(),
        };
        println!("{}", serde_json::to_string(&status)?);
    } else {
        println!(
            "Data directory: {} (from {})",
            data_dir.root().display(),
            data_dir.source().as_str()
        );
        match folder {
            Some(folder) => println!("Folder: {}", folder.display()),
            None => println!("Folder: (none)"),
        }
        println!("Indexed: {}", if store.is_some() { "yes" } else { "no" });
        println!("Words: {words}");
        println!("Segments indexed: {occurrences}");
        println!("Transcriber: {transcriber}");
        if !known.is_empty() {
            println!("Known folders:");
            for (path, indexed_at) in &known {
                println!("  {path} (indexed at {indexed_at})");
            }
        }
    }
    Ok(())
}

fn cmd_config(config_db: &ConfigDb, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let default = settings::default_for(&key).ok_or_else(|| {
                Error::NotFound {
                    kind: "setting",
                    name: key.clone(),
                }
            })?;
            println!("{}", config_db.get_setting_or(&key, default)?);
        }
        ConfigAction::Set { key, value } => {
            settings::validate(&key, &value)?;
            let value = if key == keys::ACTIVE_FOLDER && !value.is_empty() {
                canonical_folder(Path::new(&value))?
                    .to_string_lossy()
                    .into_owned()
            } else {
                value
            };
            config_db.set_setting(&key, &value)?;
            println!("{key} = {value}");
        }
        ConfigAction::Unset { key } => {
            if !config_db.remove_setting(&key)? {
                return Err(Error::NotFound {
                    kind: "setting",
                    name: key,
                });
            }
            println!("Removed {key}");
        }
        ConfigAction::List { json } => {
            let stored: std::collections::BTreeMap<String, String> =
                config_db.list_settings()?.into_iter().collect();
            let effective: std::collections::BTreeMap<&str, &str> =
                KNOWN_SETTINGS
                    .iter()
                    .map(|(key, default)| {
                        let value =
                            stored.get(*key).map_or(*default, String::as_str);
                        (*key, value)
                    })
                    .collect();
            if json {
                println!("{}", serde_json::to_string(&effective)?);
            } else {
                for (key, value) in &effective {
                    println!("{key}\t{value}");
                }
            }
        }
    }
    Ok(())
}
