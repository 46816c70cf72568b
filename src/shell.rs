//! Interactive session: one folder, background builds, searches and playback.

use std::{
    io::{BufRead, Write},
    path::PathBuf,
    time::Duration,
};

use vidseek::{
    ConfigDb,
    Error,
    ModelManager,
    Result,
    Session,
    Settings,
    pipeline::ProgressKind,
    player::{CommandPlayer, PlaybackRequest, Player},
    settings::keys,
    translator::OllamaTranslator,
};

use crate::{canonical_folder, finish_run, print_results, show_segment};

const HELP: &str = "\
Commands:
  open <folder>     select a video folder and load its index
  build             index the folder, adding to the current index
  rebuild           clear the index and index the folder again
  cancel            stop the running build
  wait              follow the running build until it ends
  search <query>    search the index
  words             list every indexed word
  play <n>          play result n of the last search
  status            show folder and index state
  help              show this help
  quit              leave the shell";

struct Shell<'a> {
    config_db: &'a ConfigDb,
    settings: &'a Settings,
    session: Session,
    model: ModelManager,
    translator: Option<OllamaTranslator>,
    player: CommandPlayer,
    building: bool,
}

/// Run the read-eval loop on stdin until `quit` or end of input.
pub fn run(
    config_db: &ConfigDb,
    settings: &Settings,
    folder: Option<PathBuf>,
) -> Result<()> {
    let translator = match OllamaTranslator::new(
        &settings.translator_url,
        &settings.translator_model,
    ) {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(error = %e, "translation disabled");
            None
        }
    };

    let mut shell = Shell {
        config_db,
        settings,
        session: Session::new(settings.extension_match),
        model: ModelManager::new(settings),
        translator,
        player: CommandPlayer::new(&settings.player_command),
        building: false,
    };

    if let Some(folder) = folder {
        shell.report(|s| s.open(&folder.to_string_lossy()));
    }
    println!("Type `help` for a list of commands.");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        shell.drain_progress()?;
        print!("vidseek> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line?;
        let line = line.trim();
        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(c, r)| (c, r.trim()));

        match command {
            "" => {}
            "quit" | "exit" => break,
            "help" => println!("{HELP}"),
            "open" => shell.report(|s| s.open(rest)),
            "build" => shell.report(|s| s.build(false)),
            "rebuild" => shell.report(|s| s.build(true)),
            "cancel" => shell.cancel(),
            "wait" => shell.report(Shell::follow),
            "search" => shell.search(rest),
            "words" => shell.words(),
            "play" => shell.report(|s| s.play(rest)),
            "status" => shell.status(),
            other => println!("Unknown command '{other}'. Type `help`."),
        }
    }

    shell.session.cancel();
    shell.session.join_detached();
    shell.model.unload();
    Ok(())
}

impl Shell<'_> {
    /// Print a command's error without leaving the shell.
    fn report(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) {
        if let Err(e) = f(self) {
            println!("Error: {e}");
        }
    }

    fn open(&mut self, arg: &str) -> Result<()> {
        if arg.is_empty() {
            println!("Usage: open <folder>");
            return Ok(());
        }
        let folder = canonical_folder(&PathBuf::from(arg))?;
        self.building = false;
        let words = self.session.open(&folder)?;
        self.config_db
            .set_setting(keys::ACTIVE_FOLDER, &folder.to_string_lossy())?;
        if words > 0 {
            println!("Opened {} ({words} words indexed)", folder.display());
        } else {
            println!("Opened {} (not indexed yet)", folder.display());
        }
        Ok(())
    }

    fn build(&mut self, rebuild: bool) -> Result<()> {
        if self.session.folder().is_none() {
            return Err(Error::NoFolder);
        }
        let transcriber = self.model.ensure_loaded()?;
        self.session.start_build(rebuild, transcriber)?;
        self.building = true;
        println!(
            "{} started in the background. Use `wait` to follow it.",
            if rebuild { "Rebuild" } else { "Build" }
        );
        Ok(())
    }

    /// Print pending progress and collect a finished run.
    fn drain_progress(&mut self) -> Result<()> {
        for event in self.session.poll_progress() {
            if event.kind != ProgressKind::Processing {
                println!("[{:>3}%] {}", event.percent, event.message);
            }
        }
        if self.building && !self.session.is_running() {
            self.finish()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.building = false;
        let report = self.session.wait()?;
        if let (Some(report), Some(folder)) = (report, self.session.folder()) {
            finish_run(self.config_db, folder, &report)?;
        }
        Ok(())
    }

    fn follow(&mut self) -> Result<()> {
        if !self.building {
            println!("No build is running.");
            return Ok(());
        }
        while self.session.is_running() {
            if let Some(event) =
                self.session.next_progress(Duration::from_millis(200))
            {
                println!("[{:>3}%] {}", event.percent, event.message);
            }
        }
        self.drain_progress()
    }

    fn cancel(&mut self) {
        if !self.building {
            println!("No build is running.");
            return;
        }
        self.building = false;
        match self.session.cancel() {
            Some(report) => println!("Cancelled: {}", report.summary()),
            None => println!("Cancelled."),
        }
    }

    fn search(&mut self, query: &str) {
        if query.is_empty() {
            println!("Usage: search <query>");
            return;
        }
        print_results(self.session.search(query));
    }

    fn words(&self) {
        let words = self.session.words();
        if words.is_empty() {
            println!("No words indexed.");
        } else {
            println!("{}", words.join(", "));
        }
    }

    fn play(&mut self, arg: &str) -> Result<()> {
        let position: usize = arg.parse().map_err(|_| {
            Error::Config(format!("expected a result number, got '{arg}'"))
        })?;
        let occurrence = position
            .checked_sub(1)
            .and_then(|i| self.session.result(i))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "result",
                name: format!("#{position}"),
            })?;
        let folder = self.session.folder().ok_or(Error::NoFolder)?;

        let request = PlaybackRequest::from_occurrence(folder, &occurrence);
        show_segment(&occurrence, self.translator.as_ref());
        self.player.play(&request)
    }

    fn status(&self) {
        match self.session.folder() {
            Some(folder) => println!("Folder: {}", folder.display()),
            None => println!("Folder: (none)"),
        }
        let index = self.session.index();
        println!("Words: {}", index.len());
        println!("Segments indexed: {}", index.occurrence_count());
        println!(
            "Build: {}",
            if self.session.is_running() { "running" } else { "idle" }
        );
        println!("Transcriber: {}", self.settings.transcriber.as_str());
        println!("Last results: {}", self.session.last_results().len());
    }
}
