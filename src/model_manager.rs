use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use crate::{
    error::{Error, Result},
    settings::Settings,
    transcriber::{SidecarTranscriber, Transcriber, WhisperCli},
};

pub const MODEL_ENV_VAR: &str = "VIDSEEK_WHISPER_MODEL";

/// Which speech-to-text backend feeds the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Whisper,
    Sidecar,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Whisper => "whisper",
            Backend::Sidecar => "sidecar",
        }
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "whisper" => Ok(Backend::Whisper),
            "sidecar" => Ok(Backend::Sidecar),
            other => Err(Error::Config(format!(
                "unknown transcriber '{other}' (expected whisper or sidecar)"
            ))),
        }
    }
}

/// Owns the transcription backend for the lifetime of the host.
///
/// Loading is lazy: nothing is resolved until the first indexing run asks
/// for the transcriber. `unload` drops it again.
pub struct ModelManager {
    model: Option<Arc<dyn Transcriber>>,
    backend: Backend,
    program: String,
    model_id: String,
    task: String,
}

impl ModelManager {
    /// Creates a `ModelManager` from settings. The whisper model name is
    /// taken from the `VIDSEEK_WHISPER_MODEL` environment variable when set.
    pub fn new(settings: &Settings) -> Self {
        let model_id = std::env::var(MODEL_ENV_VAR)
            .unwrap_or_else(|_| settings.whisper_model.clone());

        Self {
            model: None,
            backend: settings.transcriber,
            program: settings.whisper_command.clone(),
            model_id,
            task: settings.whisper_task.clone(),
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Returns `true` if the backend has already been loaded.
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Resolve the backend, locating the whisper executable if needed.
    pub fn ensure_loaded(&mut self) -> Result<Arc<dyn Transcriber>> {
        if let Some(model) = &self.model {
            return Ok(Arc::clone(model));
        }

        let model: Arc<dyn Transcriber> = match self.backend {
            Backend::Whisper => {
                let program = find_program(&self.program).ok_or_else(|| {
                    Error::Config(format!(
                        "whisper executable '{}' not found; install \
                         openai-whisper or set whisper_command",
                        self.program
                    ))
                })?;
                tracing::info!(
                    program = %program.display(),
                    model = %self.model_id,
                    "using whisper transcriber"
                );
                Arc::new(WhisperCli::new(
                    program,
                    self.model_id.clone(),
                    self.task.clone(),
                ))
            }
            Backend::Sidecar => {
                tracing::info!("using sidecar transcripts");
                Arc::new(SidecarTranscriber)
            }
        };

        self.model = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Drop the loaded backend. Runs still holding it finish normally.
    pub fn unload(&mut self) {
        if self.model.take().is_some() {
            tracing::debug!("transcriber unloaded");
        }
    }
}

/// Locate `program` either as a path or by searching `PATH`.
fn find_program(program: &str) -> Option<PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
