use std::path::PathBuf;

use crate::{
    config_db::ConfigDb,
    error::{Error, Result},
    model_manager::Backend,
    walker::ExtensionMatch,
};

/// Setting keys understood by vidseek, with their defaults.
pub mod keys {
    pub const ACTIVE_FOLDER: &str = "active_folder";
    pub const TRANSCRIBER: &str = "transcriber";
    pub const WHISPER_COMMAND: &str = "whisper_command";
    pub const WHISPER_MODEL: &str = "whisper_model";
    pub const WHISPER_TASK: &str = "whisper_task";
    pub const TRANSLATOR_URL: &str = "translator_url";
    pub const TRANSLATOR_MODEL: &str = "translator_model";
    pub const PLAYER_COMMAND: &str = "player_command";
    pub const EXTENSION_MATCH: &str = "extension_match";
}

pub const KNOWN_SETTINGS: &[(&str, &str)] = &[
    (keys::ACTIVE_FOLDER, ""),
    (keys::TRANSCRIBER, "whisper"),
    (keys::WHISPER_COMMAND, "whisper"),
    (keys::WHISPER_MODEL, "base"),
    (keys::WHISPER_TASK, "translate"),
    (keys::TRANSLATOR_URL, "http://localhost:11434"),
    (keys::TRANSLATOR_MODEL, "gemma:2b"),
    (keys::PLAYER_COMMAND, "mpv"),
    (keys::EXTENSION_MATCH, "exact"),
];

pub fn default_for(key: &str) -> Option<&'static str> {
    KNOWN_SETTINGS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

/// Reject unknown keys and values that would fail later at use.
pub fn validate(key: &str, value: &str) -> Result<()> {
    if default_for(key).is_none() {
        return Err(Error::NotFound {
            kind: "setting",
            name: key.to_string(),
        });
    }
    match key {
        keys::TRANSCRIBER => value.parse::<Backend>().map(|_| ()),
        keys::EXTENSION_MATCH => value.parse::<ExtensionMatch>().map(|_| ()),
        keys::WHISPER_TASK if value != "translate" && value != "transcribe" => {
            Err(Error::Config(format!(
                "whisper_task must be translate or transcribe, got '{value}'"
            )))
        }
        _ => Ok(()),
    }
}

/// Typed view of the settings table, defaults filled in.
#[derive(Debug, Clone)]
pub struct Settings {
    pub active_folder: Option<PathBuf>,
    pub transcriber: Backend,
    pub whisper_command: String,
    pub whisper_model: String,
    pub whisper_task: String,
    pub translator_url: String,
    pub translator_model: String,
    pub player_command: String,
    pub extension_match: ExtensionMatch,
}

impl Settings {
    pub fn load(config_db: &ConfigDb) -> Result<Self> {
        let get = |key: &str| -> Result<String> {
            config_db.get_setting_or(key, default_for(key).unwrap_or_default())
        };

        let active_folder = config_db
            .get_setting(keys::ACTIVE_FOLDER)?
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            active_folder,
            transcriber: get(keys::TRANSCRIBER)?.parse()?,
            whisper_command: get(keys::WHISPER_COMMAND)?,
            whisper_model: get(keys::WHISPER_MODEL)?,
            whisper_task: get(keys::WHISPER_TASK)?,
            translator_url: get(keys::TRANSLATOR_URL)?,
            translator_model: get(keys::TRANSLATOR_MODEL)?,
            player_command: get(keys::PLAYER_COMMAND)?,
            extension_match: get(keys::EXTENSION_MATCH)?.parse()?,
        })
    }
}
