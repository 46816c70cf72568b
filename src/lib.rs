//! vidseek - keyword search over the spoken words of a video folder.
//!
//! vidseek transcribes every video of a folder with an external
//! speech-to-text engine, tokenizes the time-stamped segments (Latin words
//! and [jieba](https://github.com/messense/jieba-rs) Chinese words) into an
//! inverted index, saves it next to the videos and answers keyword queries
//! with time ranges ready for playback.
//!
//! # Quick start
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//!
//! use vidseek::{Session, transcriber::SidecarTranscriber, walker::ExtensionMatch};
//!
//! let mut session = Session::new(ExtensionMatch::Exact);
//! session.open(Path::new("/videos")).unwrap();
//! session.start_build(false, Arc::new(SidecarTranscriber)).unwrap();
//! let report = session.wait().unwrap();
//! println!("{:?}", report.map(|r| r.summary()));
//!
//! for hit in session.search("hello 世界") {
//!     println!("{}", vidseek::query::format_result(hit));
//! }
//! ```

pub mod config_db;
pub mod data_dir;
pub mod error;
pub mod index_store;
pub mod model_manager;
pub mod persistence;
pub mod pipeline;
pub mod player;
pub mod query;
pub mod session;
pub mod settings;
pub mod tokenizer;
pub mod transcriber;
pub mod translator;
pub mod walker;

pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use index_store::{IndexStore, Occurrence};
pub use model_manager::ModelManager;
pub use session::Session;
pub use settings::Settings;
