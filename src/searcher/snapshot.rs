use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::space::Configuration;

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A serializable picture of a searcher, as returned by
/// [`GpSearcher::get_state`](super::GpSearcher::get_state).
///
/// The trial history lives in `state` in the encoded form produced by
/// [`SearcherState::encode`](crate::state::SearcherState::encode).
/// Skip-optimization flags travel next to it and are re-applied after
/// decoding.
///
/// # Schema versioning
///
/// The `version` field enables future schema evolution without breaking
/// existing files. The current version is [`SNAPSHOT_VERSION`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearcherSnapshot {
    /// Schema version.
    pub version: u32,
    /// Encoded trial history.
    pub state: Value,
    /// Trials whose data is excluded from refits.
    #[serde(default)]
    pub skip_optimization: BTreeSet<String>,
    /// Seed that reproduces the searcher's random stream from this point.
    pub random_state: u64,
    /// Suggestions handed out so far.
    #[serde(default)]
    pub num_suggestions: usize,
    /// Initial points not yet suggested.
    #[serde(default)]
    pub remaining_points: Vec<Configuration>,
    /// Observation count at the last hyperparameter re-estimation.
    #[serde(default)]
    pub last_hp_fit: Option<usize>,
}

impl SearcherSnapshot {
    /// Save the snapshot to a JSON file.
    ///
    /// The file is written to a temporary sibling first and renamed into
    /// place, so readers never see a half-written snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the file cannot be created or
    /// written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let parent = path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        let file = std::fs::File::create(&tmp_path).map_err(persistence)?;
        serde_json::to_writer_pretty(file, self).map_err(persistence)?;
        std::fs::rename(&tmp_path, path).map_err(persistence)
    }

    /// Load a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the file cannot be read or parsed,
    /// or if it was written by an unsupported schema version.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(persistence)?;
        let snapshot: Self =
            serde_json::from_reader(std::io::BufReader::new(file)).map_err(persistence)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Persistence(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

fn persistence(e: impl core::fmt::Display) -> Error {
    Error::Persistence(e.to_string())
}
