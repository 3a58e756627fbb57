//! # Error report output

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{EstId, GtId, ImageId, ObjectId};
use crate::error::{EvalError, Result};

/// Written in place of an error value that the metric could not compute
pub const ERROR_NOT_COMPUTED: f64 = -1.0;

/// Errors of one evaluated pose estimate w.r.t. every ground-truth pose of the same object
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub im_id: ImageId,
    pub obj_id: ObjectId,
    /// Position of the estimate in its result file, not its rank after sorting
    pub est_id: EstId,
    pub score: f64,
    /// `gt_id -> error`, [`ERROR_NOT_COMPUTED`] when the metric gave up on that pair
    pub errors: BTreeMap<GtId, f64>,
}
impl ErrorRecord {
    /// Errors that were actually computed
    pub fn computed_errors(&self) -> impl Iterator<Item = (GtId, f64)> + '_ {
        self.errors
            .iter()
            .filter(|(_, e)| **e != ERROR_NOT_COMPUTED)
            .map(|(gt_id, e)| (*gt_id, *e))
    }
}

/// All error records of one scene, in evaluation order
pub type ErrorReport = Vec<ErrorRecord>;

/// Writes a scene report, creating parent directories as needed
pub fn save_errors(path: &Path, errors: &[ErrorRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| EvalError::io(parent, source))?;
    }
    let payload = serde_yaml::to_string(errors).map_err(|source| EvalError::YamlWrite {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, payload).map_err(|source| EvalError::io(path, source))
}

pub fn load_errors(path: &Path) -> Result<ErrorReport> {
    super::input::read_yaml(path)
}
