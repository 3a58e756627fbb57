use std::path::PathBuf;

use thiserror::Error;

use crate::data::{ImageId, ObjectId, SceneId};

/// Errors that abort an evaluation run (or, with scene isolation on, one scene of it)
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse YAML file '{path}': {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to serialize YAML for '{path}': {source}")]
    YamlWrite {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to decode depth image '{path}': {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("depth image '{path}' does not hold {width}x{height} values")]
    DepthSize {
        path: PathBuf,
        width: u32,
        height: u32,
    },

    #[error("invalid PLY model '{path}': {message}")]
    Ply { path: PathBuf, message: String },

    #[error("result file name '{path}' is not of the form <im_id>_<obj_id>: {message}")]
    ResultFileName { path: PathBuf, message: String },

    #[error("result set name '{0}' is not of the form <method>_<dataset>[_<test_type>]")]
    ResultSetName(String),

    #[error("unsupported error type '{0}' (expected one of vsd, adi, add, cou, re, te)")]
    UnsupportedErrorType(String),

    #[error("unsupported VSD cost '{0}' (expected step or tlinear)")]
    UnsupportedVsdCost(String),

    #[error("invalid n_top {0} (expected 0, -1 or a positive integer)")]
    InvalidNTop(i64),

    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("unknown test type '{test_type}' for dataset '{dataset}'")]
    UnknownTestType { dataset: String, test_type: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("scene {scene_id}: image {im_id} has no entry in '{path}'")]
    MissingImage {
        scene_id: SceneId,
        im_id: ImageId,
        path: PathBuf,
    },

    #[error("no model loaded for object {0}")]
    MissingModel(ObjectId),

    #[error("metric '{metric}' requires {what}, which was not provided")]
    MissingContext { metric: String, what: &'static str },

    #[error("scene {scene_id}, image {im_id}, object {obj_id} ('{path}'): {source}")]
    ResultFile {
        scene_id: SceneId,
        im_id: ImageId,
        obj_id: ObjectId,
        path: PathBuf,
        #[source]
        source: Box<EvalError>,
    },

    #[error("scene {scene_id}: {source}")]
    Scene {
        scene_id: SceneId,
        #[source]
        source: Box<EvalError>,
    },
}

impl EvalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EvalError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        EvalError::Yaml {
            path: path.into(),
            source,
        }
    }

    /// Attaches the scene to errors that do not name it yet
    pub(crate) fn in_scene(self, scene_id: SceneId) -> Self {
        match self {
            EvalError::ResultFile { .. } | EvalError::Scene { .. } => self,
            source => EvalError::Scene {
                scene_id,
                source: Box::new(source),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
