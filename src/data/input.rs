//! # Dataset and result inputs
//!
//! Everything the pipeline reads from disk passes through [`DatasetStore`], so the
//! driver never touches a file format directly.

use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    DepthMap, GroundTruthPose, ImageId, ImageInfo, ObjectId, ObjectModel, Pose, PoseEstimate,
    SceneGt, SceneId, SceneInfo,
};
use crate::error::{EvalError, Result};

/// Camera parameters shared by all test images of a dataset
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CameraParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Multiply stored depth values by this to get millimeters
    pub depth_scale: Option<f64>,
}

/// Boundary between the pipeline and the files it evaluates
///
/// `Sync` so that one store can feed concurrent scene workers.
pub trait DatasetStore: Sync {
    fn load_model(&self, path: &Path) -> Result<ObjectModel>;

    /// `None` when the dataset has no camera file, presets apply then
    fn load_camera(&self, path: &Path) -> Result<Option<CameraParams>>;

    fn load_scene_info(&self, path: &Path) -> Result<SceneInfo>;

    fn load_ground_truth(&self, path: &Path) -> Result<SceneGt>;

    /// Depth in store-native units
    fn load_depth(&self, path: &Path) -> Result<DepthMap>;

    /// Pose estimates of one result file, in file order
    fn load_result(&self, path: &Path, obj_id: ObjectId) -> Result<Vec<PoseEstimate>>;
}

/// Reads the SIXD file layout: YAML metadata, 16-bit PNG depth and PLY models
#[derive(Clone, Copy, Debug, Default)]
pub struct FileStore;

#[derive(Deserialize)]
struct RawImageInfo {
    #[serde(rename = "cam_K")]
    cam_k: [f64; 9],
}

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct RawGroundTruth {
    obj_id: ObjectId,
    cam_R_m2c: [f64; 9],
    cam_t_m2c: [f64; 3],
}

#[derive(Deserialize)]
struct RawResultFile {
    #[serde(default)]
    ests: Vec<RawEstimate>,
}

#[derive(Deserialize)]
struct RawEstimate {
    score: f64,
    #[serde(rename = "R")]
    r: [f64; 9],
    t: [f64; 3],
}

pub(crate) fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let payload = fs::read_to_string(path).map_err(|source| EvalError::io(path, source))?;
    serde_yaml::from_str(&payload).map_err(|source| EvalError::yaml(path, source))
}

impl DatasetStore for FileStore {
    fn load_model(&self, path: &Path) -> Result<ObjectModel> {
        super::ply::read_ply(path)
    }

    fn load_camera(&self, path: &Path) -> Result<Option<CameraParams>> {
        if !path.is_file() {
            return Ok(None);
        }
        read_yaml(path).map(Some)
    }

    fn load_scene_info(&self, path: &Path) -> Result<SceneInfo> {
        let raw: std::collections::BTreeMap<ImageId, RawImageInfo> = read_yaml(path)?;
        Ok(raw
            .into_iter()
            .map(|(im_id, info)| {
                (
                    im_id,
                    ImageInfo {
                        cam_k: nalgebra::Matrix3::from_row_slice(&info.cam_k),
                    },
                )
            })
            .collect())
    }

    fn load_ground_truth(&self, path: &Path) -> Result<SceneGt> {
        // An image without annotations is stored as `null` rather than `[]`
        let raw: std::collections::BTreeMap<ImageId, Option<Vec<RawGroundTruth>>> =
            read_yaml(path)?;
        Ok(raw
            .into_iter()
            .map(|(im_id, gts)| {
                let gts = gts
                    .unwrap_or_default()
                    .into_iter()
                    .map(|gt| GroundTruthPose {
                        obj_id: gt.obj_id,
                        pose: Pose::from_row_major(&gt.cam_R_m2c, &gt.cam_t_m2c),
                    })
                    .collect();
                (im_id, gts)
            })
            .collect())
    }

    fn load_depth(&self, path: &Path) -> Result<DepthMap> {
        let depth_im = image::open(path)
            .map_err(|source| EvalError::Image {
                path: path.to_path_buf(),
                source,
            })?
            .into_luma16();
        let (width, height) = depth_im.dimensions();
        let data = depth_im.into_raw().into_iter().map(f64::from).collect();
        DepthMap::new(width, height, data).ok_or_else(|| EvalError::DepthSize {
            path: path.to_path_buf(),
            width,
            height,
        })
    }

    fn load_result(&self, path: &Path, obj_id: ObjectId) -> Result<Vec<PoseEstimate>> {
        let raw: RawResultFile = read_yaml(path)?;
        Ok(raw
            .ests
            .into_iter()
            .map(|est| PoseEstimate {
                obj_id,
                pose: Pose::from_row_major(&est.r, &est.t),
                score: est.score,
            })
            .collect())
    }
}

fn scan_ids(stem: &str) -> std::result::Result<(ImageId, ObjectId), text_io::Error> {
    let (im_id, obj_id): (ImageId, ObjectId);
    text_io::try_scan!(stem.bytes() => "{}_{}", im_id, obj_id);
    Ok((im_id, obj_id))
}

/// Parses `<im_id>_<obj_id>` out of a result file name such as `0004_12.yml`
pub fn parse_result_file_name(path: &Path) -> Result<(ImageId, ObjectId)> {
    let name_error = |message: String| EvalError::ResultFileName {
        path: path.to_path_buf(),
        message,
    };
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| name_error("file name is not valid UTF-8".to_string()))?;
    // everything up to the first dot, so `0004_12.yml` and `0004_12.res.yml` agree
    let stem = file_name.split('.').next().unwrap_or(file_name);
    scan_ids(stem).map_err(|e| name_error(format!("{:?}", e)))
}

fn read_dir_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| EvalError::io(dir, source))?;
    entries
        .map(|entry| {
            entry
                .map(|e| e.path())
                .map_err(|source| EvalError::io(dir, source))
        })
        .collect()
}

/// Scene directories of a result set, ordered by numeric scene id
///
/// Entries whose name is not a number are skipped with a warning.
pub fn list_scene_dirs(result_path: &Path) -> Result<Vec<(SceneId, PathBuf)>> {
    let mut scenes = Vec::new();
    for path in read_dir_paths(result_path)? {
        if !path.is_dir() {
            continue;
        }
        match path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse::<SceneId>().ok())
        {
            Some(scene_id) => scenes.push((scene_id, path)),
            None => warn!("Skipping non-scene directory {}", path.display()),
        }
    }
    Ok(scenes.into_iter().sorted_by_key(|(scene_id, _)| *scene_id).collect())
}

/// Result files (`*.yml`) of one scene directory, ordered lexicographically
pub fn list_result_files(scene_dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(read_dir_paths(scene_dir)?
        .into_iter()
        .filter(|path| path.is_file() && path.extension().map_or(false, |ext| ext == "yml"))
        .sorted()
        .collect())
}
