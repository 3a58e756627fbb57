#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{ImageBuffer, Luma};
use sixd_eval::data::input::CameraParams;
use sixd_eval::data::{DepthMap, ObjectId, ObjectModel, PoseEstimate, SceneGt, SceneInfo};
use sixd_eval::{DatasetStore, EvalConfig, EvalSettings, FileStore, Result};
use tempfile::TempDir;

pub const DATASET: &str = "hinterstoisser";
pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;
pub const CAM_K: &str = "[100, 0, 32, 0, 100, 24, 0, 0, 1]";
pub const IDENTITY: &str = "[1, 0, 0, 0, 1, 0, 0, 0, 1]";
/// 90 degrees about the camera z axis
pub const ROT_Z_90: &str = "[0, -1, 0, 1, 0, 0, 0, 0, 1]";

/// 20 mm cube, corners only
const CUBE_PLY: &str = "ply
format ascii 1.0
element vertex 8
property float x
property float y
property float z
end_header
-10 -10 -10
10 -10 -10
10 10 -10
-10 10 -10
-10 -10 10
10 -10 10
10 10 10
-10 10 10
";

/// A miniature SIXD dataset plus one result set, in a temporary folder
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let fixture = Fixture {
            dir: tempfile::tempdir().unwrap(),
        };
        let base = fixture.dataset_path();
        fs::create_dir_all(base.join("models")).unwrap();
        fs::write(
            base.join("camera.yml"),
            format!("width: {}\nheight: {}\ndepth_scale: 1.0\n", WIDTH, HEIGHT),
        )
        .unwrap();
        for obj_id in 1..=15 {
            fs::write(base.join("models").join(format!("obj_{:02}.ply", obj_id)), CUBE_PLY).unwrap();
        }
        fs::create_dir_all(fixture.result_path()).unwrap();
        fixture
    }

    pub fn datasets_path(&self) -> PathBuf {
        self.dir.path().join("datasets")
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.datasets_path().join(DATASET)
    }

    pub fn result_path(&self) -> PathBuf {
        self.dir.path().join("results").join(format!("method_{}", DATASET))
    }

    pub fn scene_path(&self, scene_id: u32) -> PathBuf {
        self.dataset_path().join("test").join(format!("{:02}", scene_id))
    }

    /// Scene metadata for images `0..n_images`, all sharing [`CAM_K`]
    pub fn write_scene_info(&self, scene_id: u32, n_images: u32) {
        let info: String = (0..n_images)
            .map(|im_id| format!("{}: {{cam_K: {}}}\n", im_id, CAM_K))
            .collect();
        let scene = self.scene_path(scene_id);
        fs::create_dir_all(&scene).unwrap();
        fs::write(scene.join("info.yml"), info).unwrap();
    }

    /// `gts` lists `(im_id, obj_id, rotation, z translation)`
    pub fn write_gt(&self, scene_id: u32, gts: &[(u32, ObjectId, &str, f64)]) {
        let mut yaml = String::new();
        let mut last_im = None;
        for (im_id, obj_id, r, z) in gts {
            if last_im != Some(*im_id) {
                yaml.push_str(&format!("{}:\n", im_id));
                last_im = Some(*im_id);
            }
            yaml.push_str(&format!(
                "- {{obj_id: {}, cam_R_m2c: {}, cam_t_m2c: [0, 0, {}]}}\n",
                obj_id, r, z
            ));
        }
        let scene = self.scene_path(scene_id);
        fs::create_dir_all(&scene).unwrap();
        fs::write(scene.join("gt.yml"), yaml).unwrap();
    }

    /// Flat depth image, `depth` in millimeters everywhere
    pub fn write_depth(&self, scene_id: u32, im_id: u32, depth: u16) {
        let dir = self.scene_path(scene_id).join("depth");
        fs::create_dir_all(&dir).unwrap();
        ImageBuffer::<Luma<u16>, Vec<u16>>::from_pixel(WIDTH, HEIGHT, Luma([depth]))
            .save(dir.join(format!("{:04}.png", im_id)))
            .unwrap();
    }

    /// `ests` lists `(score, rotation, z translation)`
    pub fn write_result(&self, scene_id: u32, im_id: u32, obj_id: ObjectId, ests: &[(f64, &str, f64)]) {
        let dir = self.result_path().join(format!("{:02}", scene_id));
        fs::create_dir_all(&dir).unwrap();
        let mut yaml = String::from("run_time: 0.1\nests:\n");
        for (score, r, z) in ests {
            yaml.push_str(&format!("- {{score: {}, R: {}, t: [0, 0, {}]}}\n", score, r, z));
        }
        fs::write(dir.join(format!("{:04}_{:02}.yml", im_id, obj_id)), yaml).unwrap();
    }

    pub fn config(&self, error_type: &str, n_top: i64) -> EvalConfig {
        EvalConfig {
            datasets_path: self.datasets_path(),
            result_paths: vec![self.result_path()],
            n_top,
            error_type: error_type.to_string(),
            ..EvalConfig::default()
        }
    }

    pub fn settings(&self, error_type: &str, n_top: i64) -> EvalSettings {
        self.config(error_type, n_top).resolve().unwrap()
    }

    pub fn errors_file(&self, error_sign: &str, scene_id: u32) -> PathBuf {
        self.dir
            .path()
            .join("results")
            .join(format!("method_{}_eval", DATASET))
            .join(error_sign)
            .join(format!("errors_{:02}.yml", scene_id))
    }
}

/// [`FileStore`] that counts how often each kind of input is read
#[derive(Default)]
pub struct CountingStore {
    pub depth_loads: AtomicUsize,
    pub model_loads: AtomicUsize,
}

impl CountingStore {
    pub fn depth_loads(&self) -> usize {
        self.depth_loads.load(Ordering::SeqCst)
    }

    pub fn model_loads(&self) -> usize {
        self.model_loads.load(Ordering::SeqCst)
    }
}

impl DatasetStore for CountingStore {
    fn load_model(&self, path: &Path) -> Result<ObjectModel> {
        self.model_loads.fetch_add(1, Ordering::SeqCst);
        FileStore.load_model(path)
    }

    fn load_camera(&self, path: &Path) -> Result<Option<CameraParams>> {
        FileStore.load_camera(path)
    }

    fn load_scene_info(&self, path: &Path) -> Result<SceneInfo> {
        FileStore.load_scene_info(path)
    }

    fn load_ground_truth(&self, path: &Path) -> Result<SceneGt> {
        FileStore.load_ground_truth(path)
    }

    fn load_depth(&self, path: &Path) -> Result<DepthMap> {
        self.depth_loads.fetch_add(1, Ordering::SeqCst);
        FileStore.load_depth(path)
    }

    fn load_result(&self, path: &Path, obj_id: ObjectId) -> Result<Vec<PoseEstimate>> {
        FileStore.load_result(path, obj_id)
    }
}
