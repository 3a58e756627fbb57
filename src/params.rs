//! # Dataset parameters and path layout

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use derive_more::Display;
use log::debug;
use once_cell::sync::Lazy;

use crate::data::input::DatasetStore;
use crate::data::{ImageId, ImageSize, ObjectId, SceneId};
use crate::error::{EvalError, Result};
use crate::metric::ErrorType;

struct DatasetPreset {
    obj_count: u32,
    /// Test image size per test type, `""` being the default test set
    test_im_sizes: &'static [(&'static str, ImageSize)],
    /// Used when the camera file does not state a depth scale
    depth_scale: f64,
}

const VGA: ImageSize = ImageSize {
    width: 640,
    height: 480,
};

static PRESETS: Lazy<BTreeMap<&'static str, DatasetPreset>> = Lazy::new(|| {
    let vga = |obj_count| DatasetPreset {
        obj_count,
        test_im_sizes: &[("", VGA)],
        depth_scale: 1.0,
    };
    let mut presets = BTreeMap::new();
    presets.insert("hinterstoisser", vga(15));
    presets.insert("tudlight", vga(3));
    presets.insert("rutgers", vga(14));
    presets.insert("tejani", vga(6));
    presets.insert("doumanoglou", vga(2));
    presets.insert("toyotalight", vga(21));
    presets.insert(
        "tless",
        DatasetPreset {
            obj_count: 30,
            test_im_sizes: &[
                ("primesense", ImageSize { width: 720, height: 540 }),
                ("kinect", ImageSize { width: 720, height: 540 }),
                ("canon", ImageSize { width: 2560, height: 1920 }),
            ],
            depth_scale: 0.1,
        },
    );
    presets
});

/// Identity of a result set, parsed from its folder name `<method>_<dataset>[_<test_type>]`
#[derive(Clone, Debug, PartialEq, Eq, Display)]
#[display(fmt = "{}, {}, {}", method, dataset, test_type)]
pub struct ResultSetInfo {
    pub method: String,
    pub dataset: String,
    pub test_type: String,
}
impl ResultSetInfo {
    pub fn parse(result_path: &Path) -> Result<Self> {
        let name = result_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| EvalError::ResultSetName(result_path.display().to_string()))?;
        let mut parts = name.split('_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(dataset), test_type) if !method.is_empty() && !dataset.is_empty() => {
                Ok(Self {
                    method: method.to_string(),
                    dataset: dataset.to_string(),
                    test_type: test_type.unwrap_or_default().to_string(),
                })
            }
            _ => Err(EvalError::ResultSetName(name.to_string())),
        }
    }

    /// T-LESS ships several model variants; the distance metrics use the denser one
    pub fn model_type(&self, error_type: ErrorType) -> &'static str {
        match (self.dataset.as_str(), error_type) {
            ("tless", ErrorType::Adi) | ("tless", ErrorType::Add) => "cad_subdivided",
            ("tless", _) => "cad",
            _ => "",
        }
    }

    /// T-LESS test sets are named after the camera that captured them
    pub fn cam_type(&self) -> &str {
        if self.dataset == "tless" {
            &self.test_type
        } else {
            ""
        }
    }
}

/// Where the files of one dataset variant live, and how to interpret them
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetParams {
    pub base_path: PathBuf,
    pub obj_count: u32,
    pub test_im_size: ImageSize,
    /// Multiply stored depth values by this to get millimeters
    pub depth_scale: f64,
    models_dir: String,
    test_dir: String,
}

/// `name` or `name_<variant>` when a variant is given
fn variant_dir(name: &str, variant: &str) -> String {
    if variant.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", name, variant)
    }
}

impl DatasetParams {
    pub fn resolve<S: DatasetStore + ?Sized>(
        datasets_path: &Path,
        dataset: &str,
        model_type: &str,
        test_type: &str,
        cam_type: &str,
        store: &S,
    ) -> Result<Self> {
        let preset = PRESETS
            .get(dataset)
            .ok_or_else(|| EvalError::UnknownDataset(dataset.to_string()))?;
        let mut test_im_size = match preset.test_im_sizes.iter().find(|(name, _)| *name == test_type) {
            Some((_, size)) => *size,
            // datasets with a single test set accept any test type name
            None => match preset.test_im_sizes {
                [("", size)] => *size,
                _ => {
                    return Err(EvalError::UnknownTestType {
                        dataset: dataset.to_string(),
                        test_type: test_type.to_string(),
                    })
                }
            },
        };

        let base_path = datasets_path.join(dataset);
        let mut depth_scale = preset.depth_scale;
        let cam_path = base_path.join(format!("{}.yml", variant_dir("camera", cam_type)));
        match store.load_camera(&cam_path)? {
            Some(cam) => {
                if let Some(scale) = cam.depth_scale {
                    depth_scale = scale;
                }
                if let (Some(width), Some(height)) = (cam.width, cam.height) {
                    test_im_size = ImageSize::new(width, height);
                }
            }
            None => debug!("No camera file at {}, using preset parameters", cam_path.display()),
        }

        Ok(Self {
            base_path,
            obj_count: preset.obj_count,
            test_im_size,
            depth_scale,
            models_dir: variant_dir("models", model_type),
            test_dir: variant_dir("test", test_type),
        })
    }

    pub fn obj_ids(&self) -> impl Iterator<Item = ObjectId> {
        1..=self.obj_count
    }

    pub fn model_path(&self, obj_id: ObjectId) -> PathBuf {
        self.base_path
            .join(&self.models_dir)
            .join(format!("obj_{:02}.ply", obj_id))
    }

    fn scene_dir(&self, scene_id: SceneId) -> PathBuf {
        self.base_path
            .join(&self.test_dir)
            .join(format!("{:02}", scene_id))
    }

    pub fn scene_info_path(&self, scene_id: SceneId) -> PathBuf {
        self.scene_dir(scene_id).join("info.yml")
    }

    pub fn scene_gt_path(&self, scene_id: SceneId) -> PathBuf {
        self.scene_dir(scene_id).join("gt.yml")
    }

    pub fn depth_path(&self, scene_id: SceneId, im_id: ImageId) -> PathBuf {
        self.scene_dir(scene_id)
            .join("depth")
            .join(format!("{:04}.png", im_id))
    }
}

/// `<result_path>_eval/<error_sign>/errors_<scene_id>.yml`
pub fn errors_path(result_path: &Path, error_sign: &str, scene_id: SceneId) -> PathBuf {
    let name = result_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    result_path
        .with_file_name(format!("{}_eval", name))
        .join(error_sign)
        .join(format!("errors_{:02}.yml", scene_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::input::{CameraParams, FileStore};
    use crate::data::{DepthMap, ObjectModel, PoseEstimate, SceneGt, SceneInfo};

    #[test]
    fn result_set_name_is_split_into_parts() {
        let info = ResultSetInfo::parse(Path::new("/r/hodan-iros15_tless_primesense")).unwrap();
        assert_eq!(info.method, "hodan-iros15");
        assert_eq!(info.dataset, "tless");
        assert_eq!(info.test_type, "primesense");
        assert_eq!(info.cam_type(), "primesense");
        assert_eq!(info.model_type(ErrorType::Adi), "cad_subdivided");
        assert_eq!(info.model_type(ErrorType::Vsd), "cad");

        let info = ResultSetInfo::parse(Path::new("/r/brachmann_hinterstoisser")).unwrap();
        assert!(info.test_type.is_empty());
        assert_eq!(info.model_type(ErrorType::Add), "");
        assert_eq!(info.cam_type(), "");
    }

    #[test]
    fn result_set_without_dataset_is_rejected() {
        assert!(ResultSetInfo::parse(Path::new("/r/method")).is_err());
    }

    #[test]
    fn preset_paths_follow_dataset_layout() {
        let dp = DatasetParams::resolve(
            Path::new("/nonexistent"),
            "tless",
            "cad",
            "primesense",
            "primesense",
            &FileStore,
        )
        .unwrap();
        assert_eq!(dp.obj_count, 30);
        assert_eq!(dp.test_im_size, ImageSize::new(720, 540));
        assert_eq!(
            dp.model_path(7),
            Path::new("/nonexistent/tless/models_cad/obj_07.ply")
        );
        assert_eq!(
            dp.depth_path(3, 12),
            Path::new("/nonexistent/tless/test_primesense/03/depth/0012.png")
        );
        assert_eq!(
            dp.scene_gt_path(3),
            Path::new("/nonexistent/tless/test_primesense/03/gt.yml")
        );
    }

    #[test]
    fn unknown_dataset_and_test_type_are_rejected() {
        let root = Path::new("/nonexistent");
        assert!(matches!(
            DatasetParams::resolve(root, "kitti", "", "", "", &FileStore),
            Err(EvalError::UnknownDataset(_))
        ));
        assert!(matches!(
            DatasetParams::resolve(root, "tless", "cad", "realsense", "realsense", &FileStore),
            Err(EvalError::UnknownTestType { .. })
        ));
    }

    #[test]
    fn camera_file_overrides_depth_scale() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("hinterstoisser");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("camera.yml"), "width: 640\nheight: 480\ndepth_scale: 0.5\n").unwrap();

        let dp = DatasetParams::resolve(dir.path(), "hinterstoisser", "", "", "", &FileStore).unwrap();
        assert_eq!(dp.depth_scale, 0.5);
        assert_eq!(dp.test_im_size, VGA);
    }

    /// Serves camera parameters for a single path, nothing is on disk
    struct CameraOnlyStore {
        path: PathBuf,
        camera: CameraParams,
    }

    impl DatasetStore for CameraOnlyStore {
        fn load_model(&self, _: &Path) -> Result<ObjectModel> {
            unimplemented!()
        }

        fn load_camera(&self, path: &Path) -> Result<Option<CameraParams>> {
            Ok((path == self.path).then(|| self.camera.clone()))
        }

        fn load_scene_info(&self, _: &Path) -> Result<SceneInfo> {
            unimplemented!()
        }

        fn load_ground_truth(&self, _: &Path) -> Result<SceneGt> {
            unimplemented!()
        }

        fn load_depth(&self, _: &Path) -> Result<DepthMap> {
            unimplemented!()
        }

        fn load_result(&self, _: &Path, _: ObjectId) -> Result<Vec<PoseEstimate>> {
            unimplemented!()
        }
    }

    #[test]
    fn camera_parameters_come_from_the_store() {
        let store = CameraOnlyStore {
            path: PathBuf::from("/nonexistent/tless/camera_kinect.yml"),
            camera: CameraParams {
                width: Some(100),
                height: Some(50),
                depth_scale: Some(0.25),
            },
        };
        let dp = DatasetParams::resolve(Path::new("/nonexistent"), "tless", "cad", "kinect", "kinect", &store).unwrap();
        assert_eq!(dp.depth_scale, 0.25);
        assert_eq!(dp.test_im_size, ImageSize::new(100, 50));

        // another camera type has no file, so the preset stays
        let dp = DatasetParams::resolve(
            Path::new("/nonexistent"),
            "tless",
            "cad",
            "primesense",
            "primesense",
            &store,
        )
        .unwrap();
        assert_eq!(dp.depth_scale, 0.1);
        assert_eq!(dp.test_im_size, ImageSize::new(720, 540));
    }

    #[test]
    fn errors_path_sits_next_to_result_set() {
        let path = errors_path(Path::new("/r/m_hinterstoisser"), "error=re_ntop=1", 4);
        assert_eq!(path, Path::new("/r/m_hinterstoisser_eval/error=re_ntop=1/errors_04.yml"));
    }
}
