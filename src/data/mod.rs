//! # Data model shared by the evaluation pipeline

use std::collections::BTreeMap;

use derive_more::Display;
use nalgebra::{Matrix3, Point3, Vector3};

pub type SceneId = u32;
pub type ImageId = u32;
pub type ObjectId = u32;
/// Position of a ground-truth pose in the per-image ground-truth list
pub type GtId = usize;
/// Position of a pose estimate in its result file, before any sorting
pub type EstId = usize;

/// Camera intrinsic matrix K
pub type CamK = Matrix3<f64>;

/*
    All poses map model coordinates into the camera frame:

        x_c = R * x_m + t

                 z (optical axis)
                /
               /
      O_c ----+------ x          u = fx * x_c / z_c + cx
              |                  v = fy * y_c / z_c + cy
              |
              y

    Rotations are stored row-major in every file format this crate reads,
    translations are in millimeters.
*/

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub r: Matrix3<f64>,
    pub t: Vector3<f64>,
}
impl Pose {
    pub fn new(r: Matrix3<f64>, t: Vector3<f64>) -> Self {
        Self { r, t }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }

    /// Builds a pose from a row-major 3x3 rotation and a translation vector
    pub fn from_row_major(r: &[f64; 9], t: &[f64; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(r), Vector3::from_row_slice(t))
    }

    /// Transforms a model point into the camera frame
    #[inline]
    pub fn transform(&self, pt: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.r * pt.coords + self.t)
    }
}

/// One pose claimed by the evaluated method for one object instance
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseEstimate {
    pub obj_id: ObjectId,
    pub pose: Pose,
    /// Confidence reported by the method, higher is better
    pub score: f64,
}

/// One annotated object instance of an image
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundTruthPose {
    pub obj_id: ObjectId,
    pub pose: Pose,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[display(fmt = "{}x{}", width, height)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}
impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Per-image metadata of a scene
#[derive(Clone, Debug, PartialEq)]
pub struct ImageInfo {
    pub cam_k: CamK,
}

pub type SceneInfo = BTreeMap<ImageId, ImageInfo>;
/// Ordered ground-truth poses of every image of a scene
pub type SceneGt = BTreeMap<ImageId, Vec<GroundTruthPose>>;

/// Row-major depth image, values in whatever unit the owner states
#[derive(Clone, Debug, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    data: Vec<f64>,
}
impl DepthMap {
    /// Returns `None` when `data` does not hold exactly `width * height` values
    pub fn new(width: u32, height: u32, data: Vec<f64>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self { width, height, data })
    }

    /// All-zero map, i.e. no depth measured anywhere
    pub fn zeros(size: ImageSize) -> Self {
        Self {
            width: size.width,
            height: size.height,
            data: vec![0f64; size.width as usize * size.height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    #[inline]
    pub fn get(&self, u: u32, v: u32) -> f64 {
        self.data[v as usize * self.width as usize + u as usize]
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Multiplies every value by `factor`, e.g. to convert a store-native unit to millimeters
    pub fn scaled(mut self, factor: f64) -> Self {
        self.data.iter_mut().for_each(|d| *d *= factor);
        self
    }
}

/// Vertices of a 3D object model, in millimeters
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectModel {
    pub pts: Vec<Point3<f64>>,
}

/// Models of every object of a dataset, loaded once per result set
pub type ModelTable = BTreeMap<ObjectId, ObjectModel>;

pub mod input;

pub mod output;

mod ply;
