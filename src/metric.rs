//! # Metric dispatch and error evaluation
//!
//! Each [`Metric`] variant declares what it needs besides the two poses
//! ([`Requirements`]); the driver only prepares those inputs.

use std::collections::BTreeMap;

use strum_macros::{Display, EnumString};

use crate::data::output::ERROR_NOT_COMPUTED;
use crate::data::{CamK, DepthMap, GroundTruthPose, GtId, ImageSize, ObjectModel, Pose, PoseEstimate};
use crate::error::{EvalError, Result};
use crate::pose_error::{self, VsdParams};

/// Pose error function names as used in configuration and output paths
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ErrorType {
    /// Visible surface discrepancy
    Vsd,
    /// Average distance, indistinguishable views
    Adi,
    /// Average distance, distinguishable views
    Add,
    /// Complement over union
    Cou,
    /// Rotational error
    Re,
    /// Translational error
    Te,
}

/// Inputs a metric needs besides the estimated and ground-truth pose
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Requirements {
    pub model: bool,
    pub depth: bool,
    pub camera: bool,
    pub image_size: bool,
}

/// A pose error function together with its parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Metric {
    Vsd(VsdParams),
    Adi,
    Add,
    Cou,
    Re,
    Te,
}

/// Per-image inputs handed to a metric; only the fields its [`Requirements`] ask for are set
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricContext<'a> {
    pub model: Option<&'a ObjectModel>,
    pub depth: Option<&'a DepthMap>,
    pub cam_k: Option<&'a CamK>,
    pub im_size: Option<ImageSize>,
}

impl Metric {
    pub fn new(error_type: ErrorType, vsd: VsdParams) -> Self {
        match error_type {
            ErrorType::Vsd => Metric::Vsd(vsd),
            ErrorType::Adi => Metric::Adi,
            ErrorType::Add => Metric::Add,
            ErrorType::Cou => Metric::Cou,
            ErrorType::Re => Metric::Re,
            ErrorType::Te => Metric::Te,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            Metric::Vsd(_) => ErrorType::Vsd,
            Metric::Adi => ErrorType::Adi,
            Metric::Add => ErrorType::Add,
            Metric::Cou => ErrorType::Cou,
            Metric::Re => ErrorType::Re,
            Metric::Te => ErrorType::Te,
        }
    }

    pub fn requirements(&self) -> Requirements {
        match self {
            Metric::Vsd(_) => Requirements {
                model: true,
                depth: true,
                camera: true,
                image_size: false,
            },
            Metric::Adi | Metric::Add => Requirements {
                model: true,
                ..Requirements::default()
            },
            Metric::Cou => Requirements {
                model: true,
                camera: true,
                image_size: true,
                ..Requirements::default()
            },
            Metric::Re | Metric::Te => Requirements::default(),
        }
    }

    /// `error=<type>` followed by the metric parameters, e.g. `error=vsd` + `_delta=15_tau=20`
    ///
    /// The selection policy is inserted between the two by [`crate::config::EvalSettings::error_sign`].
    pub fn signature(&self) -> (String, String) {
        let params = match self {
            Metric::Vsd(VsdParams { delta, tau, cost }) => match cost {
                pose_error::VsdCost::Step => format!("_delta={}_tau={}", delta, tau),
                other => format!("_delta={}_tau={}_cost={}", delta, tau, other),
            },
            _ => String::new(),
        };
        (format!("error={}", self.error_type()), params)
    }

    fn missing(&self, what: &'static str) -> EvalError {
        EvalError::MissingContext {
            metric: self.error_type().to_string(),
            what,
        }
    }

    /// Error of one estimated pose w.r.t. one ground-truth pose
    ///
    /// `Ok(None)` means the metric could not compute a value for this pair.
    /// `Err` only when the context lacks an input this metric requires.
    pub fn compute(&self, est: &Pose, gt: &Pose, ctx: &MetricContext) -> Result<Option<f64>> {
        let model = || ctx.model.ok_or_else(|| self.missing("an object model"));
        let cam_k = || ctx.cam_k.ok_or_else(|| self.missing("a camera matrix"));

        Ok(match self {
            Metric::Vsd(params) => {
                let depth = ctx.depth.ok_or_else(|| self.missing("a depth image"))?;
                pose_error::vsd(est, gt, model()?, depth, params, cam_k()?)
            }
            Metric::Adi => pose_error::adi(est, gt, model()?),
            Metric::Add => pose_error::add(est, gt, model()?),
            Metric::Cou => {
                let im_size = ctx.im_size.ok_or_else(|| self.missing("the image size"))?;
                pose_error::cou(est, gt, model()?, im_size, cam_k()?)
            }
            Metric::Re => pose_error::re(&est.r, &gt.r),
            Metric::Te => pose_error::te(&est.t, &gt.t),
        })
    }
}

/// Errors of one estimate w.r.t. each matched ground-truth pose, keyed like `matched`
///
/// Values the metric cannot compute are stored as [`ERROR_NOT_COMPUTED`].
pub fn evaluate(
    metric: &Metric,
    est: &PoseEstimate,
    matched: &BTreeMap<GtId, &GroundTruthPose>,
    ctx: &MetricContext,
) -> Result<BTreeMap<GtId, f64>> {
    matched
        .iter()
        .map(|(gt_id, gt)| {
            let e = metric.compute(&est.pose, &gt.pose, ctx)?;
            Ok((*gt_id, e.unwrap_or(ERROR_NOT_COMPUTED)))
        })
        .collect()
}
