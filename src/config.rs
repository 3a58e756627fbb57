//! # Run configuration
//!
//! [`EvalConfig`] is what the user writes (YAML file and/or command line);
//! [`EvalSettings`] is the validated, immutable form the driver runs with.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::input::read_yaml;
use crate::error::{EvalError, Result};
use crate::metric::{ErrorType, Metric};
use crate::pose_error::{VsdCost, VsdParams};
use crate::selection::NTop;

/// Configuration of an error calculation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Folder holding one sub-folder per dataset
    #[serde(default = "default_datasets_path")]
    pub datasets_path: PathBuf,
    /// Result sets to evaluate, each named `<method>_<dataset>[_<test_type>]`
    #[serde(default)]
    pub result_paths: Vec<PathBuf>,
    /// 0 = all estimates, -1 = as many as GT poses, N = top N
    #[serde(default = "default_n_top")]
    pub n_top: i64,
    /// One of vsd, adi, add, cou, re, te
    #[serde(default = "default_error_type")]
    pub error_type: String,
    #[serde(default)]
    pub vsd: VsdConfig,
    /// Keep going when a scene fails, instead of aborting the run
    #[serde(default)]
    pub isolate_scene_failures: bool,
    /// Evaluate the scenes of a result set concurrently
    #[serde(default)]
    pub parallel_scenes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VsdConfig {
    #[serde(default = "default_vsd_delta")]
    pub delta: f64,
    #[serde(default = "default_vsd_tau")]
    pub tau: f64,
    /// step or tlinear
    #[serde(default = "default_vsd_cost")]
    pub cost: String,
}

fn default_datasets_path() -> PathBuf {
    PathBuf::from("./datasets")
}

fn default_n_top() -> i64 {
    1
}

fn default_error_type() -> String {
    "vsd".to_string()
}

fn default_vsd_delta() -> f64 {
    15.0
}

fn default_vsd_tau() -> f64 {
    20.0
}

fn default_vsd_cost() -> String {
    "step".to_string()
}

impl Default for VsdConfig {
    fn default() -> Self {
        Self {
            delta: default_vsd_delta(),
            tau: default_vsd_tau(),
            cost: default_vsd_cost(),
        }
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            datasets_path: default_datasets_path(),
            result_paths: Vec::new(),
            n_top: default_n_top(),
            error_type: default_error_type(),
            vsd: VsdConfig::default(),
            isolate_scene_failures: false,
            parallel_scenes: false,
        }
    }
}

/// Validated run settings, fixed for the whole run
#[derive(Debug, Clone)]
pub struct EvalSettings {
    pub datasets_path: PathBuf,
    pub result_paths: Vec<PathBuf>,
    pub n_top: NTop,
    pub metric: Metric,
    pub isolate_scene_failures: bool,
    pub parallel_scenes: bool,
}

impl EvalConfig {
    pub fn load(path: &Path) -> Result<Self> {
        read_yaml(path)
    }

    /// Checks every setting; nothing is evaluated with a configuration that fails here
    pub fn resolve(&self) -> Result<EvalSettings> {
        let error_type = ErrorType::from_str(&self.error_type)
            .map_err(|_| EvalError::UnsupportedErrorType(self.error_type.clone()))?;
        let cost = VsdCost::from_str(&self.vsd.cost)
            .map_err(|_| EvalError::UnsupportedVsdCost(self.vsd.cost.clone()))?;
        if error_type == ErrorType::Vsd && !(self.vsd.delta >= 0.0 && self.vsd.tau > 0.0) {
            return Err(EvalError::InvalidConfig(format!(
                "VSD needs delta >= 0 and tau > 0 (got delta={}, tau={})",
                self.vsd.delta, self.vsd.tau
            )));
        }
        if self.result_paths.is_empty() {
            return Err(EvalError::InvalidConfig("no result paths given".to_string()));
        }

        Ok(EvalSettings {
            datasets_path: self.datasets_path.clone(),
            result_paths: self.result_paths.clone(),
            n_top: NTop::try_from(self.n_top)?,
            metric: Metric::new(
                error_type,
                VsdParams {
                    delta: self.vsd.delta,
                    tau: self.vsd.tau,
                    cost,
                },
            ),
            isolate_scene_failures: self.isolate_scene_failures,
            parallel_scenes: self.parallel_scenes,
        })
    }
}

impl EvalSettings {
    /// Names the output folder, e.g. `error=vsd_ntop=1_delta=15_tau=20`
    pub fn error_sign(&self) -> String {
        let (kind, params) = self.metric.signature();
        format!("{}_ntop={}{}", kind, self.n_top, params)
    }
}
