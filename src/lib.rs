pub mod config;
pub mod data;
pub mod depth_cache;
pub mod error;
pub mod matching;
pub mod metric;
pub mod params;
pub mod pose_error;
pub mod selection;

use std::fmt;
use std::path::{Path, PathBuf};

use derive_more::Display;
use log::{info, warn};
use rayon::prelude::*;

use crate::data::input::{list_result_files, list_scene_dirs, parse_result_file_name};
use crate::data::output::{save_errors, ErrorRecord, ErrorReport};
use crate::data::{ImageId, ModelTable, ObjectId, ObjectModel, SceneGt, SceneId, SceneInfo};
use crate::depth_cache::DepthCache;
use crate::matching::match_gt;
use crate::metric::{evaluate, MetricContext};
use crate::params::{errors_path, DatasetParams, ResultSetInfo};
use crate::selection::select_estimates;

pub use crate::config::{EvalConfig, EvalSettings};
pub use crate::data::input::{DatasetStore, FileStore};
pub use crate::error::{EvalError, Result};

/// A scene whose report was written
#[derive(Clone, Debug, PartialEq)]
pub struct SceneSummary {
    pub scene_id: SceneId,
    pub records: usize,
    pub errors_path: PathBuf,
}
impl fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scene {:02}: {} records -> {}",
            self.scene_id,
            self.records,
            self.errors_path.display()
        )
    }
}

/// A scene that was skipped because evaluating it failed
#[derive(Clone, Debug, PartialEq, Display)]
#[display(fmt = "scene {:02} failed: {}", scene_id, message)]
pub struct SceneFailure {
    pub scene_id: SceneId,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResultSetSummary {
    pub result_path: PathBuf,
    pub scenes: Vec<SceneSummary>,
    pub failures: Vec<SceneFailure>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub error_sign: String,
    pub result_sets: Vec<ResultSetSummary>,
}
impl RunSummary {
    pub fn records(&self) -> usize {
        self.result_sets
            .iter()
            .flat_map(|set| set.scenes.iter())
            .map(|scene| scene.records)
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SceneFailure> {
        self.result_sets.iter().flat_map(|set| set.failures.iter())
    }
}

/// A result set whose dataset parameters were resolved
struct ResultSetJob {
    result_path: PathBuf,
    info: ResultSetInfo,
    params: DatasetParams,
}

struct SceneData {
    scene_id: SceneId,
    info: SceneInfo,
    info_path: PathBuf,
    gt: SceneGt,
    gt_path: PathBuf,
}

/// Computes pose errors for every result set of a run and writes one report per scene
pub struct ErrorCalculator<'a, S: DatasetStore + ?Sized> {
    store: &'a S,
    settings: EvalSettings,
}

impl<'a, S: DatasetStore + ?Sized> ErrorCalculator<'a, S> {
    pub fn new(store: &'a S, settings: EvalSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &EvalSettings {
        &self.settings
    }

    pub fn run(&self) -> Result<RunSummary> {
        let error_sign = self.settings.error_sign();

        // dataset problems of any result set fail the run before a single scene is touched
        let jobs = self
            .settings
            .result_paths
            .iter()
            .map(|result_path| self.prepare(result_path))
            .collect::<Result<Vec<_>>>()?;

        let mut result_sets = Vec::with_capacity(jobs.len());
        for job in &jobs {
            result_sets.push(self.evaluate_result_set(job, &error_sign)?);
        }
        Ok(RunSummary {
            error_sign,
            result_sets,
        })
    }

    fn prepare(&self, result_path: &Path) -> Result<ResultSetJob> {
        let info = ResultSetInfo::parse(result_path)?;
        let error_type = self.settings.metric.error_type();
        let params = DatasetParams::resolve(
            &self.settings.datasets_path,
            &info.dataset,
            info.model_type(error_type),
            &info.test_type,
            info.cam_type(),
            self.store,
        )?;
        Ok(ResultSetJob {
            result_path: result_path.to_path_buf(),
            info,
            params,
        })
    }

    fn load_models(&self, params: &DatasetParams) -> Result<ModelTable> {
        if !self.settings.metric.requirements().model {
            return Ok(ModelTable::new());
        }
        info!("Loading {} object models...", params.obj_count);
        params
            .obj_ids()
            .map(|obj_id| -> Result<(ObjectId, ObjectModel)> {
                Ok((obj_id, self.store.load_model(&params.model_path(obj_id))?))
            })
            .collect()
    }

    fn evaluate_result_set(&self, job: &ResultSetJob, error_sign: &str) -> Result<ResultSetSummary> {
        info!("Evaluating result set {} ({})", job.result_path.display(), job.info);
        let models = self.load_models(&job.params)?;
        let scenes = list_scene_dirs(&job.result_path)?;

        let run_scene = |(scene_id, scene_dir): &(SceneId, PathBuf)| {
            let outcome = self
                .evaluate_scene(job, &models, *scene_id, scene_dir)
                .and_then(|report| {
                    let path = errors_path(&job.result_path, error_sign, *scene_id);
                    save_errors(&path, &report)?;
                    info!("Saved {} error records to {}", report.len(), path.display());
                    Ok(SceneSummary {
                        scene_id: *scene_id,
                        records: report.len(),
                        errors_path: path,
                    })
                })
                .map_err(|e| e.in_scene(*scene_id));
            (*scene_id, outcome)
        };

        let mut summary = ResultSetSummary {
            result_path: job.result_path.clone(),
            scenes: Vec::new(),
            failures: Vec::new(),
        };
        if self.settings.parallel_scenes {
            let outcomes: Vec<_> = scenes.par_iter().map(&run_scene).collect();
            self.collect_outcomes(&mut summary, outcomes)?;
        } else {
            // lazy, so that without isolation the first failure stops the scene loop
            self.collect_outcomes(&mut summary, scenes.iter().map(&run_scene))?;
        }
        Ok(summary)
    }

    fn collect_outcomes(
        &self,
        summary: &mut ResultSetSummary,
        outcomes: impl IntoIterator<Item = (SceneId, Result<SceneSummary>)>,
    ) -> Result<()> {
        for (scene_id, outcome) in outcomes {
            match outcome {
                Ok(scene) => summary.scenes.push(scene),
                Err(e) if self.settings.isolate_scene_failures => {
                    let message = match e {
                        EvalError::Scene { source, .. } => source.to_string(),
                        e => e.to_string(),
                    };
                    warn!("Skipping scene {} of {}: {}", scene_id, summary.result_path.display(), message);
                    summary.failures.push(SceneFailure { scene_id, message });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn evaluate_scene(
        &self,
        job: &ResultSetJob,
        models: &ModelTable,
        scene_id: SceneId,
        scene_dir: &Path,
    ) -> Result<ErrorReport> {
        let info_path = job.params.scene_info_path(scene_id);
        let gt_path = job.params.scene_gt_path(scene_id);
        let scene = SceneData {
            scene_id,
            info: self.store.load_scene_info(&info_path)?,
            info_path,
            gt: self.store.load_ground_truth(&gt_path)?,
            gt_path,
        };
        let mut depth_cache = DepthCache::new(self.store, &job.params);

        let mut report = ErrorReport::new();
        for (res_i, path) in list_result_files(scene_dir)?.iter().enumerate() {
            let (im_id, obj_id) = parse_result_file_name(path)?;
            if res_i % 10 == 0 {
                info!(
                    "Calculating error: {}, {}, {}, {}, scene {}, image {}, object {}",
                    self.settings.metric.error_type(),
                    job.info.method,
                    job.info.dataset,
                    job.info.test_type,
                    scene_id,
                    im_id,
                    obj_id
                );
            }
            let records = self
                .evaluate_result_file(job, models, &scene, &mut depth_cache, path, im_id, obj_id)
                .map_err(|source| EvalError::ResultFile {
                    scene_id,
                    im_id,
                    obj_id,
                    path: path.clone(),
                    source: Box::new(source),
                })?;
            report.extend(records);
        }
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate_result_file(
        &self,
        job: &ResultSetJob,
        models: &ModelTable,
        scene: &SceneData,
        depth_cache: &mut DepthCache<'_, S>,
        path: &Path,
        im_id: ImageId,
        obj_id: ObjectId,
    ) -> Result<Vec<ErrorRecord>> {
        let metric = &self.settings.metric;
        let requirements = metric.requirements();
        let missing_image = |path: &Path| EvalError::MissingImage {
            scene_id: scene.scene_id,
            im_id,
            path: path.to_path_buf(),
        };

        let gts = scene.gt.get(&im_id).ok_or_else(|| missing_image(&scene.gt_path))?;
        let ests = self.store.load_result(path, obj_id)?;
        let matched = match_gt(obj_id, gts);
        let selected = select_estimates(&ests, self.settings.n_top, matched.len());

        let cam_k = if requirements.camera {
            let info = scene.info.get(&im_id).ok_or_else(|| missing_image(&scene.info_path))?;
            Some(&info.cam_k)
        } else {
            None
        };
        let model = if requirements.model {
            Some(models.get(&obj_id).ok_or(EvalError::MissingModel(obj_id))?)
        } else {
            None
        };
        let depth = if requirements.depth {
            Some(depth_cache.get(scene.scene_id, im_id)?)
        } else {
            None
        };
        let ctx = MetricContext {
            model,
            depth,
            cam_k,
            im_size: requirements.image_size.then(|| job.params.test_im_size),
        };

        selected
            .into_iter()
            .map(|(est_id, est)| -> Result<ErrorRecord> {
                Ok(ErrorRecord {
                    im_id,
                    obj_id,
                    est_id,
                    score: est.score,
                    errors: evaluate(metric, est, &matched, &ctx)?,
                })
            })
            .collect()
    }
}
