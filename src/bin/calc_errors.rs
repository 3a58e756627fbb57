use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use sixd_eval::{ErrorCalculator, EvalConfig, FileStore, RunSummary};

/// Calculates pose errors of 6D object pose estimates against SIXD ground truth.
#[derive(Debug, Parser)]
#[command(author, version, about = "Pose error calculation for SIXD result sets")]
struct Args {
    /// YAML run configuration. Defaults are used for everything it omits.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Result set folder named <method>_<dataset>[_<test_type>]; may be repeated.
    #[arg(long = "result-path")]
    result_paths: Vec<PathBuf>,

    /// Folder holding one sub-folder per dataset.
    #[arg(long)]
    datasets_path: Option<PathBuf>,

    /// 0 = all estimates, -1 = as many as GT poses, N = top N.
    #[arg(long, allow_hyphen_values = true)]
    n_top: Option<i64>,

    /// One of vsd, adi, add, cou, re, te.
    #[arg(long)]
    error_type: Option<String>,

    #[arg(long)]
    vsd_delta: Option<f64>,

    #[arg(long)]
    vsd_tau: Option<f64>,

    /// step or tlinear.
    #[arg(long)]
    vsd_cost: Option<String>,

    /// Keep evaluating the other scenes when one fails.
    #[arg(long)]
    isolate_scene_failures: bool,

    /// Evaluate the scenes of a result set concurrently.
    #[arg(long)]
    parallel: bool,
}

impl Args {
    fn into_config(self) -> Result<EvalConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => EvalConfig::load(path)?,
            None => EvalConfig::default(),
        };
        if !self.result_paths.is_empty() {
            config.result_paths = self.result_paths;
        }
        if let Some(datasets_path) = self.datasets_path {
            config.datasets_path = datasets_path;
        }
        if let Some(n_top) = self.n_top {
            config.n_top = n_top;
        }
        if let Some(error_type) = self.error_type {
            config.error_type = error_type;
        }
        if let Some(delta) = self.vsd_delta {
            config.vsd.delta = delta;
        }
        if let Some(tau) = self.vsd_tau {
            config.vsd.tau = tau;
        }
        if let Some(cost) = self.vsd_cost {
            config.vsd.cost = cost;
        }
        config.isolate_scene_failures |= self.isolate_scene_failures;
        config.parallel_scenes |= self.parallel;
        Ok(config)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match try_main() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

/// `Ok(false)` when some scenes were skipped
fn try_main() -> Result<bool, Box<dyn Error>> {
    let settings = Args::parse().into_config()?.resolve()?;
    let summary = ErrorCalculator::new(&FileStore, settings).run()?;
    Ok(print_summary(&summary))
}

/// Prints what was written and what failed, returns whether every scene was evaluated
fn print_summary(summary: &RunSummary) -> bool {
    println!("{}", summary.error_sign);
    for set in &summary.result_sets {
        println!("{}", set.result_path.display());
        for scene in &set.scenes {
            println!("  {}", scene);
        }
        for failure in &set.failures {
            println!("  {}", failure);
        }
    }
    println!("{} error records written", summary.records());
    summary.failures().next().is_none()
}
