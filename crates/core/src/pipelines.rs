// crates/core/src/pipelines.rs
//! Catalog of the DRfold2 pipelines exposed by the server.
//!
//! Each pipeline is an external program: an interpreter, a script under the
//! configured scripts directory, and an argument vector. The catalog turns
//! typed requests into [`JobSpec`]s; the scientific content of the scripts
//! is opaque to the job core.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::JobError;
use crate::jobs::types::JobSpec;

/// Model configuration used when a request does not pick one.
pub const DEFAULT_MODEL_CONFIG: &str = "cfg_95";

/// Interactive pipelines are expected to answer within minutes; ensemble
/// work can legitimately run for hours.
const SYNC_PIPELINE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const BACKGROUND_PIPELINE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Basic RNA 3D structure prediction from a FASTA sequence.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub input_file: PathBuf,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub model_config: Option<String>,
    #[serde(default)]
    pub use_mock: bool,
}

/// Molecular-dynamics refinement of an existing PDB structure.
#[derive(Debug, Clone, Deserialize)]
pub struct RefineRequest {
    pub input_file: PathBuf,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub steps: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub use_mock: bool,
}

/// Raw per-model inference: distance maps, contacts, confidence scores.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceRequest {
    pub input_file: PathBuf,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub model_config: Option<String>,
    #[serde(default = "default_true")]
    pub analyze: bool,
    #[serde(default)]
    pub use_mock: bool,
}

/// Ensemble prediction: several model variants, then clustering.
#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleRequest {
    pub input_file: PathBuf,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub max_models: Option<u32>,
    #[serde(default)]
    pub use_mock: bool,
    #[serde(default)]
    pub job_name: Option<String>,
}

/// Batch prediction over several FASTA files with one model configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub input_files: Vec<PathBuf>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub model_config: Option<String>,
    #[serde(default)]
    pub job_name: Option<String>,
}

/// Comprehensive analysis: prediction, ensemble and refinement in one run.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub input_file: PathBuf,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub include_refinement: bool,
    #[serde(default = "default_true")]
    pub include_ensemble: bool,
    #[serde(default)]
    pub job_name: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Maps pipeline requests onto job specs.
#[derive(Debug, Clone)]
pub struct PipelineCatalog {
    python: PathBuf,
    scripts_dir: PathBuf,
    work_dir: PathBuf,
}

impl PipelineCatalog {
    pub fn new(
        python: impl Into<PathBuf>,
        scripts_dir: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            python: python.into(),
            scripts_dir: scripts_dir.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn predict(&self, req: &PredictRequest) -> JobSpec {
        let model = req.model_config.as_deref().unwrap_or(DEFAULT_MODEL_CONFIG);
        let mut spec = self
            .script_spec("basic_prediction.py")
            .with_args(["--input", path_arg(&req.input_file).as_str()])
            .with_args(["--model", model])
            .with_name(format!("predict_{}", stem(&req.input_file)))
            .with_timeout(SYNC_PIPELINE_TIMEOUT);
        if let Some(output) = &req.output_file {
            spec = spec
                .with_args(["--output", path_arg(output).as_str()])
                .with_output(output.clone());
        }
        if req.use_mock {
            spec = spec.with_arg("--use-mock");
        }
        spec
    }

    pub fn refine(&self, req: &RefineRequest) -> JobSpec {
        // The refinement script requires an output path; derive one under
        // the work directory when the caller leaves it out.
        let output = req.output_file.clone().unwrap_or_else(|| {
            self.work_dir
                .join(format!("refined_{}.pdb", stem(&req.input_file)))
        });
        let mut spec = self
            .script_spec("structure_refinement.py")
            .with_args(["--input", path_arg(&req.input_file).as_str()])
            .with_args(["--output", path_arg(&output).as_str()])
            .with_args(["--steps", req.steps.unwrap_or(1000).to_string().as_str()])
            .with_output(output)
            .with_name(format!("refine_{}", stem(&req.input_file)))
            .with_timeout(SYNC_PIPELINE_TIMEOUT);
        if let Some(temperature) = req.temperature {
            spec = spec.with_args(["--temperature", temperature.to_string().as_str()]);
        }
        if req.use_mock {
            spec = spec.with_arg("--use-mock");
        }
        spec
    }

    pub fn inference(&self, req: &InferenceRequest) -> JobSpec {
        let model = req.model_config.as_deref().unwrap_or(DEFAULT_MODEL_CONFIG);
        let mut spec = self
            .script_spec("model_inference.py")
            .with_args(["--input", path_arg(&req.input_file).as_str()])
            .with_args(["--model", model])
            .with_name(format!("inference_{}", stem(&req.input_file)))
            .with_timeout(SYNC_PIPELINE_TIMEOUT);
        if let Some(dir) = &req.output_dir {
            spec = spec
                .with_args(["--output", path_arg(dir).as_str()])
                .with_output(dir.clone());
        }
        if req.analyze {
            spec = spec.with_arg("--analyze");
        }
        if req.use_mock {
            spec = spec.with_arg("--use-mock");
        }
        spec
    }

    pub fn ensemble(&self, req: &EnsembleRequest) -> JobSpec {
        let name = req
            .job_name
            .clone()
            .unwrap_or_else(|| format!("ensemble_{}", stem(&req.input_file)));
        let mut spec = self
            .script_spec("ensemble_prediction.py")
            .with_args(["--input", path_arg(&req.input_file).as_str()])
            .with_args(["--max-models", req.max_models.unwrap_or(4).to_string().as_str()])
            .with_name(name)
            .with_timeout(BACKGROUND_PIPELINE_TIMEOUT);
        if let Some(dir) = &req.output_dir {
            spec = spec
                .with_args(["--output", path_arg(dir).as_str()])
                .with_output(dir.clone());
        }
        if req.use_mock {
            spec = spec.with_arg("--use-mock");
        }
        spec
    }

    /// Batch prediction currently processes only the first file of the
    /// batch; the prediction script takes a single input.
    pub fn batch(&self, req: &BatchRequest) -> Result<JobSpec, JobError> {
        let Some(first) = req.input_files.first() else {
            return Err(JobError::Validation("no input files provided".to_string()));
        };
        let model = req.model_config.as_deref().unwrap_or(DEFAULT_MODEL_CONFIG);
        let name = req
            .job_name
            .clone()
            .unwrap_or_else(|| format!("batch_{}_sequences", req.input_files.len()));
        let mut spec = self
            .script_spec("basic_prediction.py")
            .with_args(["--input", path_arg(first).as_str()])
            .with_args(["--model", model])
            .with_name(name)
            .with_timeout(BACKGROUND_PIPELINE_TIMEOUT);
        if let Some(dir) = &req.output_dir {
            let output = dir.join(format!("{}.pdb", stem(first)));
            spec = spec
                .with_args(["--output", path_arg(&output).as_str()])
                .with_output(output);
        }
        Ok(spec)
    }

    /// Comprehensive analysis starts with the ensemble pipeline; disabling
    /// the ensemble collapses it to a single model.
    pub fn analysis(&self, req: &AnalysisRequest) -> JobSpec {
        let max_models = if req.include_ensemble { 4 } else { 1 };
        let name = req
            .job_name
            .clone()
            .unwrap_or_else(|| format!("comprehensive_{}", stem(&req.input_file)));
        let mut spec = self
            .script_spec("ensemble_prediction.py")
            .with_args(["--input", path_arg(&req.input_file).as_str()])
            .with_args(["--max-models", max_models.to_string().as_str()])
            .with_name(name)
            .with_timeout(BACKGROUND_PIPELINE_TIMEOUT);
        if let Some(dir) = &req.output_dir {
            spec = spec
                .with_args(["--output", path_arg(dir).as_str()])
                .with_output(dir.clone());
        }
        spec
    }

    fn script_spec(&self, script: &str) -> JobSpec {
        JobSpec::new(self.python.clone())
            .with_arg(path_arg(&self.scripts_dir.join(script)))
            .with_working_dir(self.work_dir.clone())
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn catalog() -> PipelineCatalog {
        PipelineCatalog::new("/usr/bin/python3", "/opt/drfold/scripts", "/var/lib/foldrun")
    }

    #[test]
    fn test_predict_builds_argument_vector() {
        let spec = catalog().predict(&PredictRequest {
            input_file: PathBuf::from("/data/trna.fasta"),
            output_file: Some(PathBuf::from("/data/trna.pdb")),
            model_config: None,
            use_mock: true,
        });

        assert_eq!(spec.program, PathBuf::from("/usr/bin/python3"));
        assert_eq!(
            spec.args,
            vec![
                "/opt/drfold/scripts/basic_prediction.py",
                "--input",
                "/data/trna.fasta",
                "--model",
                "cfg_95",
                "--output",
                "/data/trna.pdb",
                "--use-mock",
            ]
        );
        assert_eq!(spec.display_name(), "predict_trna");
        assert_eq!(spec.outputs, vec![PathBuf::from("/data/trna.pdb")]);
    }

    #[test]
    fn test_refine_derives_output_when_missing() {
        let spec = catalog().refine(&RefineRequest {
            input_file: PathBuf::from("/data/structure.pdb"),
            output_file: None,
            steps: Some(2000),
            temperature: Some(310.0),
            use_mock: false,
        });

        assert!(spec.args.contains(&"--steps".to_string()));
        assert!(spec.args.contains(&"2000".to_string()));
        assert!(spec.args.contains(&"310".to_string()));
        assert_eq!(
            spec.outputs,
            vec![PathBuf::from("/var/lib/foldrun/refined_structure.pdb")]
        );
        assert!(!spec.args.contains(&"--use-mock".to_string()));
    }

    #[test]
    fn test_inference_analyze_flag() {
        let with = catalog().inference(&InferenceRequest {
            input_file: PathBuf::from("seq.fasta"),
            output_dir: Some(PathBuf::from("/out")),
            model_config: Some("cfg_97".to_string()),
            analyze: true,
            use_mock: false,
        });
        assert!(with.args.contains(&"--analyze".to_string()));
        assert!(with.args.contains(&"cfg_97".to_string()));

        let without = catalog().inference(&InferenceRequest {
            input_file: PathBuf::from("seq.fasta"),
            output_dir: None,
            model_config: None,
            analyze: false,
            use_mock: false,
        });
        assert!(!without.args.contains(&"--analyze".to_string()));
        assert!(without.outputs.is_empty());
    }

    #[test]
    fn test_ensemble_names_and_bounds() {
        let spec = catalog().ensemble(&EnsembleRequest {
            input_file: PathBuf::from("/data/ribozyme.fasta"),
            output_dir: Some(PathBuf::from("/out/ensemble")),
            max_models: None,
            use_mock: false,
            job_name: None,
        });

        assert_eq!(spec.display_name(), "ensemble_ribozyme");
        assert!(spec.args.contains(&"--max-models".to_string()));
        assert!(spec.args.contains(&"4".to_string()));
        assert_eq!(spec.timeout, Some(BACKGROUND_PIPELINE_TIMEOUT));
    }

    #[test]
    fn test_batch_rejects_empty_input_list() {
        let err = catalog()
            .batch(&BatchRequest {
                input_files: Vec::new(),
                output_dir: None,
                model_config: None,
                job_name: None,
            })
            .unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
    }

    #[test]
    fn test_batch_uses_first_file_and_counts_all() {
        let spec = catalog()
            .batch(&BatchRequest {
                input_files: vec![
                    PathBuf::from("/data/a.fasta"),
                    PathBuf::from("/data/b.fasta"),
                ],
                output_dir: Some(PathBuf::from("/out")),
                model_config: None,
                job_name: None,
            })
            .unwrap();

        assert_eq!(spec.display_name(), "batch_2_sequences");
        assert!(spec.args.contains(&"/data/a.fasta".to_string()));
        assert!(!spec.args.contains(&"/data/b.fasta".to_string()));
        assert_eq!(spec.outputs, vec![PathBuf::from("/out/a.pdb")]);
    }

    #[test]
    fn test_analysis_collapses_without_ensemble() {
        let full = catalog().analysis(&AnalysisRequest {
            input_file: PathBuf::from("x.fasta"),
            output_dir: None,
            include_refinement: true,
            include_ensemble: true,
            job_name: None,
        });
        assert!(full.args.contains(&"4".to_string()));
        assert_eq!(full.display_name(), "comprehensive_x");

        let single = catalog().analysis(&AnalysisRequest {
            input_file: PathBuf::from("x.fasta"),
            output_dir: None,
            include_refinement: false,
            include_ensemble: false,
            job_name: None,
        });
        assert!(single.args.contains(&"1".to_string()));
    }
}
