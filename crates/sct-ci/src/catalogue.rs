//! Tool catalogue and presence verification.
//!
//! The catalogue enumerates every command-line entry point the installed
//! distribution must expose. It is the external contract of the install:
//! a tool silently dropped from the install manifest is caught here,
//! before any expensive test execution.

use crate::env::EnvConfig;
use crate::error::{PipelineError, Result};
use crate::stage::{GateDecision, Stage};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Command names the distribution must expose on the search path.
///
/// Order matters: verification walks this list top to bottom and stops at
/// the first missing entry. Keep in sync with the install manifest.
pub const TOOL_CATALOGUE: &[&str] = &[
    "sct_analyze_lesion",
    "sct_analyze_texture",
    "sct_apply_transfo",
    "sct_average_data",
    "sct_check_dependencies",
    "sct_compute_ernst_angle",
    "sct_compute_hausdorff_distance",
    "sct_compute_mscc",
    "sct_compute_mtr",
    "sct_compute_mtsat",
    "sct_compute_snr",
    "sct_concat_transfo",
    "sct_convert",
    "sct_create_mask",
    "sct_crop_image",
    "sct_deepseg_gm",
    "sct_deepseg_lesion",
    "sct_deepseg_sc",
    "sct_denoising_onlm",
    "sct_detect_pmj",
    "sct_dice_coefficient",
    "sct_dmri_compute_bvalue",
    "sct_dmri_compute_dti",
    "sct_dmri_concat_b0_and_dwi",
    "sct_dmri_concat_bvals",
    "sct_dmri_concat_bvecs",
    "sct_dmri_display_bvecs",
    "sct_dmri_moco",
    "sct_dmri_separate_b0_and_dwi",
    "sct_dmri_transpose_bvecs",
    "sct_download_data",
    "sct_extract_metric",
    "sct_flatten_sagittal",
    "sct_fmri_compute_tsnr",
    "sct_fmri_moco",
    "sct_get_centerline",
    "sct_image",
    "sct_label_utils",
    "sct_label_vertebrae",
    "sct_maths",
    "sct_merge_images",
    "sct_process_segmentation",
    "sct_propseg",
    "sct_qc",
    "sct_register_multimodal",
    "sct_register_to_template",
    "sct_resample",
    "sct_run_batch",
    "sct_smooth_spinalcord",
    "sct_straighten_spinalcord",
    "sct_testing",
    "sct_version",
    "sct_warp_template",
    "isct_convert_binary_to_trilinear",
    "isct_minc2volume-viewer",
    "isct_spine_detect",
    "isct_test_ants",
];

/// Successful resolution of one catalogued tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCheck {
    pub name: String,
    pub path: PathBuf,
}

/// Verify every catalogued name resolves on the search path.
///
/// Names are checked in catalogue order. Each resolution is logged with
/// its path; the first failure stops checking and returns
/// [`PipelineError::MissingTool`] identifying exactly that name. This is
/// a reachability check only; no tool is executed.
pub fn verify_tools(catalogue: &[String], env: &EnvConfig) -> Result<Vec<ToolCheck>> {
    let mut checks = Vec::with_capacity(catalogue.len());
    for name in catalogue {
        match env.resolve(name) {
            Some(path) => {
                info!(tool = %name, path = %path.display(), "tool resolved");
                checks.push(ToolCheck {
                    name: name.clone(),
                    path,
                });
            }
            None => {
                return Err(PipelineError::MissingTool { name: name.clone() });
            }
        }
    }
    Ok(checks)
}

/// Pipeline stage wrapping [`verify_tools`].
pub struct VerifyStage {
    pub tools: Vec<String>,
}

#[async_trait]
impl Stage for VerifyStage {
    fn name(&self) -> &'static str {
        "verify"
    }

    async fn run(&self, env: &EnvConfig) -> Result<GateDecision> {
        match verify_tools(&self.tools, env) {
            Ok(checks) => {
                info!(count = checks.len(), "all catalogued tools resolved");
                Ok(GateDecision::Pass)
            }
            Err(PipelineError::MissingTool { name }) => Ok(GateDecision::fail(
                1,
                format!("required tool not found on search path: {name}"),
            )),
            Err(other) => Err(other),
        }
    }
}
