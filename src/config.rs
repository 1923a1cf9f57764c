//! Experiment configuration.
//!
//! Index build hyperparameters are fixed for a whole experiment; only the query backend varies
//! between runs so that result records remain comparable. All fields default to the values used
//! by the reference experiment.

use std::{
    fs::File,
    io::BufReader,
    num::NonZero,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Parameters passed to the disk index builder.
///
/// These also determine the index file names, see [crate::artifacts::DatasetArtifacts].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexBuildParams {
    /// Element type of the vectors.
    pub data_type: String,
    /// Distance function name understood by the tools.
    pub dist_fn: String,
    /// Maximum out-degree of any vertex in the graph (-R).
    pub max_degree: NonZero<usize>,
    /// Candidate list size used during build (-L).
    pub build_list_size: NonZero<usize>,
    /// Pruning alpha. Not passed to the builder but encoded in the index name.
    pub alpha: f64,
    /// Search-time DRAM budget in GB (-B).
    pub search_dram_budget: f64,
    /// Build-time DRAM budget in GB (-M).
    pub build_dram_budget: f64,
    /// Builder thread count (-T). If unset the builder picks.
    pub build_threads: Option<NonZero<usize>>,
}

impl Default for IndexBuildParams {
    fn default() -> Self {
        Self {
            data_type: "float".to_string(),
            dist_fn: "l2".to_string(),
            max_degree: NonZero::new(32).unwrap(),
            build_list_size: NonZero::new(50).unwrap(),
            alpha: 1.2,
            search_dram_budget: 0.003,
            build_dram_budget: 1.0,
            build_threads: None,
        }
    }
}

/// Top level configuration shared by every stage of one experiment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub index: IndexBuildParams,
    /// Root of the DiskANN checkout containing `build/tests/...` tools.
    pub diskann_dir: Option<PathBuf>,
}

impl ExperimentConfig {
    /// Read a JSON formatted config from `path`. Missing fields take their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
