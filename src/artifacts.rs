//! File naming for every artifact produced or consumed by the pipeline.
//!
//! The external tools locate their inputs by these names so they must be reproduced exactly.

use std::path::PathBuf;

use crate::config::IndexBuildParams;

/// Source SIFT learn vectors for `sift_prefix`.
pub fn sift_learn_fvecs(sift_prefix: &str) -> String {
    format!("{sift_prefix}_learn.fvecs")
}

/// Source SIFT query vectors for `sift_prefix`.
pub fn sift_query_fvecs(sift_prefix: &str) -> String {
    format!("{sift_prefix}_query.fvecs")
}

/// Names of all artifacts derived from a single dataset name.
#[derive(Clone, Debug)]
pub struct DatasetArtifacts {
    dataset: String,
    index_prefix: String,
}

impl DatasetArtifacts {
    /// Suffixes of the directories written by the tensor exporter.
    pub const TENSOR_DIR_SUFFIXES: [&'static str; 3] =
        ["_embedding.zarr", "_num_nbrs.zarr", "_nbrhood.zarr"];

    pub fn new(dataset: impl Into<String>, params: &IndexBuildParams) -> Self {
        let dataset = dataset.into();
        let index_prefix = format!(
            "{dataset}_R{}_L{}_A{}",
            params.max_degree, params.build_list_size, params.alpha
        );
        Self {
            dataset,
            index_prefix,
        }
    }

    pub fn learn_fbin(&self) -> String {
        format!("{}_learn.fbin", self.dataset)
    }

    pub fn query_fbin(&self) -> String {
        format!("{}_query.fbin", self.dataset)
    }

    /// Prefix of all files written by the index builder.
    pub fn index_prefix(&self) -> &str {
        &self.index_prefix
    }

    pub fn disk_index(&self) -> String {
        format!("{}_disk.index", self.index_prefix)
    }

    /// Prefix of the tensor directories written by the exporter.
    pub fn tensor_prefix(&self) -> String {
        format!("{}_tensor", self.index_prefix)
    }

    /// Embedding, neighbor count and neighborhood tensor directories, in that order.
    pub fn tensor_dirs(&self) -> [PathBuf; 3] {
        let prefix = self.tensor_prefix();
        Self::TENSOR_DIR_SUFFIXES.map(|s| PathBuf::from(format!("{prefix}{s}")))
    }

    pub fn ground_truth(&self) -> String {
        format!("{}_query_gt100", self.dataset)
    }

    pub fn result_prefix(&self) -> String {
        format!("{}_query_res", self.dataset)
    }
}
