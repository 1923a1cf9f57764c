//! Stage sequencing for a single dataset.
//!
//! Every stage checks that its inputs exist, shapes the argument list for one external tool and
//! runs it. Stages do not invoke one another; callers run them in dependency order
//! (`to_fbin`, `build`, `convert`, then `query` once per backend variant).

use std::{
    collections::HashMap,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use tracing::warn;

use crate::{
    artifacts::{sift_learn_fvecs, sift_query_fvecs, DatasetArtifacts},
    config::IndexBuildParams,
    tools::DiskAnnTools,
    Error, Result,
};

/// Storage backend used by the search tool.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Read the disk index directly.
    Native,
    /// Read index data from exported tensors.
    Tensors { async_io: bool },
}

impl Backend {
    pub fn new(use_tensors: bool, async_io: bool) -> Self {
        if use_tensors {
            Self::Tensors { async_io }
        } else {
            Self::Native
        }
    }
}

/// Parameters of one query sweep.
#[derive(Clone, Debug)]
pub struct QueryParams {
    /// Number of nearest neighbors requested per query (-K).
    pub k_depth: usize,
    /// Number of index nodes cached before searching.
    pub npts_to_cache: usize,
    pub backend: Backend,
    /// Search list sizes to sweep, all in a single invocation.
    pub list_sizes: Vec<usize>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            k_depth: 10,
            npts_to_cache: 10_000,
            backend: Backend::Native,
            list_sizes: vec![10, 50, 100],
        }
    }
}

/// Drives the external tools for one dataset.
pub struct Pipeline<T> {
    artifacts: DatasetArtifacts,
    params: IndexBuildParams,
    tools: T,
}

impl<T: DiskAnnTools> Pipeline<T> {
    pub fn new(dataset: impl Into<String>, params: IndexBuildParams, tools: T) -> Self {
        Self {
            artifacts: DatasetArtifacts::new(dataset, &params),
            params,
            tools,
        }
    }

    pub fn artifacts(&self) -> &DatasetArtifacts {
        &self.artifacts
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    /// Convert SIFT `.fvecs` learn and query vectors to `.fbin`.
    ///
    /// If `max_npts` is non-zero the learn set is truncated to that many points.
    pub fn to_fbin(&self, sift_prefix: &str, max_npts: usize) -> Result<()> {
        let learn_fvecs = sift_learn_fvecs(sift_prefix);
        let query_fvecs = sift_query_fvecs(sift_prefix);
        require_file(&learn_fvecs)?;
        require_file(&query_fvecs)?;

        let learn_fbin = self.artifacts.learn_fbin();
        let mut args = vec![learn_fvecs, learn_fbin.clone()];
        if max_npts > 0 {
            args.push(max_npts.to_string());
        }
        run_stage(&learn_fbin, || self.tools.fvecs_to_bin(&args))?;

        let query_fbin = self.artifacts.query_fbin();
        let args = vec![query_fvecs, query_fbin.clone()];
        run_stage(&query_fbin, || self.tools.fvecs_to_bin(&args))
    }

    /// Build the disk index from the learn vectors.
    pub fn build(&self) -> Result<()> {
        let learn_fbin = self.artifacts.learn_fbin();
        require_file(&learn_fbin)?;

        let mut args = self.common_args();
        args.extend([
            "--data_path".to_string(),
            learn_fbin,
            "--index_path_prefix".to_string(),
            self.artifacts.index_prefix().to_string(),
            "-R".to_string(),
            self.params.max_degree.to_string(),
            "-L".to_string(),
            self.params.build_list_size.to_string(),
            "-B".to_string(),
            self.params.search_dram_budget.to_string(),
            "-M".to_string(),
            self.params.build_dram_budget.to_string(),
        ]);
        if let Some(threads) = self.params.build_threads {
            args.extend(["-T".to_string(), threads.to_string()]);
        }
        run_stage(self.artifacts.index_prefix(), || {
            self.tools.build_disk_index(&args)
        })
    }

    /// Export the disk index as tensors.
    pub fn convert(&self) -> Result<()> {
        let disk_index = self.artifacts.disk_index();
        require_file(&disk_index)?;

        let tensor_prefix = self.artifacts.tensor_prefix();
        let args = vec![self.params.data_type.clone(), disk_index, tensor_prefix.clone()];
        run_stage(&tensor_prefix, || self.tools.disk_index_to_tensors(&args))
    }

    /// Check the exported tensors against the disk index.
    pub fn verify(&self) -> Result<()> {
        let disk_index = self.artifacts.disk_index();
        require_file(&disk_index)?;
        self.require_tensor_dirs()?;

        let args = vec![
            self.params.data_type.clone(),
            disk_index,
            self.artifacts.tensor_prefix(),
        ];
        self.tools.diff_disk_index_tensors(&args)
    }

    /// Run the search tool over every size in `query.list_sizes`.
    pub fn query(&self, query: &QueryParams) -> Result<()> {
        if query.list_sizes.is_empty() {
            return Err(Error::InvalidInput(
                "at least one search list size is required".to_string(),
            ));
        }
        let query_fbin = self.artifacts.query_fbin();
        let disk_index = self.artifacts.disk_index();
        require_file(&query_fbin)?;
        require_file(&disk_index)?;
        if let Backend::Tensors { .. } = query.backend {
            self.require_tensor_dirs()?;
        }

        let result_prefix = self.artifacts.result_prefix();
        let mut args = self.common_args();
        args.extend([
            "--index_path_prefix".to_string(),
            self.artifacts.index_prefix().to_string(),
            "--query_file".to_string(),
            query_fbin,
            "--gt_file".to_string(),
            self.artifacts.ground_truth(),
            "-K".to_string(),
            query.k_depth.to_string(),
            "--result_path".to_string(),
            result_prefix.clone(),
            "--num_nodes_to_cache".to_string(),
            query.npts_to_cache.to_string(),
            "-L".to_string(),
        ]);
        args.extend(query.list_sizes.iter().map(usize::to_string));
        if let Backend::Tensors { async_io } = query.backend {
            args.extend([
                "--index_tensors_prefix".to_string(),
                self.artifacts.tensor_prefix(),
            ]);
            if async_io {
                args.push("--use_tensors_async".to_string());
            }
        }
        run_stage(&result_prefix, || self.tools.search_disk_index(&args))
    }

    fn common_args(&self) -> Vec<String> {
        vec![
            "--data_type".to_string(),
            self.params.data_type.clone(),
            "--dist_fn".to_string(),
            self.params.dist_fn.clone(),
        ]
    }

    fn require_tensor_dirs(&self) -> Result<()> {
        self.artifacts
            .tensor_dirs()
            .iter()
            .try_for_each(require_dir)
    }
}

fn require_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::MissingFile(path.to_path_buf()))
    }
}

fn require_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.is_dir() {
        Ok(())
    } else {
        Err(Error::MissingDirectory(path.to_path_buf()))
    }
}

/// Run `invoke`; if it fails, mark anything it left under `output_prefix` as incomplete.
fn run_stage(output_prefix: &str, invoke: impl FnOnce() -> Result<()>) -> Result<()> {
    let before = OutputSnapshot::capture(output_prefix);
    let result = invoke();
    if result.is_err() {
        before.mark_changed_incomplete();
    }
    result
}

/// State of one output entry. Directories summarize everything beneath them, since rewriting a
/// file inside a directory does not touch the directory's own mtime.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct EntryState {
    /// Newest modification time found.
    modified: Option<SystemTime>,
    /// Total size of regular files.
    len: u64,
    files: usize,
}

impl EntryState {
    fn read(path: &Path) -> Self {
        let Ok(metadata) = fs::symlink_metadata(path) else {
            return Self::default();
        };
        let mut state = Self {
            modified: metadata.modified().ok(),
            len: 0,
            files: 0,
        };
        if metadata.is_dir() {
            for entry in fs::read_dir(path).into_iter().flatten().flatten() {
                let child = Self::read(&entry.path());
                state.modified = state.modified.max(child.modified);
                state.len += child.len;
                state.files += child.files;
            }
        } else {
            state.len = metadata.len();
            state.files = 1;
        }
        state
    }
}

/// States of directory entries sharing a file name prefix.
struct OutputSnapshot {
    dir: PathBuf,
    name_prefix: OsString,
    entries: HashMap<OsString, EntryState>,
}

impl OutputSnapshot {
    const INCOMPLETE_SUFFIX: &'static str = ".incomplete";

    fn capture(output_prefix: &str) -> Self {
        let prefix = Path::new(output_prefix);
        let dir = match prefix.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name_prefix = prefix
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        let mut snapshot = Self {
            dir,
            name_prefix,
            entries: HashMap::new(),
        };
        let entries = snapshot.scan().collect();
        snapshot.entries = entries;
        snapshot
    }

    fn scan(&self) -> impl Iterator<Item = (OsString, EntryState)> + '_ {
        let prefix = self.name_prefix.to_string_lossy().into_owned();
        fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter(move |e| {
                let name = e.file_name().to_string_lossy().into_owned();
                !prefix.is_empty()
                    && name.starts_with(&prefix)
                    && !name.ends_with(Self::INCOMPLETE_SUFFIX)
            })
            .map(|e| (e.file_name(), EntryState::read(&e.path())))
    }

    /// Rename entries that appeared or changed since capture.
    fn mark_changed_incomplete(&self) {
        let changed = self
            .scan()
            .filter(|(name, state)| self.entries.get(name) != Some(state))
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        for name in changed {
            let from = self.dir.join(&name);
            let mut to_name = name.clone();
            to_name.push(Self::INCOMPLETE_SUFFIX);
            let to = self.dir.join(to_name);
            warn!("marking incomplete output {}", to.display());
            if let Err(e) = fs::rename(&from, &to) {
                warn!("failed to mark {} incomplete: {}", from.display(), e);
            }
        }
    }
}
