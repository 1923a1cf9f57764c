//! External DiskANN executables.
//!
//! Each pipeline stage is a single blocking process invocation. [DiskAnnTools] abstracts the
//! invocation so that argument shaping can be exercised without the real binaries.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use tracing::info;

use crate::{Error, Result};

/// One method per external tool. Each call blocks until the tool exits.
///
/// Implementations must return an error if the tool exits unsuccessfully.
pub trait DiskAnnTools {
    /// Convert `.fvecs` vectors into `.fbin` format.
    fn fvecs_to_bin(&self, args: &[String]) -> Result<()>;

    /// Build an on-disk index.
    fn build_disk_index(&self, args: &[String]) -> Result<()>;

    /// Export a disk index as zarr tensors.
    fn disk_index_to_tensors(&self, args: &[String]) -> Result<()>;

    /// Compare exported tensors against the disk index they came from.
    fn diff_disk_index_tensors(&self, args: &[String]) -> Result<()>;

    /// Run a query sweep against a disk index.
    fn search_disk_index(&self, args: &[String]) -> Result<()>;
}

/// Locations of the DiskANN executables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolPaths {
    pub fvecs_to_bin: PathBuf,
    pub build_disk_index: PathBuf,
    pub disk_index_to_tensors: PathBuf,
    pub diff_disk_index_tensors: PathBuf,
    pub search_disk_index: PathBuf,
}

impl ToolPaths {
    /// Tool locations inside a DiskANN checkout built into `<diskann_dir>/build`.
    pub fn from_diskann_dir(diskann_dir: &Path) -> Self {
        let tests = diskann_dir.join("build").join("tests");
        let utils = tests.join("utils");
        Self {
            fvecs_to_bin: utils.join("fvecs_to_bin"),
            build_disk_index: tests.join("build_disk_index"),
            disk_index_to_tensors: utils.join("disk_index_to_tensors"),
            diff_disk_index_tensors: utils.join("diff_disk_index_tensors"),
            search_disk_index: tests.join("search_disk_index"),
        }
    }
}

/// Runs the tools as child processes that inherit stdio.
pub struct ProcessTools {
    paths: ToolPaths,
}

impl ProcessTools {
    pub fn new(paths: ToolPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ToolPaths {
        &self.paths
    }

    fn run_program(program: &Path, args: &[String]) -> Result<()> {
        if !program.is_file() {
            return Err(Error::MissingFile(program.to_path_buf()));
        }
        info!("running {} {}", program.display(), args.join(" "));
        let status = Command::new(program).args(args).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::ToolFailed {
                program: program.to_path_buf(),
                status,
            })
        }
    }
}

impl DiskAnnTools for ProcessTools {
    fn fvecs_to_bin(&self, args: &[String]) -> Result<()> {
        Self::run_program(&self.paths.fvecs_to_bin, args)
    }

    fn build_disk_index(&self, args: &[String]) -> Result<()> {
        Self::run_program(&self.paths.build_disk_index, args)
    }

    fn disk_index_to_tensors(&self, args: &[String]) -> Result<()> {
        Self::run_program(&self.paths.disk_index_to_tensors, args)
    }

    fn diff_disk_index_tensors(&self, args: &[String]) -> Result<()> {
        Self::run_program(&self.paths.diff_disk_index_tensors, args)
    }

    fn search_disk_index(&self, args: &[String]) -> Result<()> {
        Self::run_program(&self.paths.search_disk_index, args)
    }
}
