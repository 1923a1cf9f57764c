use clap::Args;
use diskann_bench::{config::IndexBuildParams, pipeline::Pipeline, tools::ProcessTools, Result};

#[derive(Args)]
pub struct ToFbinArgs {
    /// Input prefix, <this>_learn.fvecs and <this>_query.fvecs must exist.
    #[arg(long = "sift_base")]
    sift_base: String,
    /// Dataset name, outputs are written to <this>_learn.fbin and <this>_query.fbin.
    #[arg(long)]
    dataset: String,
    /// Number of learn points to extract. 0 converts all of them.
    #[arg(long = "max_npts", default_value_t = 0)]
    max_npts: usize,
}

pub fn to_fbin(args: ToFbinArgs, params: IndexBuildParams, tools: ProcessTools) -> Result<()> {
    Pipeline::new(args.dataset, params, tools).to_fbin(&args.sift_base, args.max_npts)
}
