use clap::Args;
use diskann_bench::{
    config::IndexBuildParams,
    pipeline::{Backend, Pipeline, QueryParams},
    tools::ProcessTools,
    Result,
};

#[derive(Args)]
pub struct QueryArgs {
    /// Dataset name, the prefix of <this>_query.fbin.
    #[arg(long)]
    dataset: String,
    /// How many nearest neighbors to query.
    #[arg(long = "k_depth", default_value_t = 10)]
    k_depth: usize,
    /// Number of points to cache ahead of time.
    #[arg(long = "npts_to_cache", default_value_t = 10_000)]
    npts_to_cache: usize,
    /// Read index data from the exported tensors.
    #[arg(long = "use_ts")]
    use_ts: bool,
    /// Use the tensor backend in async mode. Ignored without --use_ts.
    #[arg(long = "ts_async")]
    ts_async: bool,
    /// Search list sizes to sweep.
    #[arg(long = "list_sizes", value_name = "L", num_args = 1.., default_values_t = [10, 50, 100])]
    list_sizes: Vec<usize>,
}

impl From<QueryArgs> for QueryParams {
    fn from(value: QueryArgs) -> Self {
        Self {
            k_depth: value.k_depth,
            npts_to_cache: value.npts_to_cache,
            backend: Backend::new(value.use_ts, value.ts_async),
            list_sizes: value.list_sizes,
        }
    }
}

pub fn query(args: QueryArgs, params: IndexBuildParams, tools: ProcessTools) -> Result<()> {
    let pipeline = Pipeline::new(args.dataset.clone(), params, tools);
    pipeline.query(&args.into())
}
