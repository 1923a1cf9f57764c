use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use diskann_bench::{
    plot::save_chart,
    results::{assign_labels, find_result_files, parse_label_mapping, Series, COMPARISON_GRID},
    Result,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(version, about = "Plot job completion times of query sweep results", long_about = None)]
struct Cli {
    /// Directory containing the -res.txt result files.
    #[arg(long = "input_dir")]
    input_dir: PathBuf,
    /// Directory that receives the chart.
    #[arg(long = "output_dir")]
    output_dir: PathBuf,
    /// Label for one result file, as <file name>=<label>. Repeat once per input file; series are
    /// drawn in the order given. If omitted, three inputs are labeled by legacy ordering.
    #[arg(long = "label", value_parser = parse_label_mapping)]
    labels: Vec<(String, String)>,
    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

fn plot(cli: Cli) -> Result<PathBuf> {
    let files = find_result_files(&cli.input_dir)?;
    info!("input files {:?}", files);
    let series = assign_labels(files, &cli.labels)?
        .into_iter()
        .map(|(label, path)| Series::load(label, &path, &COMPARISON_GRID))
        .collect::<Result<Vec<_>>>()?;
    for s in series.iter() {
        info!("{}: {:?}", s.label, s.jct);
    }
    save_chart(&series, &COMPARISON_GRID, &cli.output_dir)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    match plot(cli) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use clap::{CommandFactory, Parser};

    use super::{plot, Cli};

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn labels_parse() {
        let cli = Cli::try_parse_from([
            "pt",
            "--input_dir",
            "in",
            "--output_dir",
            "out",
            "--label",
            "a-res.txt=base",
            "--label",
            "b-res.txt=TS",
        ])
        .unwrap();
        assert_eq!(
            cli.labels,
            vec![
                ("a-res.txt".to_string(), "base".to_string()),
                ("b-res.txt".to_string(), "TS".to_string()),
            ]
        );
        assert!(Cli::try_parse_from([
            "pt",
            "--input_dir",
            "in",
            "--output_dir",
            "out",
            "--label",
            "x"
        ])
        .is_err());
    }

    #[test]
    fn plot_directory() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        for (name, jct) in [("base", 30.0), ("ts", 20.0), ("ts-async", 10.0)] {
            fs::write(
                input.path().join(format!("sift-{name}-res.txt")),
                format!("1 10 1% 1% 99% {jct}\n10 10 1% 1% 99% {jct}\n10 100 1% 1% 99% {jct}\n"),
            )
            .unwrap();
        }
        let cli = Cli {
            input_dir: input.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            labels: vec![
                ("sift-base-res.txt".to_string(), "base".to_string()),
                ("sift-ts-res.txt".to_string(), "TS".to_string()),
                ("sift-ts-async-res.txt".to_string(), "TS+Async".to_string()),
            ],
            verbose: false,
        };
        let chart = plot(cli).unwrap();
        assert!(chart.starts_with(output.path()));
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 1);
    }

    #[test]
    fn malformed_input_writes_nothing() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(input.path().join("a-res.txt"), "1 10 1% 1% 99%\n").unwrap();
        let cli = Cli {
            input_dir: input.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            labels: vec![("a-res.txt".to_string(), "base".to_string())],
            verbose: false,
        };
        assert!(plot(cli).is_err());
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }
}
