//! Parsing and alignment of query sweep result files.
//!
//! The search tool appends one line per completed sweep point:
//!
//! ```text
//! <K> <L> <user time>% <kernel time>% <cpu usage>% <job completion time>
//! ```
//!
//! Fields are separated by exactly one space. Anything else is rejected.

use std::{
    fmt::Display,
    fs::{self, File},
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    str::FromStr,
};

use tracing::{debug, warn};

use crate::{Error, Result};

/// Suffix identifying result files in an input directory.
pub const RESULT_FILE_SUFFIX: &str = "-res.txt";

/// Labels used when series are ordered by the legacy fixed permutation.
pub const DEFAULT_LABELS: [&str; 3] = ["base", "TensorStore", "TensorStore+AsyncIO"];

/// A single completed query sweep point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResultRecord {
    /// Candidate depth (K).
    pub depth: u32,
    /// Search list size (L).
    pub list_size: u32,
    pub user_time: f64,
    pub kernel_time: f64,
    /// CPU utilization percentage.
    pub cpu_usage: f64,
    /// Job completion time in seconds.
    pub jct: f64,
}

impl ResultRecord {
    const FIELDS: usize = 6;

    pub fn point(&self) -> ComparisonPoint {
        ComparisonPoint::new(self.depth, self.list_size)
    }
}

impl FromStr for ResultRecord {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let fields = line.split(' ').collect::<Vec<_>>();
        if fields.len() != Self::FIELDS {
            return Err(format!(
                "expected {} fields, found {}",
                Self::FIELDS,
                fields.len()
            ));
        }
        Ok(Self {
            depth: parse_field(fields[0], "depth")?,
            list_size: parse_field(fields[1], "list size")?,
            user_time: parse_percent(fields[2], "user time")?,
            kernel_time: parse_percent(fields[3], "kernel time")?,
            cpu_usage: parse_percent(fields[4], "cpu usage")?,
            jct: parse_finite(fields[5], "job completion time")?,
        })
    }
}

fn parse_field<T: FromStr>(field: &str, name: &str) -> std::result::Result<T, String> {
    field
        .parse()
        .map_err(|_| format!("{name} field {field:?} is not a number"))
}

/// Like `parse_field`, but `inf` and `NaN` are rejected.
fn parse_finite(field: &str, name: &str) -> std::result::Result<f64, String> {
    let value: f64 = parse_field(field, name)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("{name} field {field:?} is not finite"))
    }
}

fn parse_percent(field: &str, name: &str) -> std::result::Result<f64, String> {
    field
        .strip_suffix('%')
        .ok_or_else(|| format!("{name} field {field:?} is missing '%' suffix"))
        .and_then(|f| parse_finite(f, name))
}

/// Parse all records from `reader`. `path` is only used for error reporting.
///
/// Empty lines are skipped; any other malformed line fails the whole parse.
pub fn read_records(path: &Path, reader: impl BufRead) -> Result<Vec<ResultRecord>> {
    let mut records = vec![];
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.is_empty() {
            continue;
        }
        let record = line
            .parse::<ResultRecord>()
            .map_err(|reason| Error::malformed(path, i + 1, reason))?;
        debug!("{}: {:?}", path.display(), record);
        records.push(record);
    }
    Ok(records)
}

/// Parse the result file at `path`.
pub fn parse_results(path: &Path) -> Result<Vec<ResultRecord>> {
    read_records(path, BufReader::new(File::open(path)?))
}

/// A (candidate depth, search list size) pair that forms one bar group.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComparisonPoint {
    pub depth: u32,
    pub list_size: u32,
}

impl ComparisonPoint {
    pub const fn new(depth: u32, list_size: u32) -> Self {
        Self { depth, list_size }
    }
}

impl Display for ComparisonPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.depth, self.list_size)
    }
}

/// Points compared across backends, in chart order.
pub const COMPARISON_GRID: [ComparisonPoint; 3] = [
    ComparisonPoint::new(1, 10),
    ComparisonPoint::new(10, 10),
    ComparisonPoint::new(10, 100),
];

/// Select the job completion time for each point in `grid`.
///
/// Every point must match exactly one record.
pub fn select_jct(
    path: &Path,
    records: &[ResultRecord],
    grid: &[ComparisonPoint],
) -> Result<Vec<f64>> {
    grid.iter()
        .map(|point| {
            let mut matches = records.iter().filter(|r| r.point() == *point);
            match (matches.next(), matches.count()) {
                (Some(r), 0) => Ok(r.jct),
                (first, rest) => Err(Error::Cardinality {
                    path: path.to_path_buf(),
                    point: *point,
                    matches: first.map(|_| 1 + rest).unwrap_or(0),
                }),
            }
        })
        .collect()
}

/// Job completion times of one backend variant across the comparison grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    pub label: String,
    pub jct: Vec<f64>,
}

impl Series {
    /// Read `path` and select values for `grid`.
    pub fn load(label: impl Into<String>, path: &Path, grid: &[ComparisonPoint]) -> Result<Self> {
        let records = parse_results(path)?;
        Ok(Self {
            label: label.into(),
            jct: select_jct(path, &records, grid)?,
        })
    }
}

/// List result files in `dir`, sorted by file name.
pub fn find_result_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .is_some_and(|n| n.to_string_lossy().ends_with(RESULT_FILE_SUFFIX))
        })
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

/// Reorder the first three series as `[b, c, a]`.
///
/// This is the historical convention for pairing name-ordered result files with
/// [DEFAULT_LABELS]. Explicit labels should be preferred.
pub fn legacy_order<T>(mut series: Vec<T>) -> Result<Vec<T>> {
    if series.len() < 3 {
        return Err(Error::InvalidInput(format!(
            "legacy series ordering needs at least 3 inputs, found {}",
            series.len()
        )));
    }
    series[..3].rotate_left(1);
    Ok(series)
}

/// Parse a `<file name>=<label>` mapping.
pub fn parse_label_mapping(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((file, label)) if !file.is_empty() && !label.is_empty() => {
            Ok((file.to_string(), label.to_string()))
        }
        _ => Err(format!("expected <file>=<label>, got {s:?}")),
    }
}

/// Pair result `files` with labels.
///
/// With explicit `mappings` every file must be labeled exactly once and the output follows the
/// mapping order. Without mappings, [legacy_order] is applied and [DEFAULT_LABELS] are used for
/// the three reordered files; files past the third are labeled by file name.
pub fn assign_labels(
    files: Vec<PathBuf>,
    mappings: &[(String, String)],
) -> Result<Vec<(String, PathBuf)>> {
    if mappings.is_empty() {
        warn!("no labels given, pairing files with default labels by legacy ordering");
        return Ok(legacy_order(files)?
            .into_iter()
            .enumerate()
            .map(|(i, f)| {
                let label = DEFAULT_LABELS
                    .get(i)
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| file_name(&f));
                (label, f)
            })
            .collect());
    }

    let mut remaining = files;
    let mut labeled = Vec::with_capacity(mappings.len());
    for (name, label) in mappings {
        let pos = remaining
            .iter()
            .position(|f| file_name(f) == *name)
            .ok_or_else(|| {
                Error::InvalidInput(format!("no unlabeled result file named {name:?}"))
            })?;
        labeled.push((label.clone(), remaining.remove(pos)));
    }
    if !remaining.is_empty() {
        return Err(Error::InvalidInput(format!(
            "result files without a label: {}",
            remaining
                .iter()
                .map(|f| file_name(f))
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    Ok(labeled)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use std::{
        fs,
        path::{Path, PathBuf},
    };

    use crate::Error;

    use super::{
        assign_labels, find_result_files, legacy_order, parse_label_mapping, read_records,
        select_jct, ComparisonPoint, ResultRecord, Series, COMPARISON_GRID,
    };

    const SAMPLE: &str = "1 10 2.5% 0.3% 95.0% 12.345
10 10 3.1% 0.4% 97.5% 14.5
10 50 4% 0.5% 98% 20
10 100 5.25% 0.75% 99.1% 31.75
";

    fn parse(s: &str) -> crate::Result<Vec<ResultRecord>> {
        read_records(Path::new("test-res.txt"), s.as_bytes())
    }

    #[test]
    fn parse_line() {
        assert_eq!(
            "1 10 2.5% 0.3% 95.0% 12.345".parse::<ResultRecord>(),
            Ok(ResultRecord {
                depth: 1,
                list_size: 10,
                user_time: 2.5,
                kernel_time: 0.3,
                cpu_usage: 95.0,
                jct: 12.345,
            })
        );
    }

    #[test]
    fn parse_wrong_field_count() {
        assert!("1 10 2.5% 0.3% 95.0%".parse::<ResultRecord>().is_err());
        assert!("1 10 2.5% 0.3% 95.0% 12.345 7"
            .parse::<ResultRecord>()
            .is_err());
    }

    #[test]
    fn parse_rejects_irregular_whitespace() {
        assert!("1  10 2.5% 0.3% 95.0% 12.345".parse::<ResultRecord>().is_err());
        assert!("1\t10 2.5% 0.3% 95.0% 12.345".parse::<ResultRecord>().is_err());
        assert!(" 1 10 2.5% 0.3% 95.0% 12.345".parse::<ResultRecord>().is_err());
    }

    #[test]
    fn parse_rejects_bad_numbers() {
        assert!("1.5 10 2.5% 0.3% 95.0% 12.345".parse::<ResultRecord>().is_err());
        assert!("1 10 2.5 0.3% 95.0% 12.345".parse::<ResultRecord>().is_err());
        assert!("1 10 2.5% x% 95.0% 12.345".parse::<ResultRecord>().is_err());
        assert!("1 10 2.5% 0.3% 95.0% 12.345%".parse::<ResultRecord>().is_err());
    }

    #[test]
    fn parse_rejects_non_finite() {
        for line in [
            "1 10 2.5% 0.3% 95.0% inf",
            "1 10 2.5% 0.3% 95.0% -inf",
            "1 10 2.5% 0.3% 95.0% NaN",
            "1 10 inf% 0.3% 95.0% 12.345",
            "1 10 2.5% NaN% 95.0% 12.345",
        ] {
            let err = line.parse::<ResultRecord>().unwrap_err();
            assert!(err.contains("not finite"), "{line}: {err}");
        }
        match parse("1 10 2.5% 0.3% 95.0% 12.345\n10 10 3.1% 0.4% 97.5% inf\n") {
            Err(Error::Malformed { line, .. }) => assert_eq!(line, 2),
            r => panic!("unexpected result {r:?}"),
        }
        // Huge but finite values are valid records.
        assert_eq!(
            "1 10 2.5% 0.3% 95.0% 1e308"
                .parse::<ResultRecord>()
                .map(|r| r.jct),
            Ok(1e308)
        );
    }

    #[test]
    fn parse_file() {
        let records = parse(SAMPLE).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[3].point(), ComparisonPoint::new(10, 100));
        assert_eq!(records[3].jct, 31.75);
    }

    #[test]
    fn parse_skips_blank_lines() {
        let records = parse("\n1 10 2.5% 0.3% 95.0% 12.345\r\n\n").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn parse_reports_line() {
        match parse("1 10 2.5% 0.3% 95.0% 12.345\n10 10 3.1% 0.4% 97.5%\n") {
            Err(Error::Malformed { path, line, .. }) => {
                assert_eq!(path, PathBuf::from("test-res.txt"));
                assert_eq!(line, 2);
            }
            r => panic!("unexpected result {r:?}"),
        }
    }

    #[test]
    fn select_grid() {
        let records = parse(SAMPLE).unwrap();
        assert_eq!(
            select_jct(Path::new("test-res.txt"), &records, &COMPARISON_GRID).unwrap(),
            vec![12.345, 14.5, 31.75]
        );
    }

    #[test]
    fn select_missing_point() {
        let records = parse("1 10 2.5% 0.3% 95.0% 12.345\n10 10 3.1% 0.4% 97.5% 14.5\n").unwrap();
        match select_jct(Path::new("test-res.txt"), &records, &COMPARISON_GRID) {
            Err(Error::Cardinality { point, matches, .. }) => {
                assert_eq!(point, ComparisonPoint::new(10, 100));
                assert_eq!(matches, 0);
            }
            r => panic!("unexpected result {r:?}"),
        }
    }

    #[test]
    fn select_duplicate_point() {
        let records = parse(&format!("{SAMPLE}10 100 5% 1% 99% 32\n")).unwrap();
        match select_jct(Path::new("test-res.txt"), &records, &COMPARISON_GRID) {
            Err(Error::Cardinality { point, matches, .. }) => {
                assert_eq!(point, ComparisonPoint::new(10, 100));
                assert_eq!(matches, 2);
            }
            r => panic!("unexpected result {r:?}"),
        }
    }

    #[test]
    fn legacy_permutation() {
        assert_eq!(
            legacy_order(vec!["a", "b", "c"]).unwrap(),
            vec!["b", "c", "a"]
        );
        assert_eq!(
            legacy_order(vec!["a", "b", "c", "d"]).unwrap(),
            vec!["b", "c", "a", "d"]
        );
        assert!(legacy_order(vec!["a", "b"]).is_err());
    }

    #[test]
    fn label_mapping_syntax() {
        assert_eq!(
            parse_label_mapping("sift-ts-res.txt=TS+Async"),
            Ok(("sift-ts-res.txt".to_string(), "TS+Async".to_string()))
        );
        assert!(parse_label_mapping("sift-ts-res.txt").is_err());
        assert!(parse_label_mapping("=base").is_err());
        assert!(parse_label_mapping("a-res.txt=").is_err());
    }

    fn files(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| Path::new("in").join(n)).collect()
    }

    #[test]
    fn legacy_labels() {
        let labeled = assign_labels(files(&["a-res.txt", "b-res.txt", "c-res.txt"]), &[]).unwrap();
        assert_eq!(
            labeled,
            vec![
                ("base".to_string(), PathBuf::from("in/b-res.txt")),
                ("TensorStore".to_string(), PathBuf::from("in/c-res.txt")),
                ("TensorStore+AsyncIO".to_string(), PathBuf::from("in/a-res.txt")),
            ]
        );
    }

    #[test]
    fn explicit_labels() {
        let mappings = [
            ("c-res.txt".to_string(), "TS+Async".to_string()),
            ("a-res.txt".to_string(), "base".to_string()),
        ];
        let labeled = assign_labels(files(&["a-res.txt", "c-res.txt"]), &mappings).unwrap();
        assert_eq!(
            labeled,
            vec![
                ("TS+Async".to_string(), PathBuf::from("in/c-res.txt")),
                ("base".to_string(), PathBuf::from("in/a-res.txt")),
            ]
        );
    }

    #[test]
    fn explicit_labels_must_cover_files() {
        let mappings = [("a-res.txt".to_string(), "base".to_string())];
        assert!(matches!(
            assign_labels(files(&["a-res.txt", "b-res.txt"]), &mappings),
            Err(Error::InvalidInput(_))
        ));
        let mappings = [
            ("a-res.txt".to_string(), "base".to_string()),
            ("a-res.txt".to_string(), "again".to_string()),
        ];
        assert!(matches!(
            assign_labels(files(&["a-res.txt"]), &mappings),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn find_and_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b-res.txt"), SAMPLE).unwrap();
        fs::write(dir.path().join("a-res.txt"), SAMPLE).unwrap();
        fs::write(dir.path().join("a-res.txt.incomplete"), "junk").unwrap();
        fs::write(dir.path().join("notes.txt"), "junk").unwrap();
        fs::create_dir(dir.path().join("dir-res.txt")).unwrap();

        let found = find_result_files(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("a-res.txt"), dir.path().join("b-res.txt")]
        );
        assert_eq!(
            Series::load("base", &found[0], &COMPARISON_GRID).unwrap(),
            Series {
                label: "base".to_string(),
                jct: vec![12.345, 14.5, 31.75],
            }
        );
    }
}
