//! Fixed-size batching (SPEC_FULL.md §4.3 step 4): split a validated CSV
//! into a lazy sequence of batch files, each carrying the header row.
//! Always emits at least one batch, even for an empty body, so empty
//! imports stay representable downstream.

use crate::errors::PreValidationError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Splits `csv_path` into batches of at most `batch_size` data rows each,
/// writing them under `out_dir` as `batch_0000.csv`, `batch_0001.csv`, ...
#[instrument(skip_all, fields(csv_path = %csv_path.display(), batch_size))]
pub fn split_into_batches(
    csv_path: &Path,
    out_dir: &Path,
    batch_size: usize,
) -> Result<Vec<PathBuf>, PreValidationError> {
    assert!(batch_size > 0, "batch_size must be positive");

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(csv_path)?;
    let headers = reader.headers()?.clone();

    let mut batches = Vec::new();
    let mut current: Option<(PathBuf, csv::Writer<BufWriter<File>>)> = None;
    let mut rows_in_current = 0usize;

    let open_batch = |index: usize| -> Result<(PathBuf, csv::Writer<BufWriter<File>>), PreValidationError> {
        let path = out_dir.join(format!("batch_{index:04}.csv"));
        let file = BufWriter::new(File::create(&path)?);
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(&headers)?;
        Ok((path, writer))
    };

    for record in reader.records() {
        let record = record?;
        if current.is_none() {
            current = Some(open_batch(batches.len())?);
        }
        let (_, writer) = current.as_mut().unwrap();
        writer.write_record(&record)?;
        rows_in_current += 1;

        if rows_in_current == batch_size {
            let (path, mut writer) = current.take().unwrap();
            writer.flush()?;
            batches.push(path);
            rows_in_current = 0;
        }
    }

    if let Some((path, mut writer)) = current {
        writer.flush()?;
        batches.push(path);
    }

    if batches.is_empty() {
        let (path, mut writer) = open_batch(0)?;
        writer.flush()?;
        batches.push(path);
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn splits_rows_across_batches_of_fixed_size() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_csv(dir.path(), "in.csv", "a,b\n1,2\n3,4\n5,6\n7,8\n9,10\n");
        let out_dir = tempfile::tempdir().unwrap();
        let batches = split_into_batches(&csv_path, out_dir.path(), 2).unwrap();
        assert_eq!(batches.len(), 3);
        let first = std::fs::read_to_string(&batches[0]).unwrap();
        assert_eq!(first, "a,b\n1,2\n3,4\n");
        let last = std::fs::read_to_string(&batches[2]).unwrap();
        assert_eq!(last, "a,b\n9,10\n");
    }

    #[test]
    fn empty_body_still_emits_one_batch_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_csv(dir.path(), "in.csv", "a,b\n");
        let out_dir = tempfile::tempdir().unwrap();
        let batches = split_into_batches(&csv_path, out_dir.path(), 100).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(std::fs::read_to_string(&batches[0]).unwrap(), "a,b\n");
    }
}
