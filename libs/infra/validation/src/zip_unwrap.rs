//! Zip extraction (SPEC_FULL.md §4.3 step 1): a submitted file must be a
//! zip containing exactly one CSV whose stem matches the zip's own stem.

use crate::errors::PreValidationError;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Extracts the single matching CSV entry from `zip_path` into a sibling
/// temporary file and returns its path. The archive is consulted only
/// for the one entry; other entries are rejected rather than ignored,
/// since a stray file in the zip usually means the wrong upload.
#[instrument(skip_all, fields(zip_path = %zip_path.display()))]
pub fn unwrap_zip(zip_path: &Path, dest_dir: &Path) -> Result<PathBuf, PreValidationError> {
    let zip_stem = zip_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PreValidationError::Zip(format!("non-UTF8 zip path {zip_path:?}")))?
        .to_string();

    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| PreValidationError::Zip(e.to_string()))?;

    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).map(|f| f.name().to_string()))
        .collect::<Result<_, _>>()
        .map_err(|e| PreValidationError::Zip(e.to_string()))?;

    let matching_index = names.iter().position(|name| {
        Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| stem == zip_stem)
    });

    let Some(index) = matching_index else {
        return Err(PreValidationError::ZipStemMismatch {
            zip_stem,
            found: names,
        });
    };

    let mut entry = archive
        .by_index(index)
        .map_err(|e| PreValidationError::Zip(e.to_string()))?;

    let dest_path = dest_dir.join(format!("{zip_stem}.csv"));
    let mut dest_file = File::create(&dest_path)?;
    io::copy(&mut entry, &mut dest_file)?;
    dest_file.flush()?;

    Ok(dest_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn make_zip(dir: &Path, zip_name: &str, entry_name: &str, contents: &[u8]) -> PathBuf {
        let zip_path = dir.join(zip_name);
        let file = File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(entry_name, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(contents).unwrap();
        writer.finish().unwrap();
        zip_path
    }

    #[test]
    fn extracts_entry_matching_zip_stem() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = make_zip(dir.path(), "op1_20200101_20200102.zip", "op1_20200101_20200102.csv", b"a,b\n1,2\n");
        let extracted = unwrap_zip(&zip_path, dir.path()).unwrap();
        let contents = std::fs::read_to_string(extracted).unwrap();
        assert_eq!(contents, "a,b\n1,2\n");
    }

    #[test]
    fn rejects_entry_whose_stem_does_not_match() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = make_zip(dir.path(), "op1_20200101_20200102.zip", "wrong_name.csv", b"a,b\n1,2\n");
        let err = unwrap_zip(&zip_path, dir.path()).unwrap_err();
        assert!(matches!(err, PreValidationError::ZipStemMismatch { .. }));
    }
}
