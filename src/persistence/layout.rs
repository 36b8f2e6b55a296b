//! Directory layout of a saved index.
//!
//! ```text
//! <dir>/ids        encoded identifiers, one per line, in position order
//! <dir>/dimension  vector length as decimal text
//! <dir>/metric     metric name
//! <dir>/index      engine blob
//! ```

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{AnnoyError, Result};
use crate::metric::Metric;

use super::codec::IdentifierCodec;

pub const IDS_FILE: &str = "ids";
pub const DIMENSION_FILE: &str = "dimension";
pub const METRIC_FILE: &str = "metric";
pub const INDEX_FILE: &str = "index";

/// Index metadata stored next to the engine blob.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest<T> {
    pub ids: Vec<T>,
    pub dimension: usize,
    pub metric: Metric,
}

/// Make sure `dir` is a usable output directory, creating it if needed.
pub fn prepare_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(AnnoyError::invalid(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Absolute path of the engine blob inside `dir`.
pub fn blob_path(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(INDEX_FILE);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Write `ids`, `dimension` and `metric` into an existing directory.
pub fn write_manifest<T, C>(dir: &Path, ids: &[T], dimension: usize, metric: Metric, codec: &C) -> Result<()>
where
    C: IdentifierCodec<T> + ?Sized,
{
    let mut lines = Vec::with_capacity(ids.len());
    for (position, id) in ids.iter().enumerate() {
        let line = codec.encode(id)?;
        if line.contains(['\n', '\r']) {
            return Err(AnnoyError::invalid(format!(
                "identifier at position {} encodes to more than one line",
                position
            )));
        }
        lines.push(line);
    }

    let mut writer = BufWriter::new(fs::File::create(dir.join(IDS_FILE))?);
    for line in &lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    fs::write(dir.join(DIMENSION_FILE), dimension.to_string())?;
    fs::write(dir.join(METRIC_FILE), metric.name())?;
    Ok(())
}

/// Read the metadata files of a saved index.
pub fn read_manifest<T, C>(dir: &Path, codec: &C) -> Result<Manifest<T>>
where
    C: IdentifierCodec<T> + ?Sized,
{
    let ids = fs::read_to_string(dir.join(IDS_FILE))?
        .lines()
        .map(|line| codec.decode(line))
        .collect::<Result<Vec<T>>>()?;

    let dimension_text = fs::read_to_string(dir.join(DIMENSION_FILE))?;
    let dimension = dimension_text
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| {
            AnnoyError::corrupt(format!("invalid dimension: {:?}", dimension_text.trim()))
        })?;

    let metric = fs::read_to_string(dir.join(METRIC_FILE))?.trim().parse::<Metric>()?;

    Ok(Manifest {
        ids,
        dimension,
        metric,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::codec::{JsonCodec, ParseCodec, StringCodec};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_roundtrip() {
        let dir = TempDir::new().unwrap();
        let codec = ParseCodec::<i32>::new();
        write_manifest(dir.path(), &[10, 11, 10], 2, Metric::Manhattan, &codec).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join(IDS_FILE)).unwrap(), "10\n11\n10\n");
        assert_eq!(fs::read_to_string(dir.path().join(DIMENSION_FILE)).unwrap(), "2");
        assert_eq!(fs::read_to_string(dir.path().join(METRIC_FILE)).unwrap(), "Manhattan");

        let manifest = read_manifest(dir.path(), &codec).unwrap();
        assert_eq!(manifest.ids, vec![10, 11, 10]);
        assert_eq!(manifest.dimension, 2);
        assert_eq!(manifest.metric, Metric::Manhattan);
    }

    #[test]
    fn test_multiline_identifier_rejected() {
        let dir = TempDir::new().unwrap();
        let ids = vec!["ok".to_string(), "bad\nid".to_string()];
        let err = write_manifest(dir.path(), &ids, 2, Metric::Angular, &StringCodec).unwrap_err();
        assert!(matches!(err, AnnoyError::InvalidInput(_)));
        assert!(!dir.path().join(IDS_FILE).exists());
    }

    #[test]
    fn test_unencodable_identifier_rejected() {
        let dir = TempDir::new().unwrap();
        let mut key = BTreeMap::new();
        key.insert(vec![7u8], 1u8);
        let ids = vec![BTreeMap::new(), key];
        let err = write_manifest(dir.path(), &ids, 2, Metric::Angular, &JsonCodec::new()).unwrap_err();
        assert!(matches!(err, AnnoyError::InvalidInput(_)));
        assert!(!dir.path().join(IDS_FILE).exists());
    }

    #[test]
    fn test_unknown_metric_is_corrupt() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), &[1], 2, Metric::Angular, &ParseCodec::<i32>::new()).unwrap();
        fs::write(dir.path().join(METRIC_FILE), "Chebyshev").unwrap();

        let err = read_manifest(dir.path(), &ParseCodec::<i32>::new()).unwrap_err();
        assert!(matches!(err, AnnoyError::Corrupt(_)));
    }

    #[test]
    fn test_bad_dimension_is_corrupt() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), &[1], 2, Metric::Angular, &ParseCodec::<i32>::new()).unwrap();
        for bad in ["zero", "0", "-3"] {
            fs::write(dir.path().join(DIMENSION_FILE), bad).unwrap();
            let err = read_manifest(dir.path(), &ParseCodec::<i32>::new()).unwrap_err();
            assert!(matches!(err, AnnoyError::Corrupt(_)), "{}", bad);
        }
    }

    #[test]
    fn test_prepare_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        prepare_dir(&nested).unwrap();
        assert!(nested.is_dir());
        prepare_dir(&nested).unwrap();

        let file = dir.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(matches!(prepare_dir(&file), Err(AnnoyError::InvalidInput(_))));
    }

    #[test]
    fn test_blob_path_is_absolute() {
        let path = blob_path(Path::new("relative/dir")).unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("relative/dir/index"));
    }
}
