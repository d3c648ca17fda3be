//! On-disk rechunking.

use std::path::Path;

use crate::chunks::ChunkSpec;
use crate::dataset::Dataset;
use crate::store::{ensure_store_absent, StorePath};
use crate::writer::{write_dataset, zarr_path, WriteOptions};
use crate::{Error, Result};

/// Write `ds` to `target_store` with a new chunk layout.
///
/// The dataset is first written into `temp_store`, which is then moved into
/// place; the temporary store never outlives the call. With `force`, a
/// pre-existing target store is removed, otherwise it is an error. Any failure
/// is reported as [`Error::Rechunk`] wrapping the underlying cause.
pub fn rechunk_dataset(
    ds: &Dataset,
    target_chunks: &ChunkSpec,
    target_store: &impl StorePath,
    temp_store: &impl StorePath,
    force: bool,
) -> Result<()> {
    let target = target_store.path().to_path_buf();
    let temp = zarr_path(temp_store.path());

    ensure_store_absent(&target, force)?;
    // Leftovers from an aborted run are always removed.
    ensure_store_absent(&temp, true)?;

    log::info!(
        "rechunking into {} via {}",
        target.display(),
        temp.display()
    );
    run_rechunk(ds, target_chunks, &target, &temp).map_err(|source| {
        if temp.exists() {
            if let Err(cleanup) = std::fs::remove_dir_all(&temp) {
                log::warn!(
                    "could not remove temporary store {}: {cleanup}",
                    temp.display()
                );
            }
        }
        Error::Rechunk {
            target: target.clone(),
            source: Box::new(source),
        }
    })
}

fn run_rechunk(
    ds: &Dataset,
    target_chunks: &ChunkSpec,
    target: &Path,
    temp: &Path,
) -> Result<()> {
    let options = WriteOptions {
        chunks: target_chunks.clone(),
        ..Default::default()
    };
    let written = write_dataset(temp, ds, &options)?;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(&written, target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::{ChunkMapping, ChunkSize};
    use crate::dataset::{Variable, VariableData};

    #[test]
    fn existing_target_without_force_is_wrapped_nowhere() {
        // The existence check fires before anything is written, so the error is
        // the plain store error, not a rechunk failure.
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target.zarr");
        std::fs::create_dir(&target).unwrap();

        let mut ds = Dataset::new();
        ds.insert(
            "temp",
            Variable::new(
                vec!["x"],
                VariableData::F64(ndarray::ArrayD::zeros(vec![4])),
            )
            .unwrap(),
        )
        .unwrap();

        let chunks = ChunkSpec::Explicit(ChunkMapping::PerDimension(
            [("x".to_string(), ChunkSize::Size(2))].into_iter().collect(),
        ));
        let temp = dir.path().join("tmp.zarr");
        let err = rechunk_dataset(&ds, &chunks, &target, &temp, false).unwrap_err();
        assert!(matches!(err, Error::StoreExists(_)));
    }

    #[test]
    fn invalid_target_chunks_are_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target.zarr");
        let temp = dir.path().join("tmp.zarr");

        let mut ds = Dataset::new();
        ds.insert(
            "temp",
            Variable::new(
                vec!["x"],
                VariableData::F64(ndarray::ArrayD::zeros(vec![4])),
            )
            .unwrap(),
        )
        .unwrap();

        // Wrong dimension name: normalization fails inside the write.
        let chunks = ChunkSpec::Explicit(ChunkMapping::PerDimension(
            [("y".to_string(), ChunkSize::Size(2))].into_iter().collect(),
        ));
        let err = rechunk_dataset(&ds, &chunks, &target, &temp, false).unwrap_err();
        let Error::Rechunk { source, .. } = err else {
            panic!("expected a rechunk error, got {err}");
        };
        assert!(matches!(*source, Error::ChunkSpec(_)));
        assert!(!temp.exists());
    }
}
