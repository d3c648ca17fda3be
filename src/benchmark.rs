//! Profiling helpers for the zarr write/read path.
//!
//! Everything here is a thin loop around [`write_dataset`] / [`open_dataset`]
//! plus storage-size accounting; useful when picking a chunk layout or
//! comparing codecs for a given dataset.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use itertools::iproduct;
use serde::Serialize;
use zarrs::filesystem::FilesystemStore;
use zarrs::storage::{ListableStorageTraits, StorePrefix};

use crate::codecs::{build_codec, valid_blosc_algorithms, BloscAlgorithm, CodecParams};
use crate::compressor::CompressorSpec;
use crate::dataset::Dataset;
use crate::reader::open_dataset;
use crate::store::ensure_store_absent;
use crate::writer::{write_dataset, WriteOptions};
use crate::{Error, Result};

const MIB: f64 = 1024.0 * 1024.0;

/// Stored (compressed) bytes per variable of a store on disk.
pub fn stored_bytes_per_variable(path: impl AsRef<Path>) -> Result<BTreeMap<String, u64>> {
    let store = FilesystemStore::new(path.as_ref()).map_err(Error::wrap)?;
    let mut out = BTreeMap::new();
    for prefix in store.list_dir(&StorePrefix::root())?.prefixes() {
        let name = prefix.as_str().trim_end_matches('/').to_string();
        out.insert(name, store.size_prefix(prefix)?);
    }
    Ok(out)
}

/// Total stored bytes of a store on disk.
pub fn stored_bytes(path: impl AsRef<Path>) -> Result<u64> {
    let store = FilesystemStore::new(path.as_ref()).map_err(Error::wrap)?;
    Ok(store.size()?)
}

/// In-memory bytes per variable.
pub fn memory_bytes_per_variable(ds: &Dataset) -> BTreeMap<String, u64> {
    ds.variables()
        .map(|(name, variable)| (name.clone(), variable.nbytes()))
        .collect()
}

/// In-memory bytes of a single chunk, per variable. Unchunked variables count
/// as one whole-array chunk.
pub fn chunk_memory_bytes(ds: &Dataset) -> BTreeMap<String, u64> {
    ds.variables()
        .map(|(name, variable)| {
            let elements: u64 = match variable.chunks() {
                Some(chunks) => chunks.iter().product(),
                None => variable.shape().iter().product(),
            };
            (name.clone(), elements * variable.data().element_size())
        })
        .collect()
}

/// Uncompressed-to-stored size ratio of a store on disk.
pub fn storage_ratio(path: impl AsRef<Path>) -> Result<f64> {
    let path = path.as_ref();
    let ds = open_dataset(path)?;
    let stored = stored_bytes(path)?;
    if stored == 0 {
        return Err(Error::general(format!(
            "empty store at {}",
            path.display()
        )));
    }
    Ok(ds.nbytes() as f64 / stored as f64)
}

/// Time `n_repetitions` writes of `ds` to `path`.
///
/// The store is removed between repetitions, and afterwards unless
/// `keep_last`.
pub fn writing_time(
    ds: &Dataset,
    path: impl AsRef<Path>,
    options: &WriteOptions,
    n_repetitions: usize,
    keep_last: bool,
) -> Result<Vec<Duration>> {
    let mut times = Vec::with_capacity(n_repetitions);
    for i in 0..n_repetitions {
        let start = Instant::now();
        let written = write_dataset(path.as_ref(), ds, options)?;
        times.push(start.elapsed());
        if i + 1 < n_repetitions || !keep_last {
            std::fs::remove_dir_all(&written)?;
        }
    }
    Ok(times)
}

/// Time `n_repetitions` full reads of the store at `path`.
pub fn reading_time(path: impl AsRef<Path>, n_repetitions: usize) -> Result<Vec<Duration>> {
    let mut times = Vec::with_capacity(n_repetitions);
    for _ in 0..n_repetitions {
        let start = Instant::now();
        open_dataset(path.as_ref())?;
        times.push(start.elapsed());
    }
    Ok(times)
}

/// Write throughput in MiB/s, one value per repetition.
pub fn writing_throughput(
    ds: &Dataset,
    path: impl AsRef<Path>,
    options: &WriteOptions,
    n_repetitions: usize,
) -> Result<Vec<f64>> {
    let times = writing_time(ds, path, options, n_repetitions, false)?;
    let megabytes = ds.nbytes() as f64 / MIB;
    Ok(times
        .iter()
        .map(|time| megabytes / time.as_secs_f64())
        .collect())
}

/// Read throughput in MiB/s, one value per repetition.
pub fn reading_throughput(path: impl AsRef<Path>, n_repetitions: usize) -> Result<Vec<f64>> {
    let megabytes = open_dataset(path.as_ref())?.nbytes() as f64 / MIB;
    let times = reading_time(path, n_repetitions)?;
    Ok(times
        .iter()
        .map(|time| megabytes / time.as_secs_f64())
        .collect())
}

/// Results of [`benchmark_compressors`], keyed by codec acronym.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BenchmarkReport {
    /// Write time in seconds.
    pub writing: BTreeMap<String, f64>,
    /// Read time in seconds.
    pub reading: BTreeMap<String, f64>,
    /// Stored size in MiB.
    pub filesize: BTreeMap<String, f64>,
}

/// Write and read `ds` once per codec-name/level combination, recording
/// timings and stored sizes.
///
/// `blosc` expands over all its inner algorithms. Stores are created under
/// `dst_dir`, named after the codec acronym, and left on disk for inspection.
pub fn benchmark_compressors(
    ds: &Dataset,
    names: &[&str],
    clevels: &[u32],
    dst_dir: impl AsRef<Path>,
    prefix: &str,
    suffix: &str,
) -> Result<BenchmarkReport> {
    let dst_dir = dst_dir.as_ref();
    std::fs::create_dir_all(dst_dir)?;
    let mut report = BenchmarkReport::default();

    for (&name, &clevel) in iproduct!(names, clevels) {
        let algorithms: Vec<Option<BloscAlgorithm>> = if name == "blosc" {
            valid_blosc_algorithms().iter().copied().map(Some).collect()
        } else {
            vec![None]
        };

        for algorithm in algorithms {
            let acronym = codec_acronym(prefix, name, algorithm, clevel, suffix);
            let params = CodecParams {
                clevel: Some(clevel),
                algorithm,
                ..Default::default()
            };
            let compressor = match build_codec(name, &params)? {
                Some(codec) => CompressorSpec::Single(codec),
                None => CompressorSpec::None,
            };
            let options = WriteOptions {
                compressor,
                ..Default::default()
            };
            let store_path = dst_dir.join(format!("{acronym}.zarr"));
            ensure_store_absent(&store_path, true)?;

            log::info!("benchmarking {acronym}");
            let start = Instant::now();
            let written = write_dataset(&store_path, ds, &options)?;
            report
                .writing
                .insert(acronym.clone(), start.elapsed().as_secs_f64());

            report
                .filesize
                .insert(acronym.clone(), stored_bytes(&written)? as f64 / MIB);

            let start = Instant::now();
            open_dataset(&written)?;
            report
                .reading
                .insert(acronym, start.elapsed().as_secs_f64());
        }
    }
    Ok(report)
}

fn codec_acronym(
    prefix: &str,
    name: &str,
    algorithm: Option<BloscAlgorithm>,
    clevel: u32,
    suffix: &str,
) -> String {
    let mut acronym = match algorithm {
        Some(algorithm) => format!("{name}_{}_c{clevel}", algorithm.as_str()),
        None => format!("{name}_c{clevel}"),
    };
    if !prefix.is_empty() {
        acronym = format!("{prefix}_{acronym}");
    }
    if !suffix.is_empty() {
        acronym = format!("{acronym}_{suffix}");
    }
    acronym
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Variable, VariableData};

    #[test]
    fn acronym_naming() {
        assert_eq!(codec_acronym("", "gzip", None, 5, ""), "gzip_c5");
        assert_eq!(
            codec_acronym("pre", "blosc", Some(BloscAlgorithm::Zstd), 3, "post"),
            "pre_blosc_zstd_c3_post"
        );
    }

    #[test]
    fn chunk_memory_accounting() {
        let mut ds = Dataset::new();
        ds.insert(
            "temp",
            Variable::new(
                vec!["time", "lat"],
                VariableData::F64(ndarray::ArrayD::zeros(vec![10, 4])),
            )
            .unwrap()
            .with_chunks(vec![5, 2])
            .unwrap(),
        )
        .unwrap();
        ds.insert(
            "mask",
            Variable::new(vec!["lat"], VariableData::U8(ndarray::ArrayD::zeros(vec![4]))).unwrap(),
        )
        .unwrap();

        let chunk_bytes = chunk_memory_bytes(&ds);
        assert_eq!(chunk_bytes["temp"], 5 * 2 * 8);
        // Unchunked: the whole array counts as one chunk.
        assert_eq!(chunk_bytes["mask"], 4);

        let memory = memory_bytes_per_variable(&ds);
        assert_eq!(memory["temp"], 10 * 4 * 8);
        assert_eq!(memory["mask"], 4);
    }
}
