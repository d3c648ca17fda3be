//! Dataset writing.
//!
//! [`write_dataset`] checks the chunk, compressor and rounding configuration
//! against the dataset, then hands the actual storage work to `zarrs`: one
//! group at the store root, one array per variable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zarrs::array::{Array, ArrayBuilder, data_type};
use zarrs::array::ArraySubset;
use zarrs::filesystem::FilesystemStore;
use zarrs::group::GroupBuilder;
use zarrs::storage::{ReadableWritableListableStorage, ReadableWritableListableStorageTraits};

use crate::chunks::{normalize_chunks, ChunkMapping, ChunkSpec};
use crate::codecs::Compressor;
use crate::compressor::{normalize_compressor, CompressorSpec};
use crate::dataset::{Dataset, Variable, VariableData};
use crate::rounding::{normalize_rounding, RoundingSpec};
use crate::store::ensure_store_absent;
use crate::{Error, Result};

/// Options for [`write_dataset`].
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Chunk layout. Defaults to keeping each variable's current layout.
    pub chunks: ChunkSpec,
    /// Fallback layout when `chunks` is [`ChunkSpec::Auto`].
    pub default_chunks: Option<ChunkMapping>,
    /// Compression. Defaults to `Auto` (the default compressor, or none).
    pub compressor: CompressorSpec,
    /// Fallback when `compressor` is [`CompressorSpec::Auto`].
    pub default_compressor: Option<CompressorSpec>,
    /// Decimal rounding applied to float variables before writing.
    pub rounding: Option<RoundingSpec>,
    /// Remove a pre-existing store instead of erroring.
    pub overwrite: bool,
    /// Append along this dimension when the store already exists.
    pub append_dim: Option<String>,
}

/// Write a dataset to a zarr store at `path`, creating one array per variable.
///
/// The path is given a `.zarr` suffix if it has none. Returns the resolved
/// store path.
///
/// When the store already exists: with `append_dim` set, variables carrying
/// that dimension are grown along it and the rest are left untouched; with
/// `overwrite`, the store is replaced; otherwise this is an error.
pub fn write_dataset(
    path: impl AsRef<Path>,
    ds: &Dataset,
    options: &WriteOptions,
) -> Result<PathBuf> {
    let path = zarr_path(path.as_ref());
    let exists = path.exists();
    // Appending to a store that does not exist yet degrades to a plain write.
    let append_dim = match &options.append_dim {
        Some(dim) if exists => Some(dim.as_str()),
        _ => None,
    };
    if exists && append_dim.is_none() {
        ensure_store_absent(&path, options.overwrite)?;
    }

    let variable_names = ds.variable_names();
    let chunks = normalize_chunks(ds, &options.chunks, options.default_chunks.as_ref())?;
    let compressors = normalize_compressor(
        &options.compressor,
        &variable_names,
        options.default_compressor.as_ref(),
    )?;
    let rounding = normalize_rounding(options.rounding.clone(), &variable_names)?;

    if let Some(append_dim) = append_dim {
        log::info!(
            "appending to {} along dimension {append_dim:?}",
            path.display()
        );
        append_to_store(&path, ds, &rounding, append_dim)?;
        return Ok(path);
    }

    log::info!(
        "writing {} variables to {}",
        variable_names.len(),
        path.display()
    );
    std::fs::create_dir_all(&path)?;
    let store: ReadableWritableListableStorage =
        Arc::new(FilesystemStore::new(&path).map_err(Error::wrap)?);

    let root = GroupBuilder::new()
        .attributes(ds.attributes().clone())
        .build(store.clone(), "/")?;
    root.store_metadata()?;

    for (name, variable) in ds.variables() {
        let data = rounded_data(name, variable, &rounding);
        write_variable(
            &store,
            name,
            variable,
            &data,
            &chunks[name],
            compressors[name].as_ref(),
        )?;
    }
    Ok(path)
}

/// Add a `.zarr` suffix when the path has none.
pub(crate) fn zarr_path(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == "zarr" => path.to_path_buf(),
        _ => {
            let mut with_suffix = path.as_os_str().to_owned();
            with_suffix.push(".zarr");
            PathBuf::from(with_suffix)
        }
    }
}

fn rounded_data(
    name: &str,
    variable: &Variable,
    rounding: &Option<RoundingSpec>,
) -> VariableData {
    let decimals = match rounding {
        None => None,
        Some(RoundingSpec::Uniform(decimals)) => Some(*decimals),
        Some(RoundingSpec::PerVariable(map)) => map.get(name).copied().flatten(),
    };
    match decimals {
        Some(decimals) => variable.data().rounded(decimals),
        None => variable.data().clone(),
    }
}

fn write_variable(
    store: &ReadableWritableListableStorage,
    name: &str,
    variable: &Variable,
    data: &VariableData,
    chunks: &BTreeMap<String, u64>,
    compressor: Option<&Compressor>,
) -> Result<()> {
    // Canonical chunks come back keyed by dimension name; zarrs wants them in
    // the variable's own dimension order.
    let chunk_shape: Vec<u64> = variable.dims().iter().map(|dim| chunks[dim]).collect();
    log::debug!("writing variable {name:?} with chunk shape {chunk_shape:?}");

    let mut builder = variable_builder(data, variable.shape(), chunk_shape);
    builder.dimension_names(Some(variable.dims().to_vec()));
    builder.attributes(variable.attributes().clone());
    if let Some(compressor) = compressor {
        compressor.apply_to_builder(&mut builder, data.element_size() as usize)?;
    }

    let array = builder.build(store.clone(), &format!("/{name}"))?;
    array.store_metadata()?;
    store_all(&array, data)
}

/// An array builder with the data type and fill value matching the variable's
/// data. Integers fill with zero, floats with NaN.
fn variable_builder(data: &VariableData, shape: Vec<u64>, chunk_shape: Vec<u64>) -> ArrayBuilder {
    match data {
        VariableData::F32(_) => {
            ArrayBuilder::new(shape, chunk_shape, data_type::float32(), f32::NAN)
        }
        VariableData::F64(_) => {
            ArrayBuilder::new(shape, chunk_shape, data_type::float64(), f64::NAN)
        }
        VariableData::I32(_) => ArrayBuilder::new(shape, chunk_shape, data_type::int32(), 0i32),
        VariableData::I64(_) => ArrayBuilder::new(shape, chunk_shape, data_type::int64(), 0i64),
        VariableData::U8(_) => ArrayBuilder::new(shape, chunk_shape, data_type::uint8(), 0u8),
    }
}

fn append_to_store(
    path: &Path,
    ds: &Dataset,
    rounding: &Option<RoundingSpec>,
    append_dim: &str,
) -> Result<()> {
    let store: ReadableWritableListableStorage =
        Arc::new(FilesystemStore::new(path).map_err(Error::wrap)?);

    for (name, variable) in ds.variables() {
        let Some(axis) = variable.dims().iter().position(|dim| dim == append_dim) else {
            log::debug!("variable {name:?} has no dimension {append_dim:?}; not appended");
            continue;
        };

        let mut array = Array::open(store.clone(), &format!("/{name}"))?;
        let stored_shape = array.shape().to_vec();
        let slab_shape = variable.shape();
        if stored_shape.len() != slab_shape.len() {
            return Err(Error::Dataset(format!(
                "stored variable {name:?} is {}-dimensional, dataset variable is {}-dimensional",
                stored_shape.len(),
                slab_shape.len()
            )));
        }
        for (i, (&stored, &slab)) in stored_shape.iter().zip(slab_shape.iter()).enumerate() {
            if i != axis && stored != slab {
                return Err(Error::Dataset(format!(
                    "dimension {:?} of variable {name:?} has length {slab}, stored length is {stored}",
                    variable.dims()[i]
                )));
            }
        }

        let mut new_shape = stored_shape.clone();
        new_shape[axis] += slab_shape[axis];
        array.set_shape(new_shape)?;
        array.store_metadata()?;

        let mut start = vec![0u64; stored_shape.len()];
        start[axis] = stored_shape[axis];
        let subset =
            ArraySubset::new_with_start_shape(start, slab_shape.clone()).map_err(Error::wrap)?;
        let data = rounded_data(name, variable, rounding);
        store_subset(&array, &data, &subset)?;
    }
    Ok(())
}

fn store_all(
    array: &Array<dyn ReadableWritableListableStorageTraits>,
    data: &VariableData,
) -> Result<()> {
    store_subset(array, data, &array.subset_all())
}

fn store_subset(
    array: &Array<dyn ReadableWritableListableStorageTraits>,
    data: &VariableData,
    subset: &ArraySubset,
) -> Result<()> {
    if data.num_elements() == 0 {
        return Ok(());
    }
    match data {
        VariableData::F32(a) => array.store_array_subset_elements(subset, &flattened(a))?,
        VariableData::F64(a) => array.store_array_subset_elements(subset, &flattened(a))?,
        VariableData::I32(a) => array.store_array_subset_elements(subset, &flattened(a))?,
        VariableData::I64(a) => array.store_array_subset_elements(subset, &flattened(a))?,
        VariableData::U8(a) => array.store_array_subset_elements(subset, &flattened(a))?,
    }
    Ok(())
}

fn flattened<T: Clone>(a: &ndarray::ArrayD<T>) -> Vec<T> {
    a.iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zarr_suffix_is_added_once() {
        assert_eq!(zarr_path(Path::new("/tmp/ds")), Path::new("/tmp/ds.zarr"));
        assert_eq!(
            zarr_path(Path::new("/tmp/ds.zarr")),
            Path::new("/tmp/ds.zarr")
        );
        assert_eq!(
            zarr_path(Path::new("/tmp/v1.2")),
            Path::new("/tmp/v1.2.zarr")
        );
    }

    #[test]
    fn per_variable_rounding_resolution() {
        let variable = Variable::new(
            vec!["x"],
            VariableData::F64(ndarray::ArrayD::from_elem(vec![1], 1.987)),
        )
        .unwrap();
        let map = [("temp".to_string(), Some(1i64))].into_iter().collect();
        let rounding = Some(RoundingSpec::PerVariable(map));

        let VariableData::F64(rounded) = rounded_data("temp", &variable, &rounding) else {
            panic!("expected f64 data");
        };
        assert!((rounded[[0]] - 2.0).abs() < 1e-12);

        // Variables outside the mapping are untouched.
        let VariableData::F64(untouched) = rounded_data("other", &variable, &rounding) else {
            panic!("expected f64 data");
        };
        assert!((untouched[[0]] - 1.987).abs() < 1e-12);
    }
}
