//! Dataset reading.

use std::path::Path;
use std::sync::Arc;

use zarrs::array::{Array, data_type};
use zarrs::filesystem::FilesystemStore;
use zarrs::group::Group;
use zarrs::storage::{
    ListableStorageTraits, ReadableStorageTraits, ReadableWritableListableStorage,
    ReadableWritableListableStorageTraits, StoreKey, StorePrefix,
};

use crate::dataset::{Dataset, Variable, VariableData};
use crate::{Error, Result};

/// Open a zarr store written by [`write_dataset`](crate::writer::write_dataset)
/// as an in-memory dataset.
///
/// Every child array of the root group becomes a variable; dimension names
/// missing from the stored metadata fall back to `dim_<i>`.
pub fn open_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::general(format!("no store at {}", path.display())));
    }
    let store: ReadableWritableListableStorage =
        Arc::new(FilesystemStore::new(path).map_err(Error::wrap)?);

    let mut ds = Dataset::new();
    if let Ok(root) = Group::open(store.clone(), "/") {
        *ds.attributes_mut() = root.attributes().clone();
    }

    for prefix in store.list_dir(&StorePrefix::root())?.prefixes() {
        let name = prefix.as_str().trim_end_matches('/').to_string();
        // Children that are not arrays (nested groups) are not part of the
        // dataset model and are skipped.
        let Ok(array) = Array::open(store.clone(), &format!("/{name}")) else {
            log::debug!("skipping non-array store entry {name:?}");
            continue;
        };
        let mut variable = read_variable(&array)?;
        if let Some(chunks) = chunk_layout(&store, &name)? {
            variable = variable.with_chunks(chunks)?;
        }
        ds.insert(name, variable)?;
    }
    Ok(ds)
}

fn read_variable(array: &Array<dyn ReadableWritableListableStorageTraits>) -> Result<Variable> {
    let ndim = array.shape().len();
    let dims: Vec<String> = match array.dimension_names() {
        Some(names) => names
            .iter()
            .enumerate()
            .map(|(i, name)| name.clone().unwrap_or_else(|| format!("dim_{i}")))
            .collect(),
        None => (0..ndim).map(|i| format!("dim_{i}")).collect(),
    };

    let subset = array.subset_all();
    let dtype = array.data_type();
    let data = if *dtype == data_type::float32() {
        VariableData::F32(array.retrieve_array_subset_ndarray::<f32>(&subset)?)
    } else if *dtype == data_type::float64() {
        VariableData::F64(array.retrieve_array_subset_ndarray::<f64>(&subset)?)
    } else if *dtype == data_type::int32() {
        VariableData::I32(array.retrieve_array_subset_ndarray::<i32>(&subset)?)
    } else if *dtype == data_type::int64() {
        VariableData::I64(array.retrieve_array_subset_ndarray::<i64>(&subset)?)
    } else if *dtype == data_type::uint8() {
        VariableData::U8(array.retrieve_array_subset_ndarray::<u8>(&subset)?)
    } else {
        return Err(Error::general(format!(
            "unsupported data type {dtype:?} in stored array"
        )));
    };

    Variable::new(dims, data)
        .map(|variable| variable.with_attributes(array.attributes().clone()))
}

/// Extract the regular chunk shape of an array from its stored metadata.
///
/// Returns `None` for anything without a regular chunk grid.
fn chunk_layout(
    store: &ReadableWritableListableStorage,
    name: &str,
) -> Result<Option<Vec<u64>>> {
    let key = StoreKey::new(format!("{name}/zarr.json")).map_err(Error::wrap)?;
    let Some(bytes) = store.get(&key)? else {
        return Ok(None);
    };
    let metadata: serde_json::Value = serde_json::from_slice(&bytes)?;
    if metadata.pointer("/chunk_grid/name").and_then(|v| v.as_str()) != Some("regular") {
        return Ok(None);
    }
    let chunk_shape = metadata
        .pointer("/chunk_grid/configuration/chunk_shape")
        .and_then(|v| v.as_array())
        .map(|sizes| sizes.iter().filter_map(|v| v.as_u64()).collect::<Vec<u64>>());
    Ok(chunk_shape)
}
