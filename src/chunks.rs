//! Chunk specification checking.
//!
//! A chunk specification comes in one of three shapes: keep the dataset's current
//! layout, derive a layout from defaults, or an explicit mapping keyed either by
//! every dimension or by every variable. [`normalize_chunks`] reconciles all of
//! them into one canonical per-variable, per-dimension mapping of positive chunk
//! sizes, which is what the on-disk format accepts.

use std::collections::{BTreeMap, BTreeSet};

use crate::dataset::Dataset;
use crate::{Error, Result};

/// Canonical chunk layout: variable name to a mapping of that variable's
/// dimension names to positive chunk sizes.
pub type VariableChunks = BTreeMap<String, BTreeMap<String, u64>>;

/// A single chunk-size entry in a raw specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSize {
    /// Derive the size automatically. Only meaningful as a top-level shortcut;
    /// rejected inside explicit mappings.
    Auto,
    /// The whole dimension. Rewritten to the dimension length during
    /// canonicalization, since the persisted format has no whole-dimension
    /// sentinel.
    Full,
    /// An explicit chunk size. Must be positive.
    Size(u64),
}

/// An explicit chunk mapping, keyed by dimension or by variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkMapping {
    /// One chunk size per dataset dimension, applied to every variable that has
    /// that dimension. Keys must cover the dimension set exactly.
    PerDimension(BTreeMap<String, ChunkSize>),
    /// One chunk sub-mapping per variable. Keys must cover the variable set
    /// exactly, and each sub-mapping must cover that variable's dimensions
    /// exactly.
    PerVariable(BTreeMap<String, BTreeMap<String, ChunkSize>>),
}

/// A chunk specification as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChunkSpec {
    /// Keep the dataset's current chunk layout.
    #[default]
    Unset,
    /// Use the default chunk mapping.
    Auto,
    /// Use the given mapping.
    Explicit(ChunkMapping),
}

/// Normalize a chunk specification against a dataset.
///
/// `default_chunks` is only consulted when `chunks` is [`ChunkSpec::Auto`].
/// Returns the canonical per-variable layout; every variable is present, every
/// one of its dimensions is present, and every size is a positive integer.
pub fn normalize_chunks(
    ds: &Dataset,
    chunks: &ChunkSpec,
    default_chunks: Option<&ChunkMapping>,
) -> Result<VariableChunks> {
    let mapping = match chunks {
        ChunkSpec::Unset => current_layout_mapping(ds),
        ChunkSpec::Auto => match default_chunks {
            Some(default) => default.clone(),
            None => all_auto_mapping(ds),
        },
        ChunkSpec::Explicit(mapping) => mapping.clone(),
    };

    let per_variable = match mapping {
        ChunkMapping::PerDimension(map) => expand_per_dimension(ds, &map)?,
        ChunkMapping::PerVariable(map) => check_per_variable(ds, map)?,
    };

    sanitize_chunks(ds, per_variable)
}

/// The dataset's current layout as a per-variable mapping. Unchunked variables
/// become whole-dimension chunks.
fn current_layout_mapping(ds: &Dataset) -> ChunkMapping {
    let mut per_variable = BTreeMap::new();
    for (name, chunks) in ds.current_chunks() {
        let variable_chunks = match chunks {
            Some(chunks) => chunks
                .into_iter()
                .map(|(dim, size)| (dim, ChunkSize::Size(size)))
                .collect(),
            None => ds
                .get(&name)
                .map(|variable| {
                    variable
                        .dims()
                        .iter()
                        .map(|dim| (dim.clone(), ChunkSize::Full))
                        .collect()
                })
                .unwrap_or_default(),
        };
        per_variable.insert(name, variable_chunks);
    }
    ChunkMapping::PerVariable(per_variable)
}

/// The synthesized default when `Auto` is requested with no default mapping:
/// every dimension set to `Auto`. This fails value validation further down,
/// identically to an explicit all-auto default.
fn all_auto_mapping(ds: &Dataset) -> ChunkMapping {
    ChunkMapping::PerDimension(
        ds.dims()
            .into_keys()
            .map(|dim| (dim, ChunkSize::Auto))
            .collect(),
    )
}

fn check_same_keys<'a>(
    actual: impl Iterator<Item = &'a String>,
    expected: impl Iterator<Item = &'a String>,
    what: &str,
) -> Result<()> {
    let actual: BTreeSet<&String> = actual.collect();
    let expected: BTreeSet<&String> = expected.collect();
    if actual != expected {
        return Err(Error::ChunkSpec(format!(
            "{what} must be {expected:?}, got {actual:?}"
        )));
    }
    Ok(())
}

/// Expand a per-dimension mapping onto each variable's own dimension list.
fn expand_per_dimension(
    ds: &Dataset,
    map: &BTreeMap<String, ChunkSize>,
) -> Result<BTreeMap<String, BTreeMap<String, ChunkSize>>> {
    let dims = ds.dims();
    check_same_keys(map.keys(), dims.keys(), "per-dimension chunk keys")?;

    let mut per_variable = BTreeMap::new();
    for (name, variable) in ds.variables() {
        let variable_chunks = variable
            .dims()
            .iter()
            .map(|dim| (dim.clone(), map[dim]))
            .collect();
        per_variable.insert(name.clone(), variable_chunks);
    }
    Ok(per_variable)
}

/// Validate a per-variable mapping: full variable coverage, and full dimension
/// coverage within each variable.
fn check_per_variable(
    ds: &Dataset,
    map: BTreeMap<String, BTreeMap<String, ChunkSize>>,
) -> Result<BTreeMap<String, BTreeMap<String, ChunkSize>>> {
    let names = ds.variable_names();
    check_same_keys(map.keys(), names.iter(), "per-variable chunk keys")?;

    for (name, variable) in ds.variables() {
        check_same_keys(
            map[name].keys(),
            variable.dims().iter(),
            &format!("chunk keys for variable {name:?}"),
        )?;
    }
    Ok(map)
}

/// Final pass: rewrite whole-dimension sentinels to the dimension length and
/// reject anything that is not a positive integer.
fn sanitize_chunks(
    ds: &Dataset,
    per_variable: BTreeMap<String, BTreeMap<String, ChunkSize>>,
) -> Result<VariableChunks> {
    let dims = ds.dims();
    let mut out = BTreeMap::new();
    for (name, variable_chunks) in per_variable {
        let mut sanitized = BTreeMap::new();
        for (dim, size) in variable_chunks {
            let size = match size {
                ChunkSize::Size(size) if size > 0 => size,
                ChunkSize::Size(_) => {
                    return Err(Error::ChunkSpec(format!(
                        "chunk size for dimension {dim:?} of variable {name:?} must be positive"
                    )));
                }
                ChunkSize::Full => dims.get(&dim).copied().ok_or_else(|| {
                    Error::ChunkSpec(format!("unknown dimension {dim:?}"))
                })?,
                ChunkSize::Auto => {
                    return Err(Error::ChunkSpec(format!(
                        "automatic chunk sizing for dimension {dim:?} of variable {name:?} \
                         is not supported in explicit mappings; give a positive size"
                    )));
                }
            };
            sanitized.insert(dim, size);
        }
        out.insert(name, sanitized);
    }
    Ok(out)
}
