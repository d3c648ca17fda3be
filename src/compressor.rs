//! Compressor specification checking.
//!
//! Unlike chunk mappings, a per-variable compressor mapping does not have to
//! cover every variable: unlisted variables simply get no compression override.
//! The canonical output still covers the full variable set, with `None` for
//! "no compression".

use std::collections::BTreeMap;

use crate::codecs::Compressor;
use crate::{Error, Result};

/// Canonical compressor assignment: every variable name mapped to a codec or
/// `None` for no compression.
pub type VariableCompressors = BTreeMap<String, Option<Compressor>>;

/// A compressor specification as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CompressorSpec {
    /// No compression for any variable.
    None,
    /// Use the default compressor; without one, defer to the storage engine's
    /// default (no compression).
    #[default]
    Auto,
    /// The same codec for every variable.
    Single(Compressor),
    /// A codec (or `None`) per variable. Keys must be a subset of the dataset's
    /// variable names.
    PerVariable(BTreeMap<String, Option<Compressor>>),
}

/// Normalize a compressor specification for the given variables.
///
/// `default_compressor` is only consulted when `compressor` is
/// [`CompressorSpec::Auto`].
pub fn normalize_compressor(
    compressor: &CompressorSpec,
    variable_names: &[String],
    default_compressor: Option<&CompressorSpec>,
) -> Result<VariableCompressors> {
    let resolved = match compressor {
        CompressorSpec::Auto => default_compressor,
        other => Some(other),
    };

    match resolved {
        // An `Auto` default carries no information either; defer to the
        // storage engine (no compression).
        None | Some(CompressorSpec::Auto) | Some(CompressorSpec::None) => {
            Ok(broadcast(variable_names, None))
        }
        Some(CompressorSpec::Single(codec)) => Ok(broadcast(variable_names, Some(codec.clone()))),
        Some(CompressorSpec::PerVariable(map)) => {
            for name in map.keys() {
                if !variable_names.contains(name) {
                    return Err(Error::CompressorSpec(format!(
                        "{name:?} is not a dataset variable; variables are {variable_names:?}"
                    )));
                }
            }
            let mut out = VariableCompressors::new();
            for name in variable_names {
                out.insert(name.clone(), map.get(name).cloned().flatten());
            }
            Ok(out)
        }
    }
}

fn broadcast(variable_names: &[String], codec: Option<Compressor>) -> VariableCompressors {
    variable_names
        .iter()
        .map(|name| (name.clone(), codec.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_codec_broadcasts_to_every_variable() {
        let codec = Compressor::Gzip { level: 5 };
        let normalized = normalize_compressor(
            &CompressorSpec::Single(codec.clone()),
            &names(&["temp", "precip"]),
            None,
        )
        .unwrap();
        assert_eq!(normalized["temp"], Some(codec.clone()));
        assert_eq!(normalized["precip"], Some(codec));
    }

    #[test]
    fn auto_without_default_maps_every_variable_to_none() {
        let normalized =
            normalize_compressor(&CompressorSpec::Auto, &names(&["temp", "precip"]), None)
                .unwrap();
        assert_eq!(normalized.len(), 2);
        assert!(normalized.values().all(Option::is_none));
    }

    #[test]
    fn auto_uses_the_default() {
        let codec = Compressor::Zstd {
            level: 3,
            checksum: false,
        };
        let normalized = normalize_compressor(
            &CompressorSpec::Auto,
            &names(&["temp"]),
            Some(&CompressorSpec::Single(codec.clone())),
        )
        .unwrap();
        assert_eq!(normalized["temp"], Some(codec));
    }

    #[test]
    fn auto_default_counts_as_absent() {
        let normalized = normalize_compressor(
            &CompressorSpec::Auto,
            &names(&["temp"]),
            Some(&CompressorSpec::Auto),
        )
        .unwrap();
        assert_eq!(normalized["temp"], None);
    }

    #[test]
    fn partial_mapping_fills_unlisted_variables_with_none() {
        let codec = Compressor::Gzip { level: 2 };
        let map = [("temp".to_string(), Some(codec.clone()))]
            .into_iter()
            .collect();
        let normalized = normalize_compressor(
            &CompressorSpec::PerVariable(map),
            &names(&["temp", "precip"]),
            None,
        )
        .unwrap();
        assert_eq!(normalized["temp"], Some(codec));
        assert_eq!(normalized["precip"], None);
        assert_eq!(normalized.len(), 2);
    }

    #[test]
    fn unknown_mapping_key_errors() {
        let map = [("pressure".to_string(), None)].into_iter().collect();
        let err = normalize_compressor(
            &CompressorSpec::PerVariable(map),
            &names(&["temp"]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::CompressorSpec(_)));
    }
}
