//! Rounding specification checking.

use std::collections::BTreeMap;

use crate::{Error, Result};

/// Decimal rounding applied to float variables before writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundingSpec {
    /// Round every variable to the given number of decimals.
    Uniform(i64),
    /// Round the listed variables; `None` leaves a variable unrounded. Keys
    /// must be a subset of the dataset's variable names.
    PerVariable(BTreeMap<String, Option<i64>>),
}

/// Validate a rounding specification against the variable names.
///
/// The specification is passed through unchanged; expansion to a full mapping
/// is left to the caller. `None` means no rounding.
pub fn normalize_rounding(
    rounding: Option<RoundingSpec>,
    variable_names: &[String],
) -> Result<Option<RoundingSpec>> {
    match &rounding {
        None => {}
        Some(RoundingSpec::Uniform(decimals)) => {
            if *decimals < 0 {
                return Err(Error::RoundingSpec(format!(
                    "decimals must be >= 0, got {decimals}"
                )));
            }
        }
        Some(RoundingSpec::PerVariable(map)) => {
            for (name, decimals) in map {
                if !variable_names.contains(name) {
                    return Err(Error::RoundingSpec(format!(
                        "{name:?} is not a dataset variable; variables are {variable_names:?}"
                    )));
                }
                if let Some(decimals) = decimals {
                    if *decimals < 0 {
                        return Err(Error::RoundingSpec(format!(
                            "decimals for {name:?} must be >= 0, got {decimals}"
                        )));
                    }
                }
            }
        }
    }
    Ok(rounding)
}
