use std::collections::BTreeMap;

use ndarray::ArrayD;

/// Array values held by a [`Variable`].
///
/// Covers the data types the write path supports. Rounding only applies to the
/// float variants.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableData {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    U8(ArrayD<u8>),
}

impl VariableData {
    pub fn ndim(&self) -> usize {
        match self {
            VariableData::F32(a) => a.ndim(),
            VariableData::F64(a) => a.ndim(),
            VariableData::I32(a) => a.ndim(),
            VariableData::I64(a) => a.ndim(),
            VariableData::U8(a) => a.ndim(),
        }
    }

    pub fn shape(&self) -> Vec<u64> {
        let shape = match self {
            VariableData::F32(a) => a.shape(),
            VariableData::F64(a) => a.shape(),
            VariableData::I32(a) => a.shape(),
            VariableData::I64(a) => a.shape(),
            VariableData::U8(a) => a.shape(),
        };
        shape.iter().map(|&s| s as u64).collect()
    }

    pub fn num_elements(&self) -> u64 {
        match self {
            VariableData::F32(a) => a.len() as u64,
            VariableData::F64(a) => a.len() as u64,
            VariableData::I32(a) => a.len() as u64,
            VariableData::I64(a) => a.len() as u64,
            VariableData::U8(a) => a.len() as u64,
        }
    }

    /// Size of a single element, in bytes.
    pub fn element_size(&self) -> u64 {
        match self {
            VariableData::F32(_) | VariableData::I32(_) => 4,
            VariableData::F64(_) | VariableData::I64(_) => 8,
            VariableData::U8(_) => 1,
        }
    }

    /// Size of the data in memory, in bytes.
    pub fn nbytes(&self) -> u64 {
        self.num_elements() * self.element_size()
    }

    /// Round float values to `decimals` decimal places. Integer data is returned
    /// unchanged.
    pub fn rounded(&self, decimals: i64) -> Self {
        match self {
            VariableData::F32(a) => {
                let factor = 10f32.powi(decimals as i32);
                VariableData::F32(a.mapv(|v| (v * factor).round() / factor))
            }
            VariableData::F64(a) => {
                let factor = 10f64.powi(decimals as i32);
                VariableData::F64(a.mapv(|v| (v * factor).round() / factor))
            }
            other => other.clone(),
        }
    }
}

/// A named-dimension array with optional chunk layout and attributes.
#[derive(Debug, Clone)]
pub struct Variable {
    dims: Vec<String>,
    data: VariableData,
    chunks: Option<Vec<u64>>,
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl Variable {
    /// Create a variable from dimension names and data.
    ///
    /// The number of dimension names must match the dimensionality of the data,
    /// and dimension names must be unique.
    pub fn new<S: Into<String>>(dims: Vec<S>, data: VariableData) -> crate::Result<Self> {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(crate::Error::Dataset(format!(
                "{} dimension names for {}-dimensional data",
                dims.len(),
                data.ndim()
            )));
        }
        for (i, dim) in dims.iter().enumerate() {
            if dims[..i].contains(dim) {
                return Err(crate::Error::Dataset(format!(
                    "duplicate dimension name {dim:?}"
                )));
            }
        }
        Ok(Self {
            dims,
            data,
            chunks: None,
            attributes: serde_json::Map::new(),
        })
    }

    /// Set the current chunk layout, one chunk size per dimension.
    pub fn with_chunks(mut self, chunks: Vec<u64>) -> crate::Result<Self> {
        if chunks.len() != self.dims.len() {
            return Err(crate::Error::Dataset(format!(
                "{} chunk sizes for {} dimensions",
                chunks.len(),
                self.dims.len()
            )));
        }
        if chunks.iter().any(|&c| c == 0) {
            return Err(crate::Error::Dataset("chunk sizes must be non-zero".into()));
        }
        self.chunks = Some(chunks);
        Ok(self)
    }

    pub fn with_attributes(
        mut self,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn data(&self) -> &VariableData {
        &self.data
    }

    pub fn shape(&self) -> Vec<u64> {
        self.data.shape()
    }

    /// The current chunk layout, if the variable is chunked.
    pub fn chunks(&self) -> Option<&[u64]> {
        self.chunks.as_deref()
    }

    pub fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.attributes
    }

    pub fn nbytes(&self) -> u64 {
        self.data.nbytes()
    }
}

/// An in-memory labeled dataset: named variables over named, shared dimensions.
///
/// Variables are kept in lexicographic name order. Dimensions shared between
/// variables must agree on length, which is enforced on insert.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    variables: BTreeMap<String, Variable>,
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable, validating dimension lengths against the rest of the
    /// dataset.
    pub fn insert(&mut self, name: impl Into<String>, variable: Variable) -> crate::Result<()> {
        let name = name.into();
        let dims = self.dims();
        for (dim, len) in variable.dims.iter().zip(variable.shape()) {
            if let Some(&existing) = dims.get(dim) {
                if existing != len {
                    return Err(crate::Error::Dataset(format!(
                        "dimension {dim:?} of variable {name:?} has length {len}, expected {existing}"
                    )));
                }
            }
        }
        self.variables.insert(name, variable);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Variable names, in order.
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.variables.iter()
    }

    /// Lengths of every dimension in the dataset.
    pub fn dims(&self) -> BTreeMap<String, u64> {
        let mut dims = BTreeMap::new();
        for variable in self.variables.values() {
            for (dim, len) in variable.dims.iter().zip(variable.shape()) {
                dims.insert(dim.clone(), len);
            }
        }
        dims
    }

    pub fn dim_len(&self, dim: &str) -> Option<u64> {
        self.dims().get(dim).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
        &mut self.attributes
    }

    /// Size of all variable data in memory, in bytes.
    pub fn nbytes(&self) -> u64 {
        self.variables.values().map(Variable::nbytes).sum()
    }

    /// The current chunk layout per variable, keyed by dimension name.
    /// Unchunked variables map to [`None`].
    pub fn current_chunks(&self) -> BTreeMap<String, Option<BTreeMap<String, u64>>> {
        self.variables
            .iter()
            .map(|(name, variable)| {
                let chunks = variable.chunks().map(|chunks| {
                    variable
                        .dims
                        .iter()
                        .cloned()
                        .zip(chunks.iter().copied())
                        .collect()
                });
                (name.clone(), chunks)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    fn f64_data(shape: &[usize]) -> VariableData {
        VariableData::F64(ArrayD::zeros(shape.to_vec()))
    }

    #[test]
    fn variable_dims_must_match_data() {
        let err = Variable::new(vec!["time"], f64_data(&[4, 2])).unwrap_err();
        assert!(matches!(err, crate::Error::Dataset(_)));
    }

    #[test]
    fn variable_rejects_duplicate_dims() {
        assert!(Variable::new(vec!["x", "x"], f64_data(&[2, 2])).is_err());
    }

    #[test]
    fn dataset_rejects_inconsistent_dim_lengths() {
        let mut ds = Dataset::new();
        ds.insert("a", Variable::new(vec!["time"], f64_data(&[4])).unwrap())
            .unwrap();
        let err = ds
            .insert("b", Variable::new(vec!["time"], f64_data(&[5])).unwrap())
            .unwrap_err();
        assert!(matches!(err, crate::Error::Dataset(_)));
    }

    #[test]
    fn dims_are_collected_across_variables() {
        let mut ds = Dataset::new();
        ds.insert(
            "temp",
            Variable::new(vec!["time", "lat"], f64_data(&[10, 4])).unwrap(),
        )
        .unwrap();
        ds.insert("mask", Variable::new(vec!["lat"], f64_data(&[4])).unwrap())
            .unwrap();
        let dims = ds.dims();
        assert_eq!(dims.get("time"), Some(&10));
        assert_eq!(dims.get("lat"), Some(&4));
    }

    #[test]
    fn current_chunks_reports_unchunked_as_none() {
        let mut ds = Dataset::new();
        ds.insert(
            "temp",
            Variable::new(vec!["time", "lat"], f64_data(&[10, 4]))
                .unwrap()
                .with_chunks(vec![5, 2])
                .unwrap(),
        )
        .unwrap();
        ds.insert("mask", Variable::new(vec!["lat"], f64_data(&[4])).unwrap())
            .unwrap();

        let chunks = ds.current_chunks();
        let temp = chunks["temp"].as_ref().unwrap();
        assert_eq!(temp["time"], 5);
        assert_eq!(temp["lat"], 2);
        assert!(chunks["mask"].is_none());
    }

    #[test]
    fn rounding_leaves_integers_unchanged() {
        let data = VariableData::I32(ArrayD::from_elem(vec![2], 7));
        assert_eq!(data.rounded(1), data);
    }

    #[test]
    fn rounding_floats() {
        let data = VariableData::F64(ArrayD::from_elem(vec![1], 1.2345));
        let VariableData::F64(rounded) = data.rounded(2) else {
            panic!("expected f64 data");
        };
        assert!((rounded[[0]] - 1.23).abs() < 1e-12);
    }
}
