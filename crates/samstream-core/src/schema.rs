use serde::{Deserialize, Serialize};

/// A typed stream attribute.
///
/// Nominal cells store the category index; numeric cells store the raw value.
/// The optional numeric `range` is only consulted by the normalization path,
/// which is off by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Attribute {
    Numeric { range: Option<(f64, f64)> },
    Nominal { values: Vec<String> },
}

impl Attribute {
    /// Numeric attribute with no declared range.
    pub fn numeric() -> Self {
        Attribute::Numeric { range: None }
    }

    /// Numeric attribute with a declared value range.
    pub fn numeric_with_range(lo: f64, hi: f64) -> Self {
        Attribute::Numeric { range: Some((lo, hi)) }
    }

    /// Nominal attribute over named categories.
    pub fn nominal(values: Vec<String>) -> Self {
        Attribute::Nominal { values }
    }

    pub fn is_nominal(&self) -> bool {
        matches!(self, Attribute::Nominal { .. })
    }

    /// Width of the declared numeric range, if any.
    pub fn range_width(&self) -> Option<f64> {
        match self {
            Attribute::Numeric { range: Some((lo, hi)) } => Some(hi - lo),
            _ => None,
        }
    }
}

/// Schema of a data stream: ordered attributes plus the class count.
///
/// `n_classes = 0` means the class set is discovered online.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamHeader {
    attributes: Vec<Attribute>,
    n_classes: usize,
}

impl StreamHeader {
    pub fn new(attributes: Vec<Attribute>, n_classes: usize) -> Self {
        StreamHeader { attributes, n_classes }
    }

    /// All-numeric header, the common case for synthetic streams.
    pub fn numeric(num_attributes: usize, n_classes: usize) -> Self {
        StreamHeader {
            attributes: (0..num_attributes).map(|_| Attribute::numeric()).collect(),
            n_classes,
        }
    }

    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    pub fn attribute(&self, idx: usize) -> Option<&Attribute> {
        self.attributes.get(idx)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}
