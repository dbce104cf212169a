use thiserror::Error;


/// Everything that can go wrong while building, differentiating
/// or training a model.

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
  #[error("Shape mismatch in {operation}: expected {expected:?}, got {actual:?}")]
  ShapeMismatch {
    expected: Vec<usize>,
    actual: Vec<usize>,
    operation: String,
  },

  #[error("Data length {len} does not match shape {shape:?}")]
  DataLength { len: usize, shape: Vec<usize> },

  #[error("Cannot compute gradients for a variable that is not differentiable")]
  NoGraph,

  #[error("Backward called on non-scalar output of shape {shape:?} without a seed gradient")]
  BackwardNonScalar { shape: Vec<usize> },

  #[error("Label {label} is out of range for {classes} classes")]
  LabelOutOfRange { label: usize, classes: usize },

  #[error("Batch source is exhausted")]
  Exhausted,

  #[error("Batch contains no samples")]
  EmptyBatch,

  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),
}

impl Error {
  pub(crate) fn shape_mismatch(operation: &str, expected: &[usize], actual: &[usize]) -> Self {
    Self::ShapeMismatch {
      expected: expected.to_vec(),
      actual: actual.to_vec(),
      operation: operation.to_string(),
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;
