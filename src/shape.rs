use serde::{ Serialize, Deserialize };

use crate::error::{ Error, Result };


/// The shape of a [Tensor](crate::Tensor).
///
/// Tensors are always stored contiguously in row-major order,
/// so a shape is fully described by its dimensions.

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
  pub dims: Vec<usize>,
}

impl Shape {
  pub fn new(dims: &[usize]) -> Self {
    Self { dims: dims.to_vec() }
  }

  pub fn scalar() -> Self {
    Self { dims: vec![] }
  }

  pub fn size(&self) -> usize {
    self.dims.iter().product()
  }

  pub fn rank(&self) -> usize {
    self.dims.len()
  }

  /// Length of the innermost dimension, treating scalars as a single column.

  pub fn cols(&self) -> usize {
    self.dims.last().copied().unwrap_or(1)
  }

  /// Number of rows when viewed as a matrix of [cols](Self::cols) columns.

  pub fn rows(&self) -> usize {
    let cols = self.cols();
    if cols == 0 { 0 } else { self.size() / cols }
  }

  pub fn is_suffix_of(&self, other: &Self) -> bool {
    self.rank() <= other.rank() && other.dims.ends_with(&self.dims)
  }

  /// Shape two operands get broadcast to.
  ///
  /// Broadcasting is restricted to trailing suffixes: the dimensions of the
  /// smaller operand must equal the innermost dimensions of the larger one.
  /// This covers scalars and row vectors added to batches.

  pub fn broadcast(&self, other: &Self, operation: &str) -> Result<Self> {
    if other.is_suffix_of(self) {
      Ok(self.clone())
    } else if self.is_suffix_of(other) {
      Ok(other.clone())
    } else {
      Err(Error::shape_mismatch(operation, &self.dims, &other.dims))
    }
  }

  pub fn expect(&self, other: &Self, operation: &str) -> Result<()> {
    if self == other {
      Ok(())
    } else {
      Err(Error::shape_mismatch(operation, &self.dims, &other.dims))
    }
  }
}

impl std::ops::Index<isize> for Shape {
  type Output = usize;

  fn index(&self, i: isize) -> &usize {
    let idx = if i < 0 { self.rank() as isize + i } else { i };
    &self.dims[idx as usize]
  }
}

impl std::fmt::Display for Shape {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Shape{:?}", self.dims)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rows_and_cols() {
    let shape = Shape::new(&[4,3]);
    assert_eq!(shape.rows(), 4);
    assert_eq!(shape.cols(), 3);
    assert_eq!(Shape::scalar().rows(), 1);
    assert_eq!(Shape::scalar().cols(), 1);
    assert_eq!(Shape::new(&[2,3,5]).rows(), 6);
  }

  #[test]
  fn broadcast() {
    let batch = Shape::new(&[8,3]);
    assert_eq!(batch.broadcast(&Shape::new(&[3]), "add").unwrap(), batch);
    assert_eq!(Shape::scalar().broadcast(&batch, "add").unwrap(), batch);
    assert!(batch.broadcast(&Shape::new(&[8]), "add").is_err());
  }

  #[test]
  fn index() {
    let shape = Shape::new(&[2,3,4]);
    assert_eq!(shape[0], 2);
    assert_eq!(shape[-1], 4);
    assert_eq!(shape[-2], 3);
  }
}
