use std::rc::Rc;
use std::cell::{ Ref, RefCell };

use rand::Rng;

mod cops;
mod lops;

pub(crate) use lops::log_sum_exp;

use crate::{
  internal::randn,
  error::{ Error, Result },
  shape::Shape,
  variable::Variable,
  scalar::{ Numeric, Real, cast },
};


/// Multidimensional array of numbers.
///
/// Tensors are cheap to clone: clones share the same storage, which is how
/// gradient buffers and parameters get updated in place. Use
/// [detach](Tensor::detach) to get an independent copy.
///
/// [Real] tensors can be wrapped in a [Variable] by
/// calling [tracked](Tensor::tracked) or [trained](Tensor::trained).

#[derive(Debug, Clone)]
pub struct Tensor<T: Numeric> {
  shape: Shape,
  data: Rc<RefCell<Vec<T>>>,
}

impl<T: Numeric> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.shape == rhs.shape && *self.data.borrow() == *rhs.data.borrow()
  }
}

impl<T: Numeric> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Result<Self> {
    if shape.size() != data.len() {
      return Err(Error::DataLength { len: data.len(), shape: shape.dims })
    }
    Ok(Self { shape, data: Rc::new(RefCell::new(data)) })
  }

  pub fn new(dims: &[usize], data: Vec<T>) -> Result<Self> {
    Self::from_shape(Shape::new(dims), data)
  }

  pub fn scalar(item: T) -> Self {
    Self::filled(Shape::scalar(), item)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::from_vec(vec.to_vec())
  }

  pub fn from_vec(vec: Vec<T>) -> Self {
    let shape = Shape::new(&[vec.len()]);
    Self { shape, data: Rc::new(RefCell::new(vec)) }
  }

  pub fn fill(dims: &[usize], filler: T) -> Self {
    Self::filled(Shape::new(dims), filler)
  }

  fn filled(shape: Shape, filler: T) -> Self {
    let data = vec![filler; shape.size()];
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn zeros(dims: &[usize]) -> Self {
    Self::fill(dims, T::zero())
  }

  pub fn ones(dims: &[usize]) -> Self {
    Self::fill(dims, T::one())
  }

  pub fn arrange(dims: &[usize], start: T, step: T) -> Self {
    let shape = Shape::new(dims);
    let data = (0..shape.size())
      .map(|i| cast::<T>(i) * step + start )
      .collect();
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn hot_encode(idx: usize, size: usize) -> Self {
    let mut a = vec![T::zero(); size];
    a[idx] = T::one();
    Self::from_vec(a)
  }

  /// Stack equally shaped tensors along a new leading dimension.

  pub fn rows(rows: &[Tensor<T>]) -> Result<Self> {
    let first = rows.first().ok_or(Error::EmptyBatch)?;
    let mut data = Vec::with_capacity(rows.len() * first.size());
    for row in rows {
      first.shape.expect(&row.shape, "rows")?;
      data.extend_from_slice(&row.raw());
    }
    let mut dims = first.shape.dims.clone();
    dims.insert(0, rows.len());
    Self::new(&dims, data)
  }

  pub fn dims(&self) -> &[usize] {
    &self.shape.dims
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn rank(&self) -> usize {
    self.shape.rank()
  }

  pub fn raw(&self) -> Ref<'_, Vec<T>> {
    self.data.borrow()
  }

  pub fn to_vec(&self) -> Vec<T> {
    self.data.borrow().clone()
  }

  pub fn item(&self) -> T {
    assert!(self.size() == 1,
      "Can't extract item from non-scalar {}", self.shape);
    self.data.borrow()[0]
  }

  /// Copy of row `index` when viewed as a matrix over the last dimension.

  pub fn row(&self, index: usize) -> Self {
    let cols = self.shape.cols();
    let data = self.data.borrow()[index * cols..(index + 1) * cols].to_vec();
    Self::from_vec(data)
  }

  /// Gather rows of a batch into a new batch, in the given order.

  pub fn select_rows(&self, indices: &[usize]) -> Result<Self> {
    let rows = self.shape.dims.first().copied().unwrap_or(0);
    let stride = if rows == 0 { 0 } else { self.size() / rows };
    let raw = self.data.borrow();
    let mut data = Vec::with_capacity(indices.len() * stride);
    for &i in indices {
      if i >= rows {
        return Err(Error::shape_mismatch("select_rows", &[rows], &[i + 1]))
      }
      data.extend_from_slice(&raw[i * stride..(i + 1) * stride]);
    }
    let mut dims = self.shape.dims.clone();
    if let Some(first) = dims.first_mut() { *first = indices.len() }
    Self::new(&dims, data)
  }

  /// Deep copy with storage of its own.

  pub fn detach(&self) -> Self {
    Self { shape: self.shape.clone(), data: Rc::new(RefCell::new(self.to_vec())) }
  }

  pub fn shared_with(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.data, &other.data)
  }

  /// Overwrite this tensor's values in place.
  ///
  /// All tensors sharing storage with this one observe the change.

  pub fn assign(&self, other: &Self) -> Result<()> {
    self.op_assign(other, "assign", |a, b| *a = b )
  }

  /// Add `other` into this tensor in place.

  pub fn accumulate(&self, other: &Self) -> Result<()> {
    self.op_assign(other, "accumulate", |a, b| *a += b )
  }

  pub fn refill(&self, filler: T) {
    for a in self.data.borrow_mut().iter_mut() {
      *a = filler;
    }
  }

  fn op_assign(&self, other: &Self, operation: &str, cb: impl Fn(&mut T, T)) -> Result<()> {
    self.shape.expect(&other.shape, operation)?;
    // Avoid clashing borrows when tensors share storage
    let other = if self.shared_with(other) { other.detach() } else { other.clone() };
    let mut data = self.data.borrow_mut();
    for (a, &b) in data.iter_mut().zip(other.data.borrow().iter()) {
      cb(a, b);
    }
    Ok(())
  }

  pub fn vectorize<O, F>(&self, cb: F) -> Tensor<O>
  where
    O: Numeric,
    F: FnMut(T) -> O,
  {
    let data = self.data.borrow().iter().copied().map(cb).collect();
    Tensor { shape: self.shape.clone(), data: Rc::new(RefCell::new(data)) }
  }

  /// Combine two tensors elementwise, broadcasting trailing suffixes.

  pub fn zip<F>(&self, rhs: &Self, operation: &str, cb: F) -> Result<Self>
  where
    F: Fn(T, T) -> T,
  {
    let shape = self.shape.broadcast(&rhs.shape, operation)?;
    let data_l = self.data.borrow();
    let data_r = rhs.data.borrow();
    let (len_l, len_r) = (data_l.len(), data_r.len());
    let data = (0..shape.size())
      .map(|i| cb(data_l[i % len_l], data_r[i % len_r]) )
      .collect();
    Ok(Self { shape, data: Rc::new(RefCell::new(data)) })
  }

  /// Sum broadcasted dimensions away until this tensor has the given shape.
  ///
  /// `shape` must be a trailing suffix of this tensor's shape.

  pub(crate) fn sum_to(&self, shape: &Shape) -> Self {
    if &self.shape == shape { return self.clone() }
    let len = shape.size();
    let mut data = vec![T::zero(); len];
    if len > 0 {
      for (i, &a) in self.data.borrow().iter().enumerate() {
        data[i % len] += a;
      }
    }
    Self { shape: shape.clone(), data: Rc::new(RefCell::new(data)) }
  }

  /// Apply `cb` to every row over the last dimension, writing into a fresh row.

  pub(crate) fn map_rows<F>(&self, mut cb: F) -> Self
  where
    F: FnMut(usize, &[T], &mut [T]),
  {
    let cols = self.shape.cols();
    let input = self.data.borrow();
    let mut data = vec![T::zero(); input.len()];
    if cols > 0 {
      for (r, (row, out)) in input.chunks(cols).zip(data.chunks_mut(cols)).enumerate() {
        cb(r, row, out);
      }
    }
    Self { shape: self.shape.clone(), data: Rc::new(RefCell::new(data)) }
  }

  /// Transpose of a rank 2 tensor.

  pub fn transpose(&self) -> Result<Self> {
    if self.rank() != 2 {
      return Err(Error::shape_mismatch("transpose", &[0, 0], &self.shape.dims))
    }
    let (rows, cols) = (self.shape.dims[0], self.shape.dims[1]);
    let raw = self.data.borrow();
    let mut data = Vec::with_capacity(raw.len());
    for c in 0..cols {
      for r in 0..rows {
        data.push(raw[r * cols + c]);
      }
    }
    Self::new(&[cols, rows], data)
  }

  /// Index of the greatest value in every row over the last dimension.

  pub fn argmax(&self) -> Vec<usize> {
    let cols = self.shape.cols();
    if cols == 0 { return vec![] }
    self.data.borrow()
      .chunks(cols)
      .map(|row| {
        let mut index = 0;
        for (i, &value) in row.iter().enumerate() {
          if value > row[index] { index = i }
        }
        index
      })
      .collect()
  }

  /// Fraction of rows whose [argmax](Tensor::argmax) matches the label.

  pub fn accuracy<O: Real>(&self, labels: &[usize]) -> O {
    let predictions = self.argmax();
    if predictions.is_empty() { return O::zero() }
    let hits = predictions.iter()
      .zip(labels)
      .filter(|(p, l)| p == l )
      .count();
    cast::<O>(hits) / cast::<O>(predictions.len())
  }

  /// One row per label, with a one at the label's index.

  pub fn one_hot(labels: &[usize], classes: usize) -> Result<Self> {
    let mut data = vec![T::zero(); labels.len() * classes];
    for (i, &label) in labels.iter().enumerate() {
      if label >= classes { return Err(Error::LabelOutOfRange { label, classes }) }
      data[i * classes + label] = T::one();
    }
    Self::new(&[labels.len(), classes], data)
  }
}

impl<T: Real> Tensor<T> {
  pub fn rand<R: Rng>(dims: &[usize], rng: &mut R) -> Self {
    Self::uniform(dims, -T::one(), T::one(), rng)
  }

  pub fn uniform<R: Rng>(dims: &[usize], low: T, high: T, rng: &mut R) -> Self {
    let shape = Shape::new(dims);
    let data = (0..shape.size())
      .map(|_| rng.gen_range(low, high) )
      .collect();
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn randn<R: Rng>(dims: &[usize], rng: &mut R) -> Self {
    let shape = Shape::new(dims);
    let len = shape.size();
    let mut data = vec![T::zero(); len];
    for i in 0..(len + 1) / 2 {
      let j = i * 2;
      let (r1, r2): (T, T) = randn(rng);
      data[j] = r1;
      data[(j + 1) % len] = r2;
    }
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  /// Uniform Glorot initialization for a `[fan_in, fan_out]` weight matrix.

  pub fn glorot_uniform<R: Rng>(dims: &[usize], rng: &mut R) -> Self {
    let fans = dims.first().copied().unwrap_or(0) + dims.last().copied().unwrap_or(0);
    if fans == 0 { return Self::zeros(dims) }
    let limit = (cast::<T>(6.0) / cast::<T>(fans)).sqrt();
    Self::uniform(dims, -limit, limit, rng)
  }

  /// Wrap in a differentiable [Variable] whose gradient gets
  /// collected and that optimizers may update.

  pub fn trained(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), true)
  }

  /// Wrap in a constant [Variable], such as training input.

  pub fn tracked(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), false)
  }
}

impl<T: Numeric> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Tensor{:?} ", self.shape.dims)?;
    print_chunks(0, &self.shape, &self.data.borrow(), f)
  }
}

fn print_chunks<T: std::fmt::Debug>(idx: usize, shape: &Shape, vec: &[T], f: &mut std::fmt::Formatter) -> std::fmt::Result {
  let indent = " ".repeat(idx * 2);
  if shape.rank() == 0 {
    write!(f, "{indent}{:?}", vec[0])?;
  } else if idx == shape.rank() - 1 {
    writeln!(f, "{indent}{:?}", vec)?;
  } else {
    writeln!(f, "{indent}[")?;
    let len = vec.len() / shape.dims[idx].max(1);
    if len > 0 {
      for chunk in vec.chunks(len) {
        print_chunks(idx + 1, shape, chunk, f)?;
      }
    }
    writeln!(f, "{indent}]")?;
  }
  Ok(())
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };

  #[test]
  fn construction() {
    assert!(Tensor::new(&[2,2], vec![1, 2, 3]).is_err());
    let t = Tensor::new(&[2,2], vec![1, 2, 3, 4]).unwrap();
    assert_eq!(t.dims(), &[2, 2]);
    assert_eq!(t.row(1), Tensor::vec(&[3, 4]));
    assert_eq!(Tensor::rows(&[t.row(0), t.row(1)]).unwrap(), t);
    assert!(Tensor::rows(&[t.row(0), Tensor::vec(&[1])]).is_err());
  }

  #[test]
  fn shared_storage() {
    let a = Tensor::vec(&[1.0, 2.0]);
    let b = a.clone();
    let c = a.detach();
    a.accumulate(&Tensor::vec(&[1.0, 1.0])).unwrap();
    assert_eq!(b, Tensor::vec(&[2.0, 3.0]));
    assert_eq!(c, Tensor::vec(&[1.0, 2.0]));
    // Accumulating a tensor into itself doubles it
    a.accumulate(&b).unwrap();
    assert_eq!(a, Tensor::vec(&[4.0, 6.0]));
  }

  #[test]
  fn broadcast() {
    let x = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]).unwrap();
    let y = Tensor::vec(&[1, 2, 3]);
    let sum = x.zip(&y, "add", |a, b| a + b ).unwrap();
    assert_eq!(sum, Tensor::new(&[2,3], vec![2, 4, 6, 5, 7, 9]).unwrap());
    assert_eq!(sum.sum_to(&Shape::new(&[3])), Tensor::vec(&[7, 11, 15]));
    assert!(x.zip(&Tensor::vec(&[1, 2]), "add", |a, b| a + b ).is_err());
  }

  #[test]
  fn select_rows() {
    let x = Tensor::arrange(&[3,2], 0, 1);
    let picked = x.select_rows(&[2, 0]).unwrap();
    assert_eq!(picked, Tensor::new(&[2,2], vec![4, 5, 0, 1]).unwrap());
    assert!(x.select_rows(&[3]).is_err());
  }

  #[test]
  fn transpose() {
    let x = Tensor::arrange(&[2,3], 0, 1);
    assert_eq!(x.transpose().unwrap(), Tensor::new(&[3,2], vec![0, 3, 1, 4, 2, 5]).unwrap());
  }

  #[test]
  fn argmax_and_accuracy() {
    let x = Tensor::new(&[3,3], vec![0.1, 0.7, 0.2, 0.9, 0.0, 0.1, 0.2, 0.2, 0.6]).unwrap();
    assert_eq!(x.argmax(), vec![1, 0, 2]);
    assert_eq!(x.accuracy::<f64>(&[1, 0, 0]), 2.0 / 3.0);
  }

  #[test]
  fn one_hot() {
    let hot = Tensor::<f32>::one_hot(&[2, 0], 3).unwrap();
    assert_eq!(hot, Tensor::new(&[2,3], vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]).unwrap());
    assert_eq!(Tensor::<f32>::one_hot(&[3], 3), Err(Error::LabelOutOfRange { label: 3, classes: 3 }));
  }

  #[test]
  fn initialization() {
    let mut rng = StdRng::seed_from_u64(7);
    let w = Tensor::<f32>::glorot_uniform(&[4, 2], &mut rng);
    let limit = 1.0;
    assert!(w.raw().iter().all(|&a| a >= -limit && a < limit ));
    let n = Tensor::<f64>::randn(&[1001], &mut rng);
    assert_eq!(n.size(), 1001);
    assert!(n.raw().iter().all(|a| a.is_finite() ));
  }
}
