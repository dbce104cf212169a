use crate::{
  error::Result,
  scalar::{ Numeric, Real, cast },
  shape::Shape,
};


/// Low-level compute kernels.
///
/// The default implementation works for any [Numeric] type. Floating point
/// types route through an optimized GEMM when the `unsafe` feature is enabled.

pub trait Cops: Numeric {
  /// Multiply a row-major `rows_l x cols_l` matrix with a row-major
  /// `cols_l x cols_r` matrix.

  fn matmul(rows_l: usize, cols_l: usize, cols_r: usize, lhs: &[Self], rhs: &[Self]) -> Vec<Self> {
    let mut data = vec![Self::zero(); rows_l * cols_r];
    for i in 0..rows_l {
      for k in 0..cols_l {
        let a = lhs[i * cols_l + k];
        for j in 0..cols_r {
          data[i * cols_r + j] += a * rhs[k * cols_r + j];
        }
      }
    }
    data
  }
}


/// Operations that only rearrange data.

pub trait BaseOps<I: Numeric>: Clone {
  fn shape(&self) -> &Shape;
  fn reshape(&self, dims: &[usize]) -> Result<Self>;
}


/// Differentiable arithmetic, also implemented for plain [Tensors](crate::Tensor).
///
/// Binary operations broadcast the operand with fewer dimensions when its
/// dimensions are a trailing suffix of the other operand's.

pub trait NumericOps<I: Numeric>: BaseOps<I> {
  fn add(&self, rhs: &Self) -> Result<Self>;
  fn sub(&self, rhs: &Self) -> Result<Self>;
  fn mul(&self, rhs: &Self) -> Result<Self>;
  fn div(&self, rhs: &Self) -> Result<Self>;
  fn scale(&self, factor: I) -> Self;

  /// Sum of all elements as a rank 0 result.
  fn sum(&self) -> Self;

  /// Mean of all elements as a rank 0 result.
  fn mean(&self) -> Self;

  /// Matrix product of two rank 2 operands.
  fn mm(&self, rhs: &Self) -> Result<Self>;
}


/// Differentiable functions of continuous values.

pub trait RealOps<I: Real>: NumericOps<I> {
  fn powf(&self, exp: I) -> Self;
  fn exp(&self) -> Self;
  fn log(&self) -> Self;
  fn relu(&self) -> Self;
  fn sigmoid(&self) -> Self;
  fn tanh(&self) -> Self;

  /// Numerically stable logarithm of [softmax](Hops::softmax) along the last dimension.
  fn log_softmax(&self) -> Self;
}


/// High-level operations, implemented exclusively on top of
/// lower-level ops. As a result, these are all differentiable
/// when called on a [Variable](crate::Variable).

pub trait Hops<I: Real>: RealOps<I> {
  fn sqr(&self) -> Self {
    self.powf(cast(2.0))
  }

  fn sqrt(&self) -> Self {
    self.powf(cast(0.5))
  }

  /// Normalized exponentials along the last dimension.

  fn softmax(&self) -> Self {
    self.log_softmax().exp()
  }

  /// Mean squared error against a target of the same shape.

  fn mse(&self, target: &Self) -> Result<Self> {
    Ok(self.sub(target)?.sqr().mean())
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::Tensor;
  use approx::assert_abs_diff_eq;

  #[test]
  fn mean() {
    let a = Tensor::new(&[3,2], vec![1., 2., 3., 4., 5., 6.]).unwrap();
    assert_eq!(a.mean(), Tensor::scalar(3.5));
    assert_eq!(a.trained().mean().tensor(), &Tensor::scalar(3.5));
  }

  #[test]
  fn softmax() {
    let a = Tensor::arrange(&[3,2], 1.0, 1.0).softmax();
    for row in 0..3 {
      assert_abs_diff_eq!(a.row(row).sum().item(), 1.0, epsilon = 1e-6);
    }
  }

  #[test]
  fn default_matmul() {
    let data = <i32 as Cops>::matmul(2, 3, 2, &[1, 2, 3, 4, 5, 6], &[1, 2, 3, 4, 5, 6]);
    assert_eq!(data, vec![22, 28, 49, 64]);
  }

  #[test]
  fn mse() {
    let a = Tensor::vec(&[1.0, 2.0, 3.0]);
    let b = Tensor::vec(&[1.0, 0.0, 0.0]);
    assert_abs_diff_eq!(a.mse(&b).unwrap().item(), 13.0 / 3.0, epsilon = 1e-12);
  }
}
