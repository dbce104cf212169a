use num_traits::Float;

use crate::{
  error::{ Error, Result },
  shape::Shape,
  tensor::Tensor,
  scalar::{ Numeric, Real, cast },
  ops::{ Cops, BaseOps, NumericOps, RealOps, Hops },
};


impl<T: Numeric> BaseOps<T> for Tensor<T> {
  fn shape(&self) -> &Shape {
    &self.shape
  }

  fn reshape(&self, dims: &[usize]) -> Result<Self> {
    let shape = Shape::new(dims);
    if shape.size() != self.size() {
      return Err(Error::shape_mismatch("reshape", &self.shape.dims, dims))
    }
    Ok(Self { shape, data: self.data.clone() })
  }
}

impl<T: Cops> NumericOps<T> for Tensor<T> {
  fn add(&self, rhs: &Self) -> Result<Self> {
    self.zip(rhs, "add", |a, b| a + b )
  }

  fn sub(&self, rhs: &Self) -> Result<Self> {
    self.zip(rhs, "sub", |a, b| a - b )
  }

  fn mul(&self, rhs: &Self) -> Result<Self> {
    self.zip(rhs, "mul", |a, b| a * b )
  }

  fn div(&self, rhs: &Self) -> Result<Self> {
    self.zip(rhs, "div", |a, b| a / b )
  }

  fn scale(&self, factor: T) -> Self {
    self.vectorize(|a| a * factor )
  }

  fn sum(&self) -> Self {
    Self::scalar(self.raw().iter().copied().sum())
  }

  fn mean(&self) -> Self {
    let n = self.size();
    if n == 0 { return Self::scalar(T::zero()) }
    Self::scalar(self.sum().item() / cast(n))
  }

  fn mm(&self, rhs: &Self) -> Result<Self> {
    if self.rank() != 2 || rhs.rank() != 2 || self.shape[1] != rhs.shape[0] {
      let expected = [self.shape.dims.last().copied().unwrap_or(0), rhs.shape.cols()];
      return Err(Error::shape_mismatch("mm", &expected, &rhs.shape.dims))
    }
    let rows_l = self.shape[0];
    let cols_l = self.shape[1];
    let cols_r = rhs.shape[1];
    let data = T::matmul(rows_l, cols_l, cols_r, &self.raw(), &rhs.raw());
    Self::new(&[rows_l, cols_r], data)
  }
}

impl<T: Real> RealOps<T> for Tensor<T> {
  fn powf(&self, exp: T) -> Self {
    self.vectorize(|a| a.powf(exp) )
  }

  fn exp(&self) -> Self {
    self.vectorize(|a| a.exp() )
  }

  fn log(&self) -> Self {
    self.vectorize(|a| a.ln() )
  }

  fn relu(&self) -> Self {
    self.vectorize(|a| a.max(T::zero()) )
  }

  fn sigmoid(&self) -> Self {
    self.vectorize(|a| T::one() / (T::one() + (-a).exp()) )
  }

  fn tanh(&self) -> Self {
    self.vectorize(|a| a.tanh() )
  }

  fn log_softmax(&self) -> Self {
    self.map_rows(|_, row, out| {
      let lse = log_sum_exp(row);
      for (o, &a) in out.iter_mut().zip(row) {
        *o = a - lse;
      }
    })
  }
}

impl<T: Real> Hops<T> for Tensor<T> {}

/// `ln(sum(exp(row)))`, shifted by the row maximum so that large
/// logits cannot overflow.

pub(crate) fn log_sum_exp<T: Real>(row: &[T]) -> T {
  let max = row.iter().copied().fold(T::neg_infinity(), Float::max);
  if !max.is_finite() { return max }
  let sum: T = row.iter().map(|&a| (a - max).exp() ).sum();
  max + sum.ln()
}

impl<T: Real> std::ops::Neg for &Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    self.scale(-T::one())
  }
}

impl<T: Real> std::ops::Neg for Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

// Operators panic on incompatible shapes. Use the methods
// of [NumericOps] to handle shape errors instead.
macro_rules! add_operator {
  ($op:ident, $meth:ident, $symbol:tt) => {
    impl<T: Cops> std::ops::$op for &Tensor<T> { // &tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        NumericOps::$meth(self, rhs).unwrap_or_else(|err| panic!("{err}") )
      }
    }

    impl<T: Cops> std::ops::$op for Tensor<T> { // tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Cops> std::ops::$op<Tensor<T>> for &Tensor<T> { // &tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Tensor<T>) -> Tensor<T> {
        self $symbol &rhs
      }
    }

    impl<T: Cops> std::ops::$op<&Tensor<T>> for Tensor<T> { // tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: &Tensor<T>) -> Tensor<T> {
        &self $symbol rhs
      }
    }

    impl<T: Cops> std::ops::$op<T> for &Tensor<T> { // &tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        self $symbol &Tensor::scalar(rhs)
      }
    }

    impl<T: Cops> std::ops::$op<T> for Tensor<T> { // tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        &self $symbol &Tensor::scalar(rhs)
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);


#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_abs_diff_eq;

  #[test]
  fn sum() {
    let a = Tensor::new(&[3,2], vec![1, 2, 3, 4, 5, 6]).unwrap();
    assert_eq!(a.sum(), Tensor::scalar(21));
    assert_eq!(a.mean(), Tensor::scalar(3));
  }

  #[test]
  fn operators() {
    let a = Tensor::new(&[2,2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let b = Tensor::vec(&[10.0, 20.0]);
    assert_eq!(&a + &b, Tensor::new(&[2,2], vec![11.0, 22.0, 13.0, 24.0]).unwrap());
    assert_eq!(&a * 2.0, Tensor::new(&[2,2], vec![2.0, 4.0, 6.0, 8.0]).unwrap());
    assert_eq!(-&b, Tensor::vec(&[-10.0, -20.0]));
    assert_eq!(a.clone() - a, Tensor::zeros(&[2,2]));
  }

  #[test]
  #[should_panic(expected = "Shape mismatch in add")]
  fn operator_mismatch() {
    let _ = Tensor::vec(&[1.0, 2.0]) + Tensor::vec(&[1.0, 2.0, 3.0]);
  }

  #[test]
  fn reshape() {
    let a = Tensor::arrange(&[2,3], 0, 1);
    let b = a.reshape(&[3,2]).unwrap();
    assert!(b.shared_with(&a));
    assert_eq!(b.dims(), &[3, 2]);
    assert!(a.reshape(&[4]).is_err());
  }

  #[test]
  fn log_softmax_is_stable() {
    let logits = Tensor::new(&[2,3], vec![1000.0, 0.0, -1000.0, 1.0, 2.0, 3.0]).unwrap();
    let log_probs = logits.log_softmax();
    assert!(log_probs.raw().iter().all(|a: &f64| !a.is_nan() ));
    assert_abs_diff_eq!(log_probs.raw()[0], 0.0, epsilon = 1e-12);
    let probs = log_probs.exp();
    assert_abs_diff_eq!(probs.row(1).sum().item(), 1.0, epsilon = 1e-12);
  }

  #[test]
  fn activations() {
    let a = Tensor::vec(&[-1.0, 0.0, 2.0]);
    assert_eq!(a.relu(), Tensor::vec(&[0.0, 0.0, 2.0]));
    assert_eq!(a.sigmoid().raw()[1], 0.5);
    assert_eq!(a.tanh().raw()[1], 0.0);
  }
}
