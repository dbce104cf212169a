use std::rc::Rc;
use std::sync::atomic::{ AtomicUsize, Ordering };

use rand::Rng;

mod mops;
mod tape;
mod grad_mode;

pub use grad_mode::{ no_grad, is_grad_enabled, NoGradGuard };

use crate::{
  error::{ Error, Result },
  tensor::Tensor,
  scalar::{ Real, cast },
  ops::{ BaseOps, NumericOps },
};

pub(crate) use mops::Op;
use tape::Tape;


pub fn make_id() -> usize {
  static LAST_ID: AtomicUsize = AtomicUsize::new(0);
  LAST_ID.fetch_add(1, Ordering::Relaxed)
}


/// Position of a computed variable in the graph that produced it.

#[derive(Debug, Clone)]
struct Origin<T: Real> {
  tape: Rc<Tape<T>>,
  index: usize,
}


/// Variables track the computational operations used to create them and allow
/// for computing their gradient with respect to all input variables involved.
///
/// They get created by calling [tracked](Tensor::tracked) or
/// [trained](Tensor::trained) on any differentiable [Tensor] type.
///
/// Variables dereference to their underlying [Tensor] automatically for
/// non-differentiable operations. Differentiable operations, on the other hand,
/// will always return another Variable.
///
/// Clones refer to the same logical variable: they share data, gradient and id.

#[derive(Debug, Clone)]
pub struct Variable<T: Real> {
  id: usize,
  data: Tensor<T>,
  grad: Option<Tensor<T>>,
  trainable: bool,
  origin: Option<Origin<T>>,
}

impl<T: Real> std::ops::Deref for Variable<T> {
  type Target = Tensor<T>;

  fn deref(&self) -> &Self::Target {
    &self.data
  }
}

impl<T: Real> PartialEq for Variable<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.data == rhs.data
  }
}

impl<T: Real> From<T> for Variable<T> {
  fn from(value: T) -> Self {
    Tensor::scalar(value).tracked()
  }
}

impl<T: Real> Variable<T> {
  pub(crate) fn from_tensor(tensor: Tensor<T>, trainable: bool) -> Self {
    Self {
      id: make_id(),
      grad: trainable.then(|| Tensor::zeros(tensor.dims()) ),
      data: tensor,
      trainable,
      origin: None,
    }
  }

  /// Wrap the result of an operation on `inputs`, recording the operation
  /// when any input is differentiable and gradient recording is enabled.

  pub(crate) fn record(op: Op<T>, inputs: &[&Self], data: Tensor<T>) -> Self {
    let differentiable = is_grad_enabled() && inputs.iter().any(|input| input.grad.is_some() );
    if !differentiable { return Self::from_tensor(data, false) }
    let grad = Tensor::zeros(data.dims());
    let (tape, slots) = Tape::join(inputs);
    let id = make_id();
    let index = tape.push(id, op, slots, data.clone(), grad.clone());
    Self {
      id,
      data,
      grad: Some(grad),
      trainable: false,
      origin: Some(Origin { tape, index }),
    }
  }

  pub fn id(&self) -> usize {
    self.id
  }

  pub fn tensor(&self) -> &Tensor<T> {
    &self.data
  }

  /// Accumulated gradient, present for every differentiable variable.

  pub fn grad(&self) -> Option<&Tensor<T>> {
    self.grad.as_ref()
  }

  pub fn requires_grad(&self) -> bool {
    self.grad.is_some()
  }

  pub fn is_trainable(&self) -> bool {
    self.trainable
  }

  /// Whether this variable was created directly from a tensor
  /// rather than computed by an operation.

  pub fn is_leaf(&self) -> bool {
    self.origin.is_none()
  }

  /// Compute gradients of this rank 0 variable with respect to every
  /// differentiable input it was computed from.
  ///
  /// Gradients of leaf variables add up across calls until
  /// [zero_grad](Variable::zero_grad) gets called.

  pub fn backward(&self) -> Result<()> {
    if self.grad.is_none() { return Err(Error::NoGraph) }
    if self.data.rank() != 0 {
      return Err(Error::BackwardNonScalar { shape: self.data.dims().to_vec() })
    }
    self.backward_with(&Tensor::scalar(T::one()))
  }

  /// Back-propagate an explicit output gradient of this variable's shape.

  pub fn backward_with(&self, seed: &Tensor<T>) -> Result<()> {
    let grad = self.grad.as_ref().ok_or(Error::NoGraph)?;
    self.data.shape().expect(seed.shape(), "backward")?;
    match &self.origin {
      Some(origin) => origin.tape.backward(origin.index, seed),
      None => grad.accumulate(seed),
    }
  }

  /// Set this variable's gradient to zero.

  pub fn zero_grad(&self) {
    if let Some(grad) = &self.grad {
      grad.refill(T::zero());
    }
  }

  /// List all trainable parameters this variable was computed from.

  pub fn parameters(&self) -> Vec<Self> {
    match &self.origin {
      None => if self.trainable { vec![self.clone()] } else { vec![] },
      Some(origin) => origin.tape.leaves(origin.index)
        .into_iter()
        .filter(|slot| slot.trainable )
        .map(|slot| Self {
          id: slot.id,
          data: slot.data,
          grad: slot.grad,
          trainable: true,
          origin: None,
        })
        .collect(),
    }
  }

  #[cfg(test)]
  pub(crate) fn tape_len(&self) -> Option<usize> {
    self.origin.as_ref().map(|origin| origin.tape.len() )
  }

  /// Compute a function's gradient with respect to a generated
  /// input numerically and compare it to the automatically derived
  /// solution.
  ///
  /// Supply any function to check that it gets differentiated correctly.
  /// Returns the mean absolute difference between both gradients.

  pub fn check_gradients<F, R>(dims: &[usize], rng: &mut R, generator: F) -> Result<T>
  where
    F: Fn(&Self) -> Result<Self>,
    R: Rng,
  {
    let eps = cast::<T>(1e-4);
    let two = cast::<T>(2.0);
    // Generate random input
    let input = Tensor::randn(dims, rng);
    let var = input.trained();
    // Compute gradient using auto diff
    generator(&var)?.sum().backward()?;
    let grad = var.grad().ok_or(Error::NoGraph)?.detach();
    // Compute gradient numerically for every element of input
    let len = input.size();
    let mut error = T::zero();
    for i in 0..len {
      let epst = Tensor::hot_encode(i, len).reshape(dims)?.scale(eps);
      let prev = generator(&input.sub(&epst)?.tracked())?.sum().item();
      let next = generator(&input.add(&epst)?.tracked())?.sum().item();
      let numeric = (next - prev) / (two * eps);
      error += (grad.raw()[i] - numeric).abs();
    }
    if len == 0 { return Ok(T::zero()) }
    Ok(error / cast(len))
  }
}

impl<T: Real> std::fmt::Display for Variable<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let title = if self.trainable { "Trainable" } else {
      if self.grad.is_some() { "Computed" } else { "Tracked" }
    };
    write!(f, "{title} {}", self.tensor())
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::ops::*;
  use approx::assert_abs_diff_eq;

  #[test]
  fn x_squared() {
    let x = Tensor::vec(&[3.0, 5.0]).trained();
    let z = &x * &x + 2.0;
    z.backward_with(&Tensor::ones(&[2])).unwrap();
    assert_eq!(z, Tensor::vec(&[11.0, 27.0]).tracked());
    assert_eq!(x.grad(), Some(&Tensor::vec(&[6.0, 10.0])));
  }

  #[test]
  fn mean_of_squares() {
    let x = Tensor::vec(&[1.0, -2.0, 3.0, 0.5]).trained();
    x.sqr().mean().backward().unwrap();
    let expected: Vec<f64> = x.to_vec().iter().map(|a| 2.0 * a / 4.0 ).collect();
    assert_eq!(x.grad().unwrap().to_vec(), expected);

    x.zero_grad();
    (x.sqr().mean() * 0.5).backward().unwrap();
    let expected: Vec<f64> = x.to_vec().iter().map(|a| a / 4.0 ).collect();
    assert_eq!(x.grad().unwrap().to_vec(), expected);
  }

  #[test]
  fn double_backward_accumulates() {
    let x = Tensor::vec(&[1.5, -0.5]).trained();
    let w = Tensor::vec(&[2.0, 3.0]).trained();
    let loss = (&x * &w).tanh().sum();
    loss.backward().unwrap();
    let once = w.grad().unwrap().detach();
    loss.backward().unwrap();
    let twice = w.grad().unwrap().to_vec();
    for (a, b) in once.to_vec().iter().zip(&twice) {
      assert_abs_diff_eq!(2.0 * a, *b, epsilon = 1e-12);
    }
  }

  #[test]
  fn zero_seed() {
    let x = Tensor::vec(&[1.0, 2.0]).trained();
    let y = x.exp().sum();
    y.backward_with(&Tensor::scalar(0.0)).unwrap();
    assert_eq!(x.grad().unwrap(), &Tensor::zeros(&[2]));
  }

  #[test]
  fn fan_out() {
    let x = Tensor::scalar(3.0).trained();
    let a = &x * 2.0;
    let b = &x * &x;
    let y = &a + &b;
    y.backward().unwrap();
    assert_eq!(x.grad().unwrap().item(), 2.0 + 6.0);
  }

  #[test]
  fn constants() {
    let x = Tensor::vec(&[1.0, 2.0]).tracked();
    let y = x.exp().sum();
    assert!(y.grad().is_none());
    assert_eq!(y.backward(), Err(Error::NoGraph));
    assert!(y.parameters().is_empty());
  }

  #[test]
  fn non_scalar_backward() {
    let x = Tensor::vec(&[1.0, 2.0]).trained();
    let y = x.exp();
    assert_eq!(y.backward(), Err(Error::BackwardNonScalar { shape: vec![2] }));
    assert!(y.backward_with(&Tensor::ones(&[3])).is_err());
  }

  #[test]
  fn leaf_backward() {
    let x = Tensor::scalar(1.0).trained();
    x.backward().unwrap();
    assert_eq!(x.grad().unwrap().item(), 1.0);
  }

  #[test]
  fn no_grad_scope() {
    let w = Tensor::vec(&[1.0, 2.0]).trained();
    let y = {
      let _guard = no_grad();
      w.exp().sum()
    };
    assert!(y.grad().is_none());
    assert!(is_grad_enabled());
    assert!(w.exp().sum().grad().is_some());
  }

  #[test]
  fn intermediate_gradients_restart() {
    let x = Tensor::vec(&[1.0, 2.0]).trained();
    let h = x.sqr();
    let loss = h.sum();
    loss.backward().unwrap();
    loss.backward().unwrap();
    // Intermediate gradients hold the latest pass only
    assert_eq!(h.grad().unwrap(), &Tensor::ones(&[2]));
    assert_eq!(x.grad().unwrap(), &Tensor::vec(&[4.0, 8.0]));
  }

  #[test]
  fn display() {
    let x = Tensor::scalar(1.0).trained();
    assert!(x.to_string().starts_with("Trainable"));
    assert!(x.exp().to_string().starts_with("Computed"));
    assert!(Tensor::scalar(1.0).tracked().to_string().starts_with("Tracked"));
  }
}
