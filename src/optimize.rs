use std::collections::HashMap;

use log::debug;

use crate::{
  error::{ Error, Result },
  scalar::{ Real, cast },
  tensor::Tensor,
  variable::Variable,
  ops::Hops,
};


/// An optimization strategy to be used with [Optimizer].

pub trait Strategy<R: Real> {
  /// Change to apply to `param`, given its current gradient.
  fn update(&mut self, param: &Variable<R>, grad: &Tensor<R>, rate: R, step: usize) -> Result<Tensor<R>>;
}


/// Tracks a fixed set of parameters and updates them in place
/// using one of several optimization [strategies](Strategy).
///
/// Gradients accumulate until [zero_gradients](Optimizer::zero_gradients)
/// is called, so a training step reads
/// `zero_gradients → forward → loss → backward → step`.

#[derive(Debug)]
pub struct Optimizer<R: Real, S: Strategy<R>> {
  params: Vec<Variable<R>>,
  strategy: S,
  pub learning_rate: R,
  step: usize,
}

impl<R: Real, S: Strategy<R>> Optimizer<R, S> {
  pub fn new(params: Vec<Variable<R>>, learning_rate: R, strategy: S) -> Self {
    debug!("Optimizing {} parameter tensors with learning rate {learning_rate}", params.len());
    Self { params, strategy, learning_rate, step: 1 }
  }

  pub fn parameters(&self) -> &[Variable<R>] {
    &self.params
  }

  /// Number of updates applied so far.

  pub fn steps(&self) -> usize {
    self.step - 1
  }

  /// Set every tracked parameter's gradient to zero.

  pub fn zero_gradients(&self) {
    for param in &self.params {
      param.zero_grad();
    }
  }

  /// Update all parameters from their current gradients.
  ///
  /// Parameters that aren't differentiable cannot be optimized
  /// and result in [Error::NoGraph].

  pub fn step(&mut self) -> Result<()> {
    for param in &self.params {
      let grad = param.grad().ok_or(Error::NoGraph)?;

      // Execute strategy
      let change = self.strategy.update(param, grad, self.learning_rate, self.step)?;

      // Apply change
      param.tensor().accumulate(&change)?;
    }
    self.step += 1;
    Ok(())
  }
}


/// Stochastic Gradient Descent strategy

#[derive(Debug, Clone, Default)]
pub struct Sgd;

impl<R: Real> Strategy<R> for Sgd {
  fn update(&mut self, _param: &Variable<R>, grad: &Tensor<R>, rate: R, _step: usize) -> Result<Tensor<R>> {
    Ok(grad * -rate)
  }
}


/// Stochastic Gradient Descent with momentum

#[derive(Debug, Clone)]
pub struct Momentum<R: Real> {
  pub momentum: R,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Momentum<R> {
  pub fn new(momentum: R) -> Self {
    Self {
      momentum,
      v: HashMap::new(),
    }
  }
}

impl<R: Real> Default for Momentum<R> {
  fn default() -> Self {
    Self::new(cast(0.9))
  }
}

impl<R: Real> Strategy<R> for Momentum<R> {
  fn update(&mut self, param: &Variable<R>, grad: &Tensor<R>, rate: R, _step: usize) -> Result<Tensor<R>> {
    let v = self.v.entry(param.id())
      .or_insert_with(|| Tensor::zeros(param.dims()) );
    v.assign(&(&*v * self.momentum - grad * rate))?;
    Ok(v.clone())
  }
}


/// Adaptive Moment Estimation strategy (ADAM)

#[derive(Debug, Clone)]
pub struct Adam<R: Real> {
  pub beta1: R,
  pub beta2: R,
  m: HashMap<usize, Tensor<R>>,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Adam<R> {
  pub fn new(beta1: R, beta2: R) -> Self {
    Self {
      beta1,
      beta2,
      m: HashMap::new(),
      v: HashMap::new(),
    }
  }
}

impl<R: Real> Default for Adam<R> {
  fn default() -> Self {
    Self::new(cast(0.9), cast(0.999))
  }
}

impl<R: Real> Strategy<R> for Adam<R> {
  fn update(&mut self, param: &Variable<R>, grad: &Tensor<R>, rate: R, step: usize) -> Result<Tensor<R>> {
    let id = param.id();
    let m = self.m.entry(id).or_insert_with(|| Tensor::zeros(param.dims()) );
    m.assign(&(&*m * self.beta1 + grad * (R::one() - self.beta1)))?;
    let v = self.v.entry(id).or_insert_with(|| Tensor::zeros(param.dims()) );
    v.assign(&(&*v * self.beta2 + grad.sqr() * (R::one() - self.beta2)))?;
    let step = cast::<R>(step);
    let mt = &self.m[&id] / (R::one() - self.beta1.powf(step));
    let vt = &self.v[&id] / (R::one() - self.beta2.powf(step));
    Ok(mt * -rate / (vt.sqrt() + cast::<R>(1e-8)))
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::ops::*;

  fn quadratic(param: &Variable<f64>) -> Variable<f64> {
    (param - 3.0).sqr().sum()
  }

  #[test]
  fn sgd_step() {
    let w = Tensor::vec(&[1.0, -2.0, 0.5]).trained();
    let mut optim = Optimizer::new(vec![w.clone()], 0.1, Sgd);
    quadratic(&w).backward().unwrap();
    let before = w.tensor().detach();
    let grad = w.grad().unwrap().detach();
    optim.step().unwrap();
    let expected: Vec<f64> = before.to_vec().iter()
      .zip(grad.to_vec())
      .map(|(v, g)| v + g * -0.1 )
      .collect();
    assert_eq!(w.to_vec(), expected);
    assert_eq!(optim.steps(), 1);
  }

  #[test]
  fn zero_learning_rate() {
    let w = Tensor::vec(&[1.0, -2.0]).trained();
    let mut optim = Optimizer::new(vec![w.clone()], 0.0, Sgd);
    quadratic(&w).backward().unwrap();
    optim.step().unwrap();
    assert_eq!(w.tensor(), &Tensor::vec(&[1.0, -2.0]));
  }

  #[test]
  fn zero_gradient_step() {
    let w = Tensor::vec(&[1.0, -2.0]).trained();
    let mut optim = Optimizer::new(vec![w.clone()], 0.5, Sgd);
    optim.step().unwrap();
    assert_eq!(w.tensor(), &Tensor::vec(&[1.0, -2.0]));
  }

  #[test]
  fn reset_is_idempotent() {
    let w = Tensor::vec(&[1.0, -2.0]).trained();
    let optim = Optimizer::new(vec![w.clone()], 0.1, Sgd);
    let loss = quadratic(&w);
    loss.backward().unwrap();
    let single = w.grad().unwrap().detach();
    loss.backward().unwrap();
    assert_eq!(w.grad().unwrap(), &(&single * 2.0));
    optim.zero_gradients();
    assert_eq!(w.grad().unwrap(), &Tensor::zeros(&[2]));
    loss.backward().unwrap();
    assert_eq!(w.grad().unwrap(), &single);
  }

  #[test]
  fn constant_parameter() {
    let mut optim = Optimizer::new(vec![Tensor::vec(&[1.0]).tracked()], 0.1, Sgd);
    assert_eq!(optim.step(), Err(Error::NoGraph));
  }

  fn converges<S: Strategy<f64>>(strategy: S, rate: f64) {
    let w = Tensor::vec(&[0.0, 6.0]).trained();
    let mut optim = Optimizer::new(vec![w.clone()], rate, strategy);
    for _ in 0..1000 {
      optim.zero_gradients();
      quadratic(&w).backward().unwrap();
      optim.step().unwrap();
    }
    assert!(w.raw().iter().all(|a| (a - 3.0).abs() < 1e-3 ), "Did not converge: {}", w.tensor());
  }

  #[test]
  fn strategies() {
    converges(Sgd, 0.1);
    converges(Momentum::default(), 0.01);
    converges(Adam::default(), 0.05);
  }
}
