use crate::{
  error::Result,
  shape::Shape,
  tensor::Tensor,
  variable::Variable,
  scalar::{ Real, cast },
  ops::{ BaseOps, NumericOps, RealOps, Hops },
  loss,
};


/// Differentiable operation recorded in a computation graph.

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Op<T: Real> {
  Add,
  Sub,
  Mul,
  Div,
  Scale(T),
  MatMul,
  Reshape,
  Pow(T),
  Exp,
  Log,
  ReLU,
  Sigmoid,
  Tanh,
  Sum,
  Mean,
  LogSoftmax,
  CrossEntropy { labels: Vec<usize> },
  NllLoss { labels: Vec<usize> },
}

impl<T: Real> Op<T> {
  /// Gradients with respect to each input, given the operation's
  /// inputs, its output and the gradient arriving at the output.
  ///
  /// Binary operations sum their gradients back down to the
  /// input shapes when an operand was broadcasted.

  pub fn derive(&self, inputs: &[&Tensor<T>], output: &Tensor<T>, grad: &Tensor<T>) -> Result<Vec<Tensor<T>>> {
    let lhs = inputs[0];
    let changes = match self {
      Self::Add => {
        let rhs = inputs[1];
        vec![grad.sum_to(lhs.shape()), grad.sum_to(rhs.shape())]
      },
      Self::Sub => {
        let rhs = inputs[1];
        vec![grad.sum_to(lhs.shape()), (-grad).sum_to(rhs.shape())]
      },
      Self::Mul => {
        let rhs = inputs[1];
        vec![
          grad.mul(rhs)?.sum_to(lhs.shape()),
          grad.mul(lhs)?.sum_to(rhs.shape()),
        ]
      },
      Self::Div => {
        let rhs = inputs[1];
        vec![
          grad.div(rhs)?.sum_to(lhs.shape()),
          (-grad).mul(lhs)?.div(rhs)?.div(rhs)?.sum_to(rhs.shape()),
        ]
      },
      Self::Scale(factor) => vec![grad.scale(*factor)],
      Self::MatMul => {
        let rhs = inputs[1];
        vec![
          grad.mm(&rhs.transpose()?)?,
          lhs.transpose()?.mm(grad)?,
        ]
      },
      Self::Reshape => vec![grad.reshape(lhs.dims())?],
      Self::Pow(exp) => vec![grad.mul(&lhs.powf(*exp - T::one()).scale(*exp))?],
      Self::Exp => vec![grad.mul(output)?],
      Self::Log => vec![grad.div(lhs)?],
      Self::ReLU => {
        let mask = lhs.vectorize(|a| if a > T::zero() { T::one() } else { T::zero() } );
        vec![grad.mul(&mask)?]
      },
      Self::Sigmoid => vec![grad.mul(&output.vectorize(|s| s * (T::one() - s) ))?],
      Self::Tanh => vec![grad.mul(&output.vectorize(|t| T::one() - t * t ))?],
      Self::Sum => vec![Tensor::fill(lhs.dims(), grad.item())],
      Self::Mean => {
        let n = lhs.size().max(1);
        vec![Tensor::fill(lhs.dims(), grad.item() / cast(n))]
      },
      Self::LogSoftmax => vec![log_softmax_grad(output, grad)?],
      Self::CrossEntropy { labels } => vec![loss::cross_entropy_grad(lhs, labels, grad.item())?],
      Self::NllLoss { labels } => vec![loss::nll_loss_grad(lhs, labels, grad.item())?],
    };
    Ok(changes)
  }
}

/// `grad - softmax * sum(grad)` for every row, where softmax is
/// recovered from the log-probabilities.

fn log_softmax_grad<T: Real>(output: &Tensor<T>, grad: &Tensor<T>) -> Result<Tensor<T>> {
  let cols = output.shape().cols();
  if cols == 0 { return Ok(Tensor::zeros(output.dims())) }
  let probs = output.exp();
  let mut data = Vec::with_capacity(output.size());
  for (g_row, p_row) in grad.raw().chunks(cols).zip(probs.raw().chunks(cols)) {
    let total: T = g_row.iter().copied().sum();
    data.extend(g_row.iter().zip(p_row).map(|(&g, &p)| g - p * total ));
  }
  Tensor::new(output.dims(), data)
}


impl<T: Real> BaseOps<T> for Variable<T> {
  fn shape(&self) -> &Shape {
    self.data.shape()
  }

  fn reshape(&self, dims: &[usize]) -> Result<Self> {
    let data = self.data.reshape(dims)?;
    Ok(Self::record(Op::Reshape, &[self], data))
  }
}

impl<T: Real> NumericOps<T> for Variable<T> {
  fn add(&self, rhs: &Self) -> Result<Self> {
    let data = self.data.add(&rhs.data)?;
    Ok(Self::record(Op::Add, &[self, rhs], data))
  }

  fn sub(&self, rhs: &Self) -> Result<Self> {
    let data = self.data.sub(&rhs.data)?;
    Ok(Self::record(Op::Sub, &[self, rhs], data))
  }

  fn mul(&self, rhs: &Self) -> Result<Self> {
    let data = self.data.mul(&rhs.data)?;
    Ok(Self::record(Op::Mul, &[self, rhs], data))
  }

  fn div(&self, rhs: &Self) -> Result<Self> {
    let data = self.data.div(&rhs.data)?;
    Ok(Self::record(Op::Div, &[self, rhs], data))
  }

  fn scale(&self, factor: T) -> Self {
    Self::record(Op::Scale(factor), &[self], self.data.scale(factor))
  }

  fn sum(&self) -> Self {
    Self::record(Op::Sum, &[self], self.data.sum())
  }

  fn mean(&self) -> Self {
    Self::record(Op::Mean, &[self], self.data.mean())
  }

  fn mm(&self, rhs: &Self) -> Result<Self> {
    let data = self.data.mm(&rhs.data)?;
    Ok(Self::record(Op::MatMul, &[self, rhs], data))
  }
}

impl<T: Real> RealOps<T> for Variable<T> {
  fn powf(&self, exp: T) -> Self {
    Self::record(Op::Pow(exp), &[self], self.data.powf(exp))
  }

  fn exp(&self) -> Self {
    Self::record(Op::Exp, &[self], self.data.exp())
  }

  fn log(&self) -> Self {
    Self::record(Op::Log, &[self], self.data.log())
  }

  fn relu(&self) -> Self {
    Self::record(Op::ReLU, &[self], self.data.relu())
  }

  fn sigmoid(&self) -> Self {
    Self::record(Op::Sigmoid, &[self], self.data.sigmoid())
  }

  fn tanh(&self) -> Self {
    Self::record(Op::Tanh, &[self], self.data.tanh())
  }

  fn log_softmax(&self) -> Self {
    Self::record(Op::LogSoftmax, &[self], self.data.log_softmax())
  }
}

impl<T: Real> Hops<T> for Variable<T> {}

impl<T: Real> std::ops::Neg for &Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Self::Output {
    self.scale(-T::one())
  }
}

impl<T: Real> std::ops::Neg for Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

// Operators panic on incompatible shapes, like their tensor counterparts.
macro_rules! add_operator {
  ($op:ident, $meth:ident, $symbol:tt) => {
    impl<T: Real> std::ops::$op for &Variable<T> { // &var * &other
      type Output = Variable<T>;

      fn $meth(self, rhs: Self) -> Variable<T> {
        NumericOps::$meth(self, rhs).unwrap_or_else(|err| panic!("{err}") )
      }
    }

    impl<T: Real> std::ops::$op for Variable<T> { // var * other
      type Output = Variable<T>;

      fn $meth(self, rhs: Self) -> Variable<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<Variable<T>> for &Variable<T> { // &var * other
      type Output = Variable<T>;

      fn $meth(self, rhs: Variable<T>) -> Variable<T> {
        self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<&Variable<T>> for Variable<T> { // var * &other
      type Output = Variable<T>;

      fn $meth(self, rhs: &Variable<T>) -> Variable<T> {
        &self $symbol rhs
      }
    }

    impl<T: Real> std::ops::$op<T> for &Variable<T> { // &var * T
      type Output = Variable<T>;

      fn $meth(self, rhs: T) -> Variable<T> {
        self $symbol &Tensor::scalar(rhs).tracked()
      }
    }

    impl<T: Real> std::ops::$op<T> for Variable<T> { // var * T
      type Output = Variable<T>;

      fn $meth(self, rhs: T) -> Variable<T> {
        &self $symbol rhs
      }
    }

    impl std::ops::$op<&Variable<f32>> for f32 { // T * &var
      type Output = Variable<f32>;

      fn $meth(self, rhs: &Variable<f32>) -> Variable<f32> {
        &Tensor::scalar(self).tracked() $symbol rhs
      }
    }

    impl std::ops::$op<&Variable<f64>> for f64 { // T * &var
      type Output = Variable<f64>;

      fn $meth(self, rhs: &Variable<f64>) -> Variable<f64> {
        &Tensor::scalar(self).tracked() $symbol rhs
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);
