use crate::{
  error::{ Error, Result },
  tensor::{ Tensor, log_sum_exp },
  variable::{ Variable, Op },
  scalar::{ Real, cast },
  ops::BaseOps,
};


/// Mean cross-entropy of a `[batch, classes]` matrix of unnormalized
/// logits against integer class labels, as a rank 0 variable.
///
/// Computes `log_softmax` and the negative log-likelihood in one stable
/// step, so large logits neither overflow nor produce NaN.
///
/// ```
/// use microtrain::{ Tensor, loss::cross_entropy };
///
/// let logits = Tensor::<f64>::zeros(&[2, 4]).trained();
/// let loss = cross_entropy(&logits, &[1, 3]).unwrap();
/// assert!((loss.item() - 4f64.ln()).abs() < 1e-12);
/// ```

pub fn cross_entropy<T: Real>(logits: &Variable<T>, labels: &[usize]) -> Result<Variable<T>> {
  let value = cross_entropy_value(logits.tensor(), labels)?;
  Ok(Variable::record(Op::CrossEntropy { labels: labels.to_vec() }, &[logits], value))
}

/// Mean negative log-likelihood of `[batch, classes]` log-probabilities,
/// such as the output of [log_softmax](crate::ops::RealOps::log_softmax).

pub fn nll_loss<T: Real>(log_probs: &Variable<T>, labels: &[usize]) -> Result<Variable<T>> {
  let value = nll_loss_value(log_probs.tensor(), labels)?;
  Ok(Variable::record(Op::NllLoss { labels: labels.to_vec() }, &[log_probs], value))
}

/// Number of classes after checking that `input` holds one row per label
/// and that every label names one of its columns.

fn check_labels<T: Real>(input: &Tensor<T>, labels: &[usize], operation: &str) -> Result<usize> {
  if labels.is_empty() { return Err(Error::EmptyBatch) }
  if input.rank() != 2 || input.dims()[0] != labels.len() {
    let classes = input.shape().cols();
    return Err(Error::shape_mismatch(operation, &[labels.len(), classes], input.dims()))
  }
  let classes = input.dims()[1];
  if let Some(&label) = labels.iter().find(|&&label| label >= classes ) {
    return Err(Error::LabelOutOfRange { label, classes })
  }
  Ok(classes)
}

pub(crate) fn cross_entropy_value<T: Real>(logits: &Tensor<T>, labels: &[usize]) -> Result<Tensor<T>> {
  let classes = check_labels(logits, labels, "cross_entropy")?;
  let total: T = logits.raw()
    .chunks(classes)
    .zip(labels)
    .map(|(row, &label)| log_sum_exp(row) - row[label] )
    .sum();
  Ok(Tensor::scalar(total / cast(labels.len())))
}

/// `(softmax(logits) - one_hot(labels)) * grad / batch`

pub(crate) fn cross_entropy_grad<T: Real>(logits: &Tensor<T>, labels: &[usize], grad: T) -> Result<Tensor<T>> {
  let classes = check_labels(logits, labels, "cross_entropy")?;
  let factor = grad / cast(labels.len());
  let mut data = Vec::with_capacity(logits.size());
  for (row, &label) in logits.raw().chunks(classes).zip(labels) {
    let lse = log_sum_exp(row);
    data.extend(row.iter().enumerate().map(|(i, &a)| {
      let hot = if i == label { T::one() } else { T::zero() };
      ((a - lse).exp() - hot) * factor
    }));
  }
  Tensor::new(logits.dims(), data)
}

pub(crate) fn nll_loss_value<T: Real>(log_probs: &Tensor<T>, labels: &[usize]) -> Result<Tensor<T>> {
  let classes = check_labels(log_probs, labels, "nll_loss")?;
  let total: T = log_probs.raw()
    .chunks(classes)
    .zip(labels)
    .map(|(row, &label)| -row[label] )
    .sum();
  Ok(Tensor::scalar(total / cast(labels.len())))
}

pub(crate) fn nll_loss_grad<T: Real>(log_probs: &Tensor<T>, labels: &[usize], grad: T) -> Result<Tensor<T>> {
  let classes = check_labels(log_probs, labels, "nll_loss")?;
  let factor = -grad / cast(labels.len());
  let mut data = vec![T::zero(); log_probs.size()];
  for (i, &label) in labels.iter().enumerate() {
    data[i * classes + label] = factor;
  }
  Tensor::new(log_probs.dims(), data)
}
