use rand::{ Rng, SeedableRng, rngs::StdRng, seq::SliceRandom };
use itertools::Itertools;
use log::debug;

use crate::{
  error::{ Error, Result },
  tensor::Tensor,
  scalar::{ Real, cast },
  ops::BaseOps,
};


/// Mini-batch of `[batch, features]` inputs and one class label per row.

#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T: Real> {
  pub inputs: Tensor<T>,
  pub labels: Vec<usize>,
}

impl<T: Real> Batch<T> {
  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}


/// Restartable source of mini-batches.
///
/// [next_batch](BatchSource::next_batch) fails with [Error::Exhausted]
/// once an epoch is done, after which [reset](BatchSource::reset)
/// starts the next one.

pub trait BatchSource<T: Real> {
  fn next_batch(&mut self) -> Result<Batch<T>>;
  fn reset(&mut self);
}


/// In-memory dataset split into batches of fixed size.
///
/// The last batch of an epoch may be smaller. Sample order gets
/// reshuffled on every reset when a seed was given.

#[derive(Debug, Clone)]
pub struct Dataset<T: Real> {
  inputs: Tensor<T>,
  labels: Vec<usize>,
  batch_size: usize,
  order: Vec<usize>,
  cursor: usize,
  rng: Option<StdRng>,
}

impl<T: Real> Dataset<T> {
  pub fn new(inputs: Tensor<T>, labels: Vec<usize>, batch_size: usize) -> Result<Self> {
    if inputs.rank() != 2 || inputs.dims()[0] != labels.len() {
      return Err(Error::shape_mismatch("dataset", &[labels.len(), inputs.shape().cols()], inputs.dims()))
    }
    if labels.is_empty() { return Err(Error::EmptyBatch) }
    if batch_size == 0 {
      return Err(Error::InvalidConfig("batch size must be positive".to_string()))
    }
    let order = (0..labels.len()).collect();
    Ok(Self { inputs, labels, batch_size, order, cursor: 0, rng: None })
  }

  /// Shuffle samples with a seeded generator, now and at every reset.

  pub fn shuffled(mut self, seed: u64) -> Self {
    let mut rng = StdRng::seed_from_u64(seed);
    self.order.shuffle(&mut rng);
    self.rng = Some(rng);
    self
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn batch_count(&self) -> usize {
    (self.len() + self.batch_size - 1) / self.batch_size
  }

  pub fn inputs(&self) -> &Tensor<T> {
    &self.inputs
  }

  pub fn labels(&self) -> &[usize] {
    &self.labels
  }

  /// Gaussian clusters, one per class, with centers spread
  /// uniformly over `[-spread, spread]` in every feature.

  pub fn blobs<R: Rng>(samples_per_class: usize, classes: usize, features: usize, spread: T, rng: &mut R) -> Result<Tensor<T>> {
    if spread <= T::zero() || spread.is_nan() {
      return Err(Error::InvalidConfig(format!("cluster spread must be positive, got {spread}")))
    }
    let centers = Tensor::uniform(&[classes, features], -spread, spread, rng);
    let noise = Tensor::randn(&[samples_per_class * classes, features], rng);
    let rows = (0..classes)
      .cartesian_product(0..samples_per_class)
      .map(|(class, _)| class )
      .collect_vec();
    let offsets = centers.select_rows(&rows)?;
    Ok(&offsets + &noise)
  }

  /// Labeled dataset of [blobs](Dataset::blobs), ordered by class.

  pub fn synthetic<R: Rng>(samples_per_class: usize, classes: usize, features: usize, batch_size: usize, rng: &mut R) -> Result<Self> {
    debug!("Generating {classes} clusters of {samples_per_class} samples with {features} features");
    let inputs = Self::blobs(samples_per_class, classes, features, cast(3.0), rng)?;
    let labels = (0..classes)
      .flat_map(|class| std::iter::repeat(class).take(samples_per_class) )
      .collect();
    Self::new(inputs, labels, batch_size)
  }
}

impl<T: Real> BatchSource<T> for Dataset<T> {
  fn next_batch(&mut self) -> Result<Batch<T>> {
    if self.cursor >= self.order.len() { return Err(Error::Exhausted) }
    let end = (self.cursor + self.batch_size).min(self.order.len());
    let indices = &self.order[self.cursor..end];
    self.cursor = end;
    Ok(Batch {
      inputs: self.inputs.select_rows(indices)?,
      labels: indices.iter().map(|&i| self.labels[i] ).collect(),
    })
  }

  fn reset(&mut self) {
    self.cursor = 0;
    if let Some(rng) = &mut self.rng {
      self.order.shuffle(rng);
    }
  }
}
