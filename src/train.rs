use log::{ debug, info };

use crate::{
  error::{ Error, Result },
  tensor::Tensor,
  scalar::{ Real, cast },
  config::TrainConfig,
  layer::Network,
  loss::cross_entropy,
  data::{ Batch, BatchSource },
  optimize::{ Optimizer, Strategy },
  variable::no_grad,
};


/// Running loss average after a number of steps into an epoch.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress<T: Real> {
  pub epoch: usize,
  pub step: usize,
  pub running_loss: T,
}


/// Receives periodic training progress.

pub trait Reporter<T: Real> {
  fn report(&mut self, progress: &Progress<T>);
}

impl<T: Real, F: FnMut(&Progress<T>)> Reporter<T> for F {
  fn report(&mut self, progress: &Progress<T>) {
    self(progress)
  }
}


/// Reports progress through the `log` facade.

#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl<T: Real> Reporter<T> for LogReporter {
  fn report(&mut self, progress: &Progress<T>) {
    info!("Epoch {} step {}: training loss {:.4}", progress.epoch + 1, progress.step, progress.running_loss);
  }
}


/// Displays a sample next to the class probabilities predicted for it.

pub trait Visualizer<T: Real> {
  fn show(&mut self, image: &Tensor<T>, probabilities: &Tensor<T>);
}


/// Average loss of every epoch trained.

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary<T: Real> {
  pub epoch_losses: Vec<T>,
  pub steps: usize,
}

impl<T: Real> TrainingSummary<T> {
  pub fn final_loss(&self) -> Option<T> {
    self.epoch_losses.last().copied()
  }
}


/// Fits a [Network] to mini-batches with cross-entropy loss.
///
/// Every step runs `zero_gradients → forward → loss → backward → step`.

#[derive(Debug)]
pub struct Trainer<T: Real, S: Strategy<T>> {
  config: TrainConfig,
  network: Network<T>,
  optimizer: Optimizer<T, S>,
}

impl<T: Real, S: Strategy<T>> Trainer<T, S> {
  pub fn new(config: TrainConfig, network: Network<T>, strategy: S) -> Result<Self> {
    config.validate()?;
    let expected = [config.input_size, config.output_size];
    let actual = [
      network.input_size().unwrap_or(config.input_size),
      network.output_size().unwrap_or(config.output_size),
    ];
    if actual != expected {
      return Err(Error::shape_mismatch("trainer", &expected, &actual))
    }
    let optimizer = Optimizer::new(network.parameters(), cast(config.learning_rate), strategy);
    Ok(Self { config, network, optimizer })
  }

  pub fn config(&self) -> &TrainConfig {
    &self.config
  }

  pub fn network(&self) -> &Network<T> {
    &self.network
  }

  pub fn optimizer(&self) -> &Optimizer<T, S> {
    &self.optimizer
  }

  pub fn into_network(self) -> Network<T> {
    self.network
  }

  /// Loss of the network on a batch, without recording a graph.

  pub fn loss(&self, batch: &Batch<T>) -> Result<T> {
    let _guard = no_grad();
    let logits = self.network.forward(&batch.inputs.tracked())?;
    Ok(cross_entropy(&logits, &batch.labels)?.item())
  }

  /// Run one optimization step on a batch, returning its loss
  /// before the update.

  pub fn train_step(&mut self, batch: &Batch<T>) -> Result<T> {
    self.optimizer.zero_gradients();
    let logits = self.network.forward(&batch.inputs.tracked())?;
    let loss = cross_entropy(&logits, &batch.labels)?;
    loss.backward()?;
    self.optimizer.step()?;
    Ok(loss.item())
  }

  /// Train for the configured number of epochs, reporting the running
  /// loss average every `report_interval` steps.

  pub fn fit(&mut self, source: &mut impl BatchSource<T>, reporter: &mut impl Reporter<T>) -> Result<TrainingSummary<T>> {
    let mut summary = TrainingSummary { epoch_losses: vec![], steps: 0 };
    for epoch in 0..self.config.epoch_count {
      source.reset();
      let mut step = 0;
      let mut running = (T::zero(), 0);
      let mut total = T::zero();
      loop {
        let batch = match source.next_batch() {
          Ok(batch) => batch,
          Err(Error::Exhausted) => break,
          Err(err) => return Err(err),
        };
        let loss = self.train_step(&batch)?;
        step += 1;
        total += loss;
        running = (running.0 + loss, running.1 + 1);
        if step % self.config.report_interval == 0 {
          reporter.report(&Progress { epoch, step, running_loss: running.0 / cast(running.1) });
          running = (T::zero(), 0);
        }
      }
      if step == 0 { return Err(Error::EmptyBatch) }
      let average = total / cast(step);
      debug!("Finished epoch {} after {step} steps with average loss {average}", epoch + 1);
      summary.epoch_losses.push(average);
      summary.steps += step;
    }
    Ok(summary)
  }

  /// Fraction of samples the network classifies correctly.

  pub fn accuracy(&self, inputs: &Tensor<T>, labels: &[usize]) -> Result<T> {
    Ok(self.network.predict(inputs)?.accuracy(labels))
  }
}
