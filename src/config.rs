use serde::{ Serialize, Deserialize };

use crate::error::{ Error, Result };


/// Network layout and training hyper-parameters.
///
/// Missing fields fall back to their defaults when deserializing,
/// which describe a 784 → 128 → 64 → 10 digit classifier.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
  pub input_size: usize,
  pub hidden_layer_sizes: Vec<usize>,
  pub output_size: usize,
  pub learning_rate: f64,
  pub epoch_count: usize,
  pub batch_size: usize,

  /// Report the running loss every this many steps.
  pub report_interval: usize,
}

impl Default for TrainConfig {
  fn default() -> Self {
    Self {
      input_size: 784,
      hidden_layer_sizes: vec![128, 64],
      output_size: 10,
      learning_rate: 0.003,
      epoch_count: 5,
      batch_size: 64,
      report_interval: 40,
    }
  }
}

impl TrainConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_input_size(mut self, size: usize) -> Self {
    self.input_size = size;
    self
  }

  pub fn with_hidden_layer_sizes(mut self, sizes: &[usize]) -> Self {
    self.hidden_layer_sizes = sizes.to_vec();
    self
  }

  pub fn with_output_size(mut self, size: usize) -> Self {
    self.output_size = size;
    self
  }

  pub fn with_learning_rate(mut self, rate: f64) -> Self {
    self.learning_rate = rate;
    self
  }

  pub fn with_epoch_count(mut self, count: usize) -> Self {
    self.epoch_count = count;
    self
  }

  pub fn with_batch_size(mut self, size: usize) -> Self {
    self.batch_size = size;
    self
  }

  pub fn with_report_interval(mut self, interval: usize) -> Self {
    self.report_interval = interval;
    self
  }

  /// Reject layouts and hyper-parameters training cannot work with.

  pub fn validate(&self) -> Result<()> {
    let invalid = |message: &str| Err(Error::InvalidConfig(message.to_string()));
    if self.input_size == 0 || self.output_size == 0 {
      return invalid("input and output sizes must be positive")
    }
    if self.hidden_layer_sizes.contains(&0) {
      return invalid("hidden layer sizes must be positive")
    }
    if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
      return invalid("learning rate must be a positive number")
    }
    if self.epoch_count == 0 || self.batch_size == 0 || self.report_interval == 0 {
      return invalid("epoch count, batch size and report interval must be positive")
    }
    Ok(())
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let config = TrainConfig::default();
    assert_eq!(config.hidden_layer_sizes, vec![128, 64]);
    assert_eq!(config.learning_rate, 0.003);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn partial_json() {
    let config: TrainConfig = serde_json::from_str(r#"{ "epoch_count": 2, "hidden_layer_sizes": [32] }"#).unwrap();
    assert_eq!(config, TrainConfig::default().with_epoch_count(2).with_hidden_layer_sizes(&[32]));
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(serde_json::from_str::<TrainConfig>(&json).unwrap(), config);
  }

  #[test]
  fn invalid() {
    assert!(matches!(TrainConfig::default().with_batch_size(0).validate(), Err(Error::InvalidConfig(_))));
    assert!(TrainConfig::default().with_learning_rate(-0.1).validate().is_err());
    assert!(TrainConfig::default().with_learning_rate(f64::NAN).validate().is_err());
    assert!(TrainConfig::default().with_hidden_layer_sizes(&[16, 0]).validate().is_err());
    assert!(TrainConfig::default().with_hidden_layer_sizes(&[]).validate().is_ok());
  }
}
