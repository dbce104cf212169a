use rand::Rng;
use log::debug;

use crate::{
  error::{ Error, Result },
  tensor::Tensor,
  variable::{ Variable, no_grad },
  scalar::Real,
  ops::*,
  config::TrainConfig,
  train::Visualizer,
};


/// Parameterized function from a `[batch, features]` input to a
/// `[batch, features]` output.

pub trait Layer<T: Real> {
  fn forward(&self, input: &Variable<T>) -> Result<Variable<T>>;

  /// Trainable tensors owned by this layer.
  fn parameters(&self) -> Vec<Variable<T>>;

  /// Number of input features expected, if the layer constrains it.
  fn input_size(&self) -> Option<usize> { None }

  /// Number of output features produced, if the layer changes it.
  fn output_size(&self) -> Option<usize> { None }
}


/// Fully connected layer computing `x·W + b`.

#[derive(Debug, Clone)]
pub struct Dense<T: Real> {
  weights: Variable<T>,
  bias: Variable<T>,
}

impl<T: Real> Dense<T> {
  /// Glorot-initialized weights and zero bias.

  pub fn new<R: Rng>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
    debug!("Creating dense layer {input_size} -> {output_size}");
    Self {
      weights: Tensor::glorot_uniform(&[input_size, output_size], rng).trained(),
      bias: Tensor::zeros(&[output_size]).trained(),
    }
  }

  /// Layer with the given `[input, output]` weight matrix and `[output]` bias.

  pub fn from_parameters(weights: Tensor<T>, bias: Tensor<T>) -> Result<Self> {
    if weights.rank() != 2 {
      return Err(Error::shape_mismatch("dense", &[0, bias.size()], weights.dims()))
    }
    let outputs = weights.dims()[1];
    if bias.dims() != [outputs] {
      return Err(Error::shape_mismatch("dense", &[outputs], bias.dims()))
    }
    Ok(Self { weights: weights.trained(), bias: bias.trained() })
  }

  pub fn weights(&self) -> &Variable<T> {
    &self.weights
  }

  pub fn bias(&self) -> &Variable<T> {
    &self.bias
  }
}

impl<T: Real> Layer<T> for Dense<T> {
  fn forward(&self, input: &Variable<T>) -> Result<Variable<T>> {
    input.mm(&self.weights)?.add(&self.bias)
  }

  fn parameters(&self) -> Vec<Variable<T>> {
    vec![self.weights.clone(), self.bias.clone()]
  }

  fn input_size(&self) -> Option<usize> {
    Some(self.weights.dims()[0])
  }

  fn output_size(&self) -> Option<usize> {
    Some(self.weights.dims()[1])
  }
}


/// Elementwise non-linearity without parameters.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
  Relu,
  Sigmoid,
  Tanh,
}

impl<T: Real> Layer<T> for Activation {
  fn forward(&self, input: &Variable<T>) -> Result<Variable<T>> {
    Ok(match self {
      Self::Relu => input.relu(),
      Self::Sigmoid => input.sigmoid(),
      Self::Tanh => input.tanh(),
    })
  }

  fn parameters(&self) -> Vec<Variable<T>> {
    vec![]
  }
}


/// Ordered sequence of layers, each consuming the previous layer's output.

pub struct Network<T: Real> {
  layers: Vec<Box<dyn Layer<T>>>,
}

impl<T: Real> Default for Network<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Real> std::fmt::Debug for Network<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    f.debug_struct("Network")
      .field("layers", &self.layers.len())
      .field("input_size", &self.input_size())
      .field("output_size", &self.output_size())
      .finish()
  }
}

impl<T: Real> Network<T> {
  pub fn new() -> Self {
    Self { layers: vec![] }
  }

  /// Multilayer perceptron with ReLU activations between dense layers,
  /// sized after `config`.

  pub fn mlp<R: Rng>(config: &TrainConfig, rng: &mut R) -> Result<Self> {
    config.validate()?;
    let mut network = Self::new();
    let mut size = config.input_size;
    for &hidden in &config.hidden_layer_sizes {
      network.push(Dense::new(size, hidden, rng))?;
      network.push(Activation::Relu)?;
      size = hidden;
    }
    network.push(Dense::new(size, config.output_size, rng))?;
    Ok(network)
  }

  /// Append a layer, checking that its input width matches the
  /// current output width.

  pub fn push(&mut self, layer: impl Layer<T> + 'static) -> Result<()> {
    if let (Some(output), Some(input)) = (self.output_size(), layer.input_size()) {
      if output != input {
        return Err(Error::shape_mismatch("network", &[output], &[input]))
      }
    }
    self.layers.push(Box::new(layer));
    Ok(())
  }

  pub fn with(mut self, layer: impl Layer<T> + 'static) -> Result<Self> {
    self.push(layer)?;
    Ok(self)
  }

  pub fn len(&self) -> usize {
    self.layers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.layers.is_empty()
  }

  pub fn input_size(&self) -> Option<usize> {
    self.layers.iter().find_map(|layer| layer.input_size() )
  }

  pub fn output_size(&self) -> Option<usize> {
    self.layers.iter().rev().find_map(|layer| layer.output_size() )
  }

  pub fn forward(&self, input: &Variable<T>) -> Result<Variable<T>> {
    let mut output = input.clone();
    for layer in &self.layers {
      output = layer.forward(&output)?;
    }
    Ok(output)
  }

  pub fn parameters(&self) -> Vec<Variable<T>> {
    self.layers.iter()
      .flat_map(|layer| layer.parameters() )
      .collect()
  }

  /// Number of trainable scalars.

  pub fn parameter_count(&self) -> usize {
    self.parameters().iter().map(|param| param.size() ).sum()
  }

  /// Class probabilities for a `[batch, features]` input,
  /// computed without recording a graph.

  pub fn predict(&self, input: &Tensor<T>) -> Result<Tensor<T>> {
    let _guard = no_grad();
    let logits = self.forward(&input.tracked())?;
    Ok(logits.softmax().tensor().clone())
  }

  /// Predict the class probabilities of a single sample and hand
  /// them to a [Visualizer] together with the sample.

  pub fn classify(&self, image: &Tensor<T>, visualizer: &mut impl Visualizer<T>) -> Result<Tensor<T>> {
    let input = image.reshape(&[1, image.size()])?;
    let probabilities = self.predict(&input)?.row(0);
    visualizer.show(image, &probabilities);
    Ok(probabilities)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::loss::cross_entropy;
  use rand::{ SeedableRng, rngs::StdRng };
  use approx::assert_abs_diff_eq;

  #[test]
  fn dense_forward() {
    let dense = Dense::from_parameters(
      Tensor::new(&[2,3], vec![1.0, 0.0, -1.0, 0.5, 2.0, 1.0]).unwrap(),
      Tensor::vec(&[0.1, 0.2, 0.3]),
    ).unwrap();
    let x = Tensor::new(&[1,2], vec![2.0, 1.0]).unwrap().tracked();
    let y = dense.forward(&x).unwrap();
    assert_eq!(y.dims(), &[1, 3]);
    for (a, b) in y.to_vec().iter().zip([2.6, 2.2, -0.7]) {
      assert_abs_diff_eq!(*a, b, epsilon = 1e-12);
    }
  }

  #[test]
  fn invalid_parameters() {
    assert!(Dense::from_parameters(Tensor::<f32>::zeros(&[2,3]), Tensor::zeros(&[2])).is_err());
    assert!(Dense::from_parameters(Tensor::<f32>::zeros(&[6]), Tensor::zeros(&[3])).is_err());
  }

  #[test]
  fn mlp_layout() {
    let mut rng = StdRng::seed_from_u64(1);
    let config = TrainConfig::default()
      .with_input_size(8)
      .with_hidden_layer_sizes(&[6, 4])
      .with_output_size(3);
    let network = Network::<f32>::mlp(&config, &mut rng).unwrap();
    assert_eq!(network.len(), 5);
    assert_eq!(network.input_size(), Some(8));
    assert_eq!(network.output_size(), Some(3));
    assert_eq!(network.parameters().len(), 6);
    assert_eq!(network.parameter_count(), 8 * 6 + 6 + 6 * 4 + 4 + 4 * 3 + 3);
    let x = Tensor::ones(&[5, 8]).tracked();
    assert_eq!(network.forward(&x).unwrap().dims(), &[5, 3]);
  }

  #[test]
  fn width_mismatch() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut network = Network::<f32>::new();
    network.push(Dense::new(4, 3, &mut rng)).unwrap();
    network.push(Activation::Tanh).unwrap();
    assert_eq!(network.push(Dense::new(2, 1, &mut rng)),
      Err(Error::shape_mismatch("network", &[3], &[2])));
    assert!(network.forward(&Tensor::ones(&[1, 5]).tracked()).is_err());
  }

  #[test]
  fn zero_network() {
    let network = Network::new()
      .with(Dense::from_parameters(Tensor::zeros(&[4, 3]), Tensor::zeros(&[3])).unwrap()).unwrap()
      .with(Activation::Relu).unwrap()
      .with(Dense::from_parameters(Tensor::zeros(&[3, 5]), Tensor::zeros(&[5])).unwrap()).unwrap();
    let x = Tensor::new(&[1,4], vec![0.5, -1.0, 2.0, 0.0]).unwrap().tracked();
    let logits = network.forward(&x).unwrap();
    assert!(logits.raw().iter().all(|&a: &f64| a == logits.raw()[0] ));
    let loss = cross_entropy(&logits, &[2]).unwrap();
    assert_abs_diff_eq!(loss.item(), 5f64.ln(), epsilon = 1e-12);
    let probabilities = network.predict(x.tensor()).unwrap();
    assert_abs_diff_eq!(probabilities.raw()[0], 0.2, epsilon = 1e-12);
  }

  struct Recorder {
    shown: Vec<(Tensor<f64>, Tensor<f64>)>,
  }

  impl Visualizer<f64> for Recorder {
    fn show(&mut self, image: &Tensor<f64>, probabilities: &Tensor<f64>) {
      self.shown.push((image.clone(), probabilities.clone()));
    }
  }

  #[test]
  fn classify() {
    let mut rng = StdRng::seed_from_u64(2);
    let network = Network::new()
      .with(Dense::new(4, 3, &mut rng)).unwrap();
    let image = Tensor::new(&[2,2], vec![0.1, 0.9, 0.4, 0.3]).unwrap();
    let mut recorder = Recorder { shown: vec![] };
    let probabilities = network.classify(&image, &mut recorder).unwrap();
    assert_eq!(probabilities.dims(), &[3]);
    assert_abs_diff_eq!(probabilities.sum().item(), 1.0, epsilon = 1e-12);
    assert_eq!(recorder.shown.len(), 1);
    assert_eq!(recorder.shown[0].0, image);
  }
}
