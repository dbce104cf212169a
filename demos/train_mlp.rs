// This example trains a multi layer perceptron on a synthetic
// classification task and shows the prediction for a single sample.

// Run with RUST_LOG=info to see training progress.

use rand::{ SeedableRng, rngs::StdRng };

use microtrain::{
  Tensor, Network, Trainer, TrainConfig, Dataset, LogReporter, Visualizer,
  optimize::Sgd,
};

// Stand-in for a plotting backend
struct TextVisualizer;

impl Visualizer<f32> for TextVisualizer {
  fn show(&mut self, image: &Tensor<f32>, probabilities: &Tensor<f32>) {
    println!("Sample {:?}", image.to_vec());
    for (class, p) in probabilities.raw().iter().enumerate() {
      println!("  class {class}: {:<40} {p:.3}", "#".repeat((p * 40.0) as usize));
    }
  }
}

fn main() -> microtrain::Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let mut rng = StdRng::seed_from_u64(42);

  let config = TrainConfig::default()
    .with_input_size(16)
    .with_hidden_layer_sizes(&[32, 16])
    .with_output_size(4)
    .with_learning_rate(0.05)
    .with_batch_size(32)
    .with_report_interval(10);

  // --- Insert real data here ---
  let mut data = Dataset::synthetic(200, config.output_size, config.input_size, config.batch_size, &mut rng)?
    .shuffled(7);

  let network = Network::mlp(&config, &mut rng)?;
  println!("Training {} parameters", network.parameter_count());

  let mut trainer = Trainer::new(config, network, Sgd)?;
  let summary = trainer.fit(&mut data, &mut LogReporter)?;
  for (epoch, loss) in summary.epoch_losses.iter().enumerate() {
    println!("Epoch {}: average loss {loss:.4}", epoch + 1);
  }

  let accuracy = trainer.accuracy(data.inputs(), data.labels())?;
  println!("Training accuracy {:.1}%", accuracy * 100.0);

  // Classify a single sample
  let image = data.inputs().row(0);
  trainer.network().classify(&image, &mut TextVisualizer)?;

  Ok(())
}
