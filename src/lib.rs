//! Reverse-mode automatic differentiation and gradient descent training
//! for small neural networks.
//! Tiny. Few dependencies. CPU only.
//!
//! # Features
//!
//! - **Dynamic graphs** — Operations on differentiable [Variables](Variable)
//! record themselves on a tape as they run. The graph is rebuilt on every
//! forward pass and dropped together with its outputs.
//!
//! - **Explicit gradient bookkeeping** — Gradients of leaf variables accumulate
//! across backward passes until [Optimizer::zero_gradients] resets them.
//!
//! - **Stable losses** — [loss::cross_entropy] consumes raw logits and never
//! materializes probabilities.
//!
//! - **Inference mode** — [no_grad] disables graph recording for a scope.
//!
//! - **Training loop** — [Trainer] drives any [BatchSource] through a [Network]
//! using one of several optimization [strategies](optimize::Strategy).
//!
//! # Examples
//!
//! Evaluating and minimizing a non-linear function:
//! ```
//! use microtrain::{ ops::*, Tensor, optimize::{ Optimizer, Adam } };
//! use rand::{ SeedableRng, rngs::StdRng };
//!
//! fn main() -> microtrain::Result<()> {
//!   let mut rng = StdRng::seed_from_u64(0);
//!
//!   // Create trainable variables from tensors
//!   let w = Tensor::randn(&[2, 8], &mut rng).trained();
//!   let b = Tensor::zeros(&[8]).trained();
//!
//!   // Use a standard optimizer
//!   let mut optimizer = Optimizer::new(vec![w.clone(), b.clone()], 0.001, Adam::default());
//!
//!   // Basic training loop
//!   for _ in 0..100 {
//!     // Constant training data
//!     let x = Tensor::new(&[1, 2], vec![1.0, 2.0])?.tracked();
//!
//!     // Compute loss
//!     optimizer.zero_gradients();
//!     let loss = (x.mm(&w)?.add(&b)?.sigmoid() - 0.5).sqr().mean();
//!
//!     // Back-prop and optimize
//!     loss.backward()?;
//!     optimizer.step()?;
//!   }
//!   Ok(())
//! }
//! ```
//!
//! Training a classifier:
//! ```
//! use microtrain::{ Network, Trainer, TrainConfig, Dataset, LogReporter, optimize::Sgd };
//! use rand::{ SeedableRng, rngs::StdRng };
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let config = TrainConfig::default()
//!   .with_input_size(2)
//!   .with_hidden_layer_sizes(&[8])
//!   .with_output_size(2)
//!   .with_epoch_count(2);
//! let mut data = Dataset::<f32>::synthetic(32, 2, 2, 16, &mut rng).unwrap();
//! let network = Network::mlp(&config, &mut rng).unwrap();
//! let mut trainer = Trainer::new(config, network, Sgd).unwrap();
//! let summary = trainer.fit(&mut data, &mut LogReporter).unwrap();
//! assert_eq!(summary.epoch_losses.len(), 2);
//! ```
//!
//! ## More examples
//! Check the `/demos` folder for a complete training run.
//!
//!
//! # Optional features
//!
//! Some features can be toggled in your `Cargo.toml`.
//!
//! - `unsafe` *(default)* — Accelerated matrix math using [matrixmultiply] crate.

mod internal;
mod error;
mod shape;
mod tensor;
mod variable;

pub mod ops;
pub mod scalar;
pub mod optimize;
pub mod loss;
pub mod layer;
pub mod config;
pub mod data;
pub mod train;

pub use error::{ Error, Result };
pub use shape::Shape;
pub use tensor::Tensor;
pub use variable::{ Variable, no_grad, is_grad_enabled, NoGradGuard };
pub use layer::{ Layer, Dense, Activation, Network };
pub use optimize::Optimizer;
pub use config::TrainConfig;
pub use data::{ Batch, BatchSource, Dataset };
pub use train::{ Trainer, TrainingSummary, Progress, Reporter, LogReporter, Visualizer };
