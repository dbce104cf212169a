use rand::Rng;

use crate::scalar::{ Real, cast };


// Polar Box-Muller transformation

pub fn randn<T: Real, R: Rng>(rng: &mut R) -> (T, T) {
  loop {
    let u = rng.gen_range(-T::one(), T::one());
    let v = rng.gen_range(-T::one(), T::one());
    let r = u * u + v * v;
    // Try again if outside interval
    if r == T::zero() || r >= T::one() { continue }
    let c = (cast::<T>(-2.0) * r.ln() / r).sqrt();
    return (u * c, v * c)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };

  #[test]
  fn normal_moments() {
    let mut rng = StdRng::seed_from_u64(3);
    let samples: Vec<f64> = (0..5000)
      .flat_map(|_| { let (a, b) = randn::<f64, _>(&mut rng); [a, b] })
      .collect();
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|a| (a - mean).powi(2) ).sum::<f64>() / n;
    assert!(mean.abs() < 0.05);
    assert!((variance - 1.0).abs() < 0.1);
  }
}
