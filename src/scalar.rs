use rand::distributions::uniform::SampleUniform;
use num_traits::{ Float, NumAssignOps, Num, NumCast };

use crate::ops::Cops;


/// All numeric types that may be stored in a [Tensor](crate::Tensor).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Numeric:
  PartialEq + PartialOrd + Clone + Copy + std::fmt::Debug + 'static
  + Num + NumCast + NumAssignOps + std::iter::Sum {}

impl<T> Numeric for T
where
  T: PartialEq + PartialOrd + Clone + Copy + std::fmt::Debug + 'static
    + Num + NumCast + NumAssignOps + std::iter::Sum {}


/// All continuous numeric types.
///
/// Gradients can be computed for any [Variable](crate::Variable)
/// whose inner type satisfies this trait.

pub trait Real: Numeric + Float + SampleUniform + Cops + std::fmt::Display {}
impl<T: Numeric + Float + SampleUniform + Cops + std::fmt::Display> Real for T {}


/// Lossless-enough conversion between numeric types.
///
/// Used for counts and literal constants, which always fit the target type.

pub(crate) fn cast<T: Numeric>(value: impl num_traits::ToPrimitive) -> T {
  <T as NumCast>::from(value).unwrap()
}
