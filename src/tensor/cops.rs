use crate::ops::Cops;


impl Cops for i32 {}
impl Cops for i64 {}
impl Cops for u32 {}
impl Cops for u64 {}
impl Cops for usize {}

#[cfg(not(feature = "unsafe"))]
impl Cops for f32 {}

#[cfg(not(feature = "unsafe"))]
impl Cops for f64 {}

#[cfg(feature = "unsafe")]
impl Cops for f32 {
  fn matmul(rows_l: usize, cols_l: usize, cols_r: usize, lhs: &[f32], rhs: &[f32]) -> Vec<f32> {
    assert!(lhs.len() >= rows_l * cols_l && rhs.len() >= cols_l * cols_r);
    let mut data = vec![0.0; rows_l * cols_r];

    unsafe {
      matrixmultiply::sgemm(
        rows_l,
        cols_l,
        cols_r,
        1.0,
        lhs.as_ptr(),
        cols_l as isize,
        1,
        rhs.as_ptr(),
        cols_r as isize,
        1,
        0.0,
        data.as_mut_ptr(),
        cols_r as isize,
        1,
      );
    };

    data
  }
}

#[cfg(feature = "unsafe")]
impl Cops for f64 {
  fn matmul(rows_l: usize, cols_l: usize, cols_r: usize, lhs: &[f64], rhs: &[f64]) -> Vec<f64> {
    assert!(lhs.len() >= rows_l * cols_l && rhs.len() >= cols_l * cols_r);
    let mut data = vec![0.0; rows_l * cols_r];

    unsafe {
      matrixmultiply::dgemm(
        rows_l,
        cols_l,
        cols_r,
        1.0,
        lhs.as_ptr(),
        cols_l as isize,
        1,
        rhs.as_ptr(),
        cols_r as isize,
        1,
        0.0,
        data.as_mut_ptr(),
        cols_r as isize,
        1,
      );
    };

    data
  }
}


#[cfg(test)]
mod tests {
  use crate::{ Tensor, ops::NumericOps };

  #[test]
  fn matmul() {
    let x = Tensor::new(&[2,3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let y = Tensor::new(&[3,2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    assert_eq!(x.mm(&y).unwrap(), Tensor::new(&[2,2], vec![22.0, 28.0, 49.0, 64.0]).unwrap());
  }

  #[test]
  fn matmul_vector() {
    let x = Tensor::new(&[2,3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let y = Tensor::new(&[3,1], vec![1.0, 2.0, 3.0]).unwrap();
    assert_eq!(x.mm(&y).unwrap(), Tensor::new(&[2,1], vec![14.0, 32.0]).unwrap());
  }

  #[test]
  fn matmul_mismatch() {
    let x = Tensor::<f32>::zeros(&[2,3]);
    assert!(x.mm(&Tensor::zeros(&[2,3])).is_err());
    assert!(x.mm(&Tensor::zeros(&[3])).is_err());
  }
}
