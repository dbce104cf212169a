use std::cell::Cell;


thread_local! {
  static GRAD_ENABLED: Cell<bool> = Cell::new(true);
}

/// Whether operations on differentiable [Variables](crate::Variable)
/// currently record computation graphs.

pub fn is_grad_enabled() -> bool {
  GRAD_ENABLED.with(|enabled| enabled.get() )
}

/// Disable graph recording until the returned guard is dropped.
///
/// Operations evaluated while the guard lives produce constant variables,
/// which is all inference needs.
///
/// ```
/// use microtrain::{ ops::*, Tensor, no_grad };
///
/// let w = Tensor::vec(&[1.0, 2.0]).trained();
/// {
///   let _guard = no_grad();
///   assert!(w.sqr().grad().is_none());
/// }
/// assert!(w.sqr().grad().is_some());
/// ```

pub fn no_grad() -> NoGradGuard {
  NoGradGuard::new(false)
}

/// Scope guard returned by [no_grad]. Restores the previous mode on drop,
/// so guards may be nested.

#[derive(Debug)]
#[must_use = "graph recording is re-enabled as soon as the guard is dropped"]
pub struct NoGradGuard {
  previous: bool,
}

impl NoGradGuard {
  fn new(enabled: bool) -> Self {
    let previous = GRAD_ENABLED.with(|cell| cell.replace(enabled) );
    Self { previous }
  }
}

impl Drop for NoGradGuard {
  fn drop(&mut self) {
    GRAD_ENABLED.with(|cell| cell.set(self.previous) );
  }
}
