use std::rc::Rc;
use std::cell::RefCell;
use std::collections::HashMap;

use itertools::Itertools;
use log::{ debug, trace };

use crate::{
  error::Result,
  scalar::Real,
  tensor::Tensor,
  variable::{ Variable, mops::Op },
};


/// Arena holding the operation nodes of a computation graph.
///
/// Nodes are addressed by their index. An input is always recorded before
/// the operations consuming it, so every node only refers to nodes with a
/// smaller index and walking indices downwards is a reverse topological order.
///
/// Each node appears at most once per tape, identified by the id of the
/// variable it produced.

#[derive(Debug)]
pub(crate) struct Tape<T: Real> {
  nodes: RefCell<Vec<Node<T>>>,
}

impl<T: Real> Default for Tape<T> {
  fn default() -> Self {
    Self { nodes: RefCell::new(vec![]) }
  }
}

/// One recorded operation: its kind, its inputs, and the value and
/// accumulated gradient of its output.

#[derive(Debug, Clone)]
pub(crate) struct Node<T: Real> {
  id: usize,
  op: Op<T>,
  inputs: Vec<Slot<T>>,
  value: Tensor<T>,
  grad: Tensor<T>,
}

/// Reference to an operation input.
///
/// Tensors are shared with the input variable, so accumulating into
/// `grad` updates the variable's gradient.

#[derive(Debug, Clone)]
pub(crate) struct Slot<T: Real> {
  pub id: usize,
  pub data: Tensor<T>,
  pub grad: Option<Tensor<T>>,
  pub node: Option<usize>,
  pub trainable: bool,
}

impl<T: Real> Tape<T> {
  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.nodes.borrow().len()
  }

  /// Tape the inputs' operations get recorded on, together with the
  /// node index of each input on that tape.
  ///
  /// Inputs from distinct tapes get merged onto the first input's tape.

  pub fn join(inputs: &[&Variable<T>]) -> (Rc<Self>, Vec<Slot<T>>) {
    let tape = inputs.iter()
      .find_map(|input| input.origin.as_ref() )
      .map(|origin| origin.tape.clone() )
      .unwrap_or_default();

    let mut absorbed: Vec<(Rc<Self>, Vec<usize>)> = vec![];
    let slots = inputs.iter().map(|input| {
      let node = input.origin.as_ref().map(|origin| {
        if Rc::ptr_eq(&origin.tape, &tape) { return origin.index }
        let known = absorbed.iter().position(|(other, _)| Rc::ptr_eq(other, &origin.tape) );
        let mapping = match known {
          Some(i) => &absorbed[i].1,
          None => {
            let mapping = tape.absorb(&origin.tape);
            absorbed.push((origin.tape.clone(), mapping));
            &absorbed[absorbed.len() - 1].1
          },
        };
        mapping[origin.index]
      });
      Slot {
        id: input.id,
        data: input.data.clone(),
        grad: input.grad.clone(),
        node,
        trainable: input.trainable,
      }
    }).collect();

    (tape, slots)
  }

  /// Append the nodes of another tape that are not on this one yet,
  /// returning the local index of every node of `other`.

  fn absorb(&self, other: &Self) -> Vec<usize> {
    let mut nodes = self.nodes.borrow_mut();
    let others = other.nodes.borrow();
    let mut known: HashMap<usize, usize> = nodes.iter()
      .enumerate()
      .map(|(index, node)| (node.id, index) )
      .collect();
    let before = nodes.len();
    let mut mapping = Vec::with_capacity(others.len());
    for node in others.iter() {
      let index = match known.get(&node.id) {
        Some(&index) => index,
        None => {
          let mut node = node.clone();
          for slot in &mut node.inputs {
            if let Some(index) = &mut slot.node { *index = mapping[*index] }
          }
          known.insert(node.id, nodes.len());
          nodes.push(node);
          nodes.len() - 1
        },
      };
      mapping.push(index);
    }
    debug!("Merged {} of {} nodes into computation graph of {before}", nodes.len() - before, others.len());
    mapping
  }

  pub fn push(&self, id: usize, op: Op<T>, inputs: Vec<Slot<T>>, value: Tensor<T>, grad: Tensor<T>) -> usize {
    let mut nodes = self.nodes.borrow_mut();
    nodes.push(Node { id, op, inputs, value, grad });
    nodes.len() - 1
  }

  /// Mark all nodes `root` depends on.

  fn reachable(nodes: &[Node<T>], root: usize) -> Vec<bool> {
    let mut reachable = vec![false; root + 1];
    reachable[root] = true;
    for i in (0..=root).rev() {
      if !reachable[i] { continue }
      for slot in &nodes[i].inputs {
        if let Some(j) = slot.node {
          debug_assert!(j < i, "Computation graph is not topologically ordered");
          reachable[j] = true;
        }
      }
    }
    reachable
  }

  /// Propagate `seed` from node `root` back to every input it depends on.
  ///
  /// Intermediate gradients get recomputed from scratch, while gradients
  /// of leaf variables accumulate on top of their current value.

  pub fn backward(&self, root: usize, seed: &Tensor<T>) -> Result<()> {
    let nodes = self.nodes.borrow();
    let reachable = Self::reachable(&nodes, root);

    for (node, &r) in nodes.iter().zip(&reachable) {
      if r { node.grad.refill(T::zero()) }
    }
    nodes[root].grad.assign(seed)?;

    let mut visited = 0;
    for i in (0..=root).rev().filter(|&i| reachable[i] ) {
      let node = &nodes[i];
      let inputs: Vec<&Tensor<T>> = node.inputs.iter().map(|slot| &slot.data ).collect();
      let changes = node.op.derive(&inputs, &node.value, &node.grad)?;
      for (change, slot) in changes.iter().zip(&node.inputs) {
        if let Some(grad) = &slot.grad {
          grad.accumulate(change)?;
        }
      }
      visited += 1;
    }
    trace!("Back-propagated through {visited} of {} recorded operations", nodes.len());
    Ok(())
  }

  /// Distinct leaf inputs that `root` depends on.

  pub fn leaves(&self, root: usize) -> Vec<Slot<T>> {
    let nodes = self.nodes.borrow();
    let reachable = Self::reachable(&nodes, root);
    nodes.iter()
      .zip(&reachable)
      .filter(|(_, r)| **r )
      .flat_map(|(node, _)| node.inputs.iter() )
      .filter(|slot| slot.node.is_none() )
      .unique_by(|slot| slot.id )
      .cloned()
      .collect()
  }
}
