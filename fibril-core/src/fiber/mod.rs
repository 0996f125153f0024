//! Fiber Tree
//!
//! A fiber is the mutable, per-generation record of one tree slot. Two
//! generations coexist: the committed tree (`current`) and the tree being
//! built (`work-in-progress`). A work-in-progress fiber that reuses a slot
//! points at its predecessor through `alternate`, which is how hook state and
//! host nodes carry over.
//!
//! # Links
//!
//! Each fiber stores `parent`, first `child` and next `sibling`. Children are
//! in positional order. Walks over the tree are iterative; see
//! [`FiberTree::next_in_walk`].
//!
//! # Lifetime
//!
//! At most two generations are alive at once. When a generation commits, the
//! fibers it replaced and every deleted subtree are freed from the arena.

mod node;
mod tree;

pub use node::{EffectTag, Fiber, FiberId, FiberKind, SlotId};
pub use tree::FiberTree;
