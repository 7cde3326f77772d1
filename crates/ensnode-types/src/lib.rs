//! Core type definitions shared across the ensnode workspace.
//!
//! - [`ImplKind`]: the stable kind tag embedded in every persisted record.
//! - [`ActiveList`]: which payload elements take part in one analysis round.
//! - [`EnsMatrix`]: the shared column-per-member analysis matrix, plus the
//!   scatter/gather primitives every scalar-backed payload uses.

pub mod active;
pub mod kind;
pub mod matrix;

pub use active::{ActiveIter, ActiveList, ActiveMode};
pub use kind::{ImplKind, VarType};
pub use matrix::{EnsMatrix, gather_active, scatter_active};
