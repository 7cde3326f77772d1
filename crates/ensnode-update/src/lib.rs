//! Ensemble-wide scatter/gather.
//!
//! An [`UpdatePlan`] fixes, up front, which parameters take part in an
//! update, which of their elements are active, and where each parameter's
//! row block starts. Scatter then fills one matrix column per member;
//! gather writes the updated rows back. Columns are disjoint slices, so
//! members are processed on worker threads without locking.

mod plan;

pub use plan::{MemberNodes, MemberNodesMut, PlanEntry, UpdatePlan};
