//! Concrete payload kinds and their capability tables.

pub mod fault;
pub mod field;
pub mod gen_kw;
pub mod static_kw;
pub mod summary;

mod scalar;

pub use scalar::standard_normal;
