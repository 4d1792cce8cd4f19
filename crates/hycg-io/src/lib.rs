//! # hycg I/O
//!
//! Persistence for the hycg solver. This crate provides:
//!
//! - **Binary records** ([`record`]): Dense matrices and vectors stored as a
//!   `(rows, cols)` header of two unsigned 64-bit counts followed by
//!   `rows * cols` row-major `f64` values, both in native byte order.
//! - **Problem generation** ([`generate`]): Random symmetric
//!   positive-definite systems for benchmarking and tests.

pub mod generate;
pub mod record;

pub use generate::generate_spd;
pub use record::{
    read_matrix, read_record, write_matrix, write_record, write_vector, DenseRecord, FormatError,
};
