//! Test authoring tools for the testeng harness.
//!
//! Builds SEQ files in memory and compares kernel outputs bit for bit.

pub mod comparison;
pub mod seq_writer;
pub mod strategies;

pub use comparison::{ComparisonResult, compare_bits, compare_vectors};
pub use seq_writer::SeqWriter;

pub use proptest;
pub use test_strategy;
