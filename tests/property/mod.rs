//! Property-based tests

mod envelope_proptest;
