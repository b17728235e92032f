//! Test helpers.

pub mod synthetic;
