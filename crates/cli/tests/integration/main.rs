//! End-to-end build scenarios for the tmake binary.

mod build_tests;
mod common;
