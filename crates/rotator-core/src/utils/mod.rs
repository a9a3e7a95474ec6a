//! Utility functions for HTTP, paths, atomic files, protobuf, and single-flight coordination.

pub mod fs;
pub mod http;
pub mod paths;
pub mod protobuf;
pub mod single_flight;

#[cfg(test)]
mod protobuf_test;
