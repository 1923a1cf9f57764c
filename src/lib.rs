//! Benchmark harness for DiskANN disk index search with optional TensorStore backed index data.
//!
//! The index builder, searcher and converters are external DiskANN executables. This crate
//! shapes their argument lists, checks that each stage's inputs exist, and turns the
//! per-run result files written by the searcher into a comparison chart.
//!
//! A typical experiment runs [pipeline::Pipeline::to_fbin], [pipeline::Pipeline::build] and
//! [pipeline::Pipeline::convert] once, then [pipeline::Pipeline::query] once per backend. The
//! resulting `-res.txt` files are loaded as [results::Series] and drawn by [plot::save_chart].

pub mod artifacts;
pub mod config;
mod error;
pub mod pipeline;
pub mod plot;
pub mod results;
pub mod tools;


pub use error::{Error, Result};
