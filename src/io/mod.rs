//! File output for run artifacts.

pub mod export;
