//! Multiplier tiling for FPGAs.
//!
//! A `wx × wy` integer multiplier is a grid of partial product bits. This
//! crate covers that grid with hardware tiles (DSP blocks, LUT-mapped small
//! multipliers and their combinations), choosing the cover that is cheapest
//! in LUTs under a DSP budget, and optionally dropping the low-weight bits of
//! a truncated product.

pub mod bitheap;
pub mod config;
pub mod field;
pub mod geometry;
pub mod ilp;
pub mod opts;
pub mod target;
pub mod tiles;
pub mod tiling;
