//! Traffic Signal Controller Library
//!
//! Cycles the signals of a four-way intersection, giving each direction
//! green time in proportion to its vehicle count.

pub mod control;
