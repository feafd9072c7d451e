//! One-dimensional cutting optimizer for pipes: assigns demanded pieces to
//! stock lengths so that offcut, then the number of cuts, is minimal.

pub mod error;
pub mod parse;
pub mod pattern;
pub mod pipeline;
pub mod render;
pub mod solver;
pub mod types;

pub use error::{Error, Result};
pub use solver::Solver;
pub use types::{Catalog, Customer, Length, Order, Solution};
