//! Benchmark tooling for four location-science problems: uncapacitated and
//! capacitated facility location, max-sum dispersion and p-dispersion.
//!
//! Instances are generated with [`generate`], stored with [`format`], turned
//! into mixed-integer models by [`formulation`], solved through the
//! [`resolution::Solver`] boundary and read back by [`extract`].

pub mod error;
pub mod extract;
pub mod format;
pub mod formulation;
pub mod generate;
pub mod instance;
pub mod logging;
pub mod model;
pub mod report;
pub mod resolution;

pub use error::{Error, Result};
