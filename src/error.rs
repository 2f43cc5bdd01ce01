//! Failure taxonomy shared by generation, model building, solving and extraction.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Rejection sampling ran out of retries, or the configured ranges cannot
    /// produce a valid instance (e.g. p larger than the number of locations).
    InstanceGeneration(String),
    /// The instance data is malformed: missing field, mismatched lengths,
    /// negative or non-finite numbers.
    ModelBuild(String),
    /// The capacitated instance cannot serve every client.
    InstanceInfeasible { total_capacity: u64, clients: usize },
    /// The solver backend failed on a structurally valid model.
    Solve(String),
    /// Metrics were requested from a solution that carries none.
    Extraction(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InstanceGeneration(msg) => write!(f, "instance generation failed: {msg}"),
            Error::ModelBuild(msg) => write!(f, "malformed instance: {msg}"),
            Error::InstanceInfeasible { total_capacity, clients } => write!(
                f,
                "instance infeasible: total capacity {total_capacity} cannot serve {clients} clients"
            ),
            Error::Solve(msg) => write!(f, "solver failure: {msg}"),
            Error::Extraction(msg) => write!(f, "extraction failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn model_build(msg: impl Into<String>) -> Error {
    Error::ModelBuild(msg.into())
}
