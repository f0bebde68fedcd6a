// Build Matrix Module
// Environment set parsing and matrix expansion

pub mod env_set;
pub mod expander;

pub use env_set::{EnvAssignment, EnvSetError, EnvironmentSet, Variables};
pub use expander::{MatrixExpander, MatrixRule};
