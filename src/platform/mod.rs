//! Platform contracts and the simulated device used by tests and the CLI.

pub mod pal;
pub mod sim;
