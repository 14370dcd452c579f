pub(crate) mod cli;
pub(crate) mod error;

pub use cli::exec;
