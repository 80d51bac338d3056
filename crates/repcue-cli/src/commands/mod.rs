pub mod config;
pub mod history;
pub mod session;
pub mod workout;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;
