pub mod cli;
pub mod commands;
pub mod pmd;
pub mod utils;
