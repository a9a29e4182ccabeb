pub mod cli;
pub mod printer;
