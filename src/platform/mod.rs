pub mod common;
pub mod terminal;
