pub mod config;
pub mod path_validation;
