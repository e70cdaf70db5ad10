mod assets;

pub mod catalog;
pub mod config;
pub mod generation;
pub mod process;
pub mod service;

#[cfg(test)]
mod test_utils;

pub use assets::{get_config_dir, get_data_dir};
