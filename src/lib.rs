pub mod bridge;
pub mod commands;
pub mod config;
pub mod doctor;
pub mod error;
pub mod fs_utils;
pub mod identity;
pub mod paths;
pub mod profiles;
pub mod switch;
pub mod ui;

#[cfg(test)]
pub mod test_utils;
