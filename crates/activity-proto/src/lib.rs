pub mod config;
pub mod fragment;
pub mod platform;
pub mod protocol;
