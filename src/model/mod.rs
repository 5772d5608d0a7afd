pub mod config;
pub mod extension_list;
