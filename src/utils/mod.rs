// mod.rs – shared helpers

pub mod logger;
pub mod vector;
