// src/config/mod.rs

//! Configuration loading and the Path Table model.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{DEFAULT_CONFIG_FILE, ensure_source_dir, load_and_validate, load_for_cli};
pub use model::{
    AssetClass, ClassOptions, ConfigFile, DefaultSection, ProjectInfo, ProjectSection,
    RawClassSection, RawConfigFile, ServeSection,
};
