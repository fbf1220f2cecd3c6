//! pugdir core library: domain types, project config, errors.
//!
//! - [`types`]: option/local bags, reserved host keys, suffixes, input roots
//! - [`error`]: [`ConfigError`]
//! - [`config`]: `pugdir.yaml` load / save / init

pub mod config;
pub mod error;
pub mod types;

pub use config::ProjectConfig;
pub use error::ConfigError;
pub use types::{
    merge_config, Engine, HostOptions, InputPaths, InputRoots, Locals, Options, Suffixes,
    OUTPUT_SUFFIX, RESERVED_OPTION_KEYS, TEMPLATE_SUFFIX,
};
