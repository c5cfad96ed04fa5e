//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! Programmatic:
//!     [ConfigOption, ...] (ordered)
//!     → options.rs (apply over defaults, validate once)
//!     → Configuration (validated, immutable)
//!     → Configuration::build() → Client
//!
//! From a file:
//!     settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientSettings::to_options() → same path as above
//! ```
//!
//! # Design Decisions
//! - Configuration is immutable once built
//! - Defaults never override explicitly set values
//! - Identity (operation name) is mandatory; nothing is guessed

pub mod loader;
pub mod options;
pub mod schema;
pub mod validation;

pub use options::{ConfigError, ConfigOption, Configuration, ConfigurationBuilder};
pub use schema::ClientSettings;
