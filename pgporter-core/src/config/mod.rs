//! Export configuration.
//!
//! Flag values, environment variables (over an optional settings file) and
//! defaults are merged field by field into an immutable [`Settings`].

pub mod environment;
pub mod resolve;
pub mod settings;

pub use environment::{ENV_KEYS, Environment};
pub use resolve::{ConfigInputs, flag_or_env, resolve};
pub use settings::{
    ConnectionParts, ConnectionTarget, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SSL_MODE,
    DEFAULT_TIMEOUT_SECS, Settings,
};
