//! Host platform (linux for example) utility functions

use std::path::PathBuf;

use uname;

/// Name of the environment variable pointing at the software root directory.
///
/// The `params` and `sessions` directories are resolved relative to this root.
pub const SW_ROOT_ENV_VAR: &str = "PIPBOT_SW_ROOT";

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Get the software root directory from the `PIPBOT_SW_ROOT` environment variable.
pub fn get_pipbot_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
