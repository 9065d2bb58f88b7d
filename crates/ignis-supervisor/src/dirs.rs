//! Filesystem layout discovery (§6): a config dir and a data dir, each
//! preferring the XDG environment variables before falling back to the
//! platform's conventional user directories.
//!
//! Grounded on the `dirs` crate already present in the `alfredjeanlab-
//! oddjobs`/`groblegark-oddjobs` workspaces (there as a dev-dependency for
//! test fixtures; promoted to a normal runtime dependency here since
//! `ignis-supervisor` actually needs these paths to serve its default
//! storage — noted as a deviation from the teacher's usage in DESIGN.md).

use std::path::PathBuf;

const APP_NAME: &str = "ignis";

fn from_env(var: &str) -> Option<PathBuf> {
    std::env::var_os(var).map(PathBuf::from).filter(|p| !p.as_os_str().is_empty())
}

/// `XDG_CONFIG_HOME/ignis`, or the platform config dir's `ignis`
/// subdirectory.
pub fn config_dir() -> PathBuf {
    let base = from_env("XDG_CONFIG_HOME").or_else(dirs::config_dir).unwrap_or_else(|| PathBuf::from("."));
    base.join(APP_NAME)
}

/// `XDG_DATA_HOME/ignis`, or the platform data dir's `ignis` subdirectory.
pub fn data_dir() -> PathBuf {
    let base = from_env("XDG_DATA_HOME").or_else(dirs::data_dir).unwrap_or_else(|| PathBuf::from("."));
    base.join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xdg_config_home_takes_precedence() {
        // SAFETY: test runs single-threaded within this process for env
        // mutation purposes; no other test in this crate reads these vars.
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", "/tmp/xdg-cfg-test");
        }
        assert_eq!(config_dir(), PathBuf::from("/tmp/xdg-cfg-test/ignis"));
        unsafe {
            std::env::remove_var("XDG_CONFIG_HOME");
        }
    }

    #[test]
    fn xdg_data_home_takes_precedence() {
        unsafe {
            std::env::set_var("XDG_DATA_HOME", "/tmp/xdg-data-test");
        }
        assert_eq!(data_dir(), PathBuf::from("/tmp/xdg-data-test/ignis"));
        unsafe {
            std::env::remove_var("XDG_DATA_HOME");
        }
    }
}
