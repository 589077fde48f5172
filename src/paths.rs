use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};

fn data_home() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("vodwatch"))
}

pub fn database_file_path() -> Result<PathBuf> {
    match non_empty(env::var_os("VODWATCH_DB")) {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(data_home()?.join("vodwatch.db")),
    }
}

pub fn log_file_path() -> Result<PathBuf> {
    Ok(data_home()?.join("vodwatch.log"))
}

/// Directory for per-process IPC sockets.
pub fn socket_dir() -> PathBuf {
    env::temp_dir()
}

pub fn resolve_mpv_bin() -> PathBuf {
    resolve_mpv_bin_from_env(env::var_os("VODWATCH_MPV_BIN"))
}

pub(crate) fn resolve_mpv_bin_from_env(env_value: Option<OsString>) -> PathBuf {
    match non_empty(env_value) {
        Some(value) => PathBuf::from(value),
        None => PathBuf::from("mpv"),
    }
}

fn non_empty(value: Option<OsString>) -> Option<OsString> {
    value.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpv_bin_defaults_when_unset_or_empty() {
        assert_eq!(resolve_mpv_bin_from_env(None), PathBuf::from("mpv"));
        assert_eq!(
            resolve_mpv_bin_from_env(Some(OsString::new())),
            PathBuf::from("mpv")
        );
    }

    #[test]
    fn mpv_bin_uses_override() {
        assert_eq!(
            resolve_mpv_bin_from_env(Some(OsString::from("/opt/mpv/bin/mpv"))),
            PathBuf::from("/opt/mpv/bin/mpv")
        );
    }
}
