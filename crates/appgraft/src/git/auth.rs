//! Git authentication handling.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};

use crate::error::{GraftError, Result};
use crate::settings::GitAuthSettings;

/// Username sent with a token when none is configured.
const DEFAULT_TOKEN_USERNAME: &str = "x-access-token";

/// Escapes a value for safe use in single-quoted shell strings.
/// Replaces single quotes with '\'' (end quote, escaped quote, start quote).
pub fn shell_escape(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// RAII guard for askpass script cleanup.
///
/// Deletes the askpass script when dropped so the token is not left on disk,
/// including on error paths.
#[derive(Debug)]
pub struct AskpassCleanup {
    path: Option<PathBuf>,
}

impl AskpassCleanup {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub(crate) fn empty() -> Self {
        Self { path: None }
    }

    /// Path of the script this guard owns, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for AskpassCleanup {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Failed to clean up askpass script: {}", e);
            }
        }
    }
}

/// Authentication environment for git commands.
#[derive(Debug)]
pub struct AuthEnv {
    /// Environment variables to set for the git command.
    pub env_vars: Vec<(String, String)>,
    /// Must outlive the git command.
    pub _cleanup: AskpassCleanup,
}

impl AuthEnv {
    fn none() -> Self {
        Self {
            env_vars: Vec::new(),
            _cleanup: AskpassCleanup::empty(),
        }
    }
}

/// Reads the access token named by `auth.token_env_var`.
///
/// Returns `None` when token auth is not configured.
pub fn resolve_token(auth: &GitAuthSettings) -> Result<Option<SecretString>> {
    if auth.token_env_var.is_empty() {
        return Ok(None);
    }

    match std::env::var(&auth.token_env_var) {
        Ok(token) if !token.is_empty() => Ok(Some(SecretString::from(token))),
        _ => Err(GraftError::GitAuthFailed(format!(
            "token variable '{}' is not set",
            auth.token_env_var
        ))),
    }
}

/// Builds the environment for git commands that talk to the remote.
///
/// With token auth configured, writes a short-lived `GIT_ASKPASS` script that
/// answers the username and password prompts.
pub fn build_auth_env(auth: &GitAuthSettings) -> Result<AuthEnv> {
    let Some(token) = resolve_token(auth)? else {
        return Ok(AuthEnv::none());
    };

    let username = auth.username.as_deref().unwrap_or(DEFAULT_TOKEN_USERNAME);
    let askpass_path =
        std::env::temp_dir().join(format!(".appgraft-askpass-{}.sh", uuid::Uuid::new_v4()));
    let script = format!(
        "#!/bin/sh\ncase \"$1\" in\n  Username*) echo '{}' ;;\n  *) echo '{}' ;;\nesac\n",
        shell_escape(username),
        shell_escape(token.expose_secret())
    );

    write_script(&askpass_path, &script)?;
    let cleanup = AskpassCleanup::new(askpass_path.clone());

    let askpass_path_str = askpass_path
        .to_str()
        .ok_or_else(|| {
            GraftError::GitAuthFailed(
                "Temp directory path contains non-UTF8 characters".to_string(),
            )
        })?
        .to_string();

    Ok(AuthEnv {
        env_vars: vec![
            ("GIT_ASKPASS".to_string(), askpass_path_str),
            ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
        ],
        _cleanup: cleanup,
    })
}

#[cfg(unix)]
fn write_script(path: &Path, script: &str) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let write_err = |e| GraftError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o700)
        .open(path)
        .map_err(write_err)?;
    file.write_all(script.as_bytes()).map_err(write_err)
}

#[cfg(not(unix))]
fn write_script(path: &Path, script: &str) -> Result<()> {
    std::fs::write(path, script).map_err(|e| GraftError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}
