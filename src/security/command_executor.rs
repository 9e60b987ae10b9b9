//! SafeCommandExecutor: allow-listed command execution for the build step
//!
//! # Security Features
//!
//! - **Allow-list validation**: Only pre-approved build tools can execute
//! - **Injection prevention**: Arguments are passed as a vector, never through a shell
//! - **Working directory validation**: Validates existence before execution
//! - **Timeout control**: The child is killed when it exceeds the timeout
//!
//! # Example
//!
//! ```rust,no_run
//! use artifact_publisher::security::SafeCommandExecutor;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), artifact_publisher::security::CommandError> {
//! let mut executor = SafeCommandExecutor::new(std::env::temp_dir())?;
//! executor.set_timeout(Duration::from_secs(600));
//!
//! let output = executor.execute("dotnet", &["pack".to_string()]).await?;
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//! # Ok(())
//! # }
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Build tools that may be run by the build step.
const ALLOWED_COMMANDS: &[&str] = &[
    "dotnet", "msbuild", "nuget", "npm", "yarn", "pnpm", "cargo", "make", "git",
];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed list
    #[error("Command '{0}' is not in the allowed list")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command execution failed (e.g., binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Command exceeded the timeout duration
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),
}

/// Safe command executor with security controls
#[derive(Debug)]
pub struct SafeCommandExecutor {
    /// Working directory where commands will be executed
    working_dir: PathBuf,
    /// Optional timeout for command execution
    timeout: Option<Duration>,
    /// PATH of the child process, inherited when unset
    search_path: Option<OsString>,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with working directory validation.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            timeout: None,
            search_path: None,
        })
    }

    /// Set command execution timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Set the PATH used to find and run the command.
    pub fn set_search_path(&mut self, path: OsString) {
        self.search_path = Some(path);
    }

    pub fn is_allowed(command: &str) -> bool {
        ALLOWED_COMMANDS.contains(&command)
    }

    /// Execute an allow-listed command.
    ///
    /// # Errors
    ///
    /// - `CommandError::CommandNotAllowed` - Command not in the allowed list
    /// - `CommandError::ExecutionFailed` - Binary not found or execution error
    /// - `CommandError::Timeout` - The command did not finish in time
    pub async fn execute(&self, command: &str, args: &[String]) -> Result<Output, CommandError> {
        if !Self::is_allowed(command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        // Windows-specific: npm, yarn, etc. are .cmd files, not .exe
        #[cfg(target_os = "windows")]
        let command_name = if matches!(command, "npm" | "yarn" | "pnpm") {
            format!("{}.cmd", command)
        } else {
            command.to_string()
        };

        #[cfg(not(target_os = "windows"))]
        let command_name = command.to_string();

        let mut child = Command::new(&command_name);
        child
            .args(args)
            .current_dir(&self.working_dir)
            .kill_on_drop(true);
        if let Some(path) = &self.search_path {
            child.env("PATH", path);
        }

        debug!(command = %command_name, ?args, dir = %self.working_dir.display(), "executing");
        let run = child.output();

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, run)
                .await
                .map_err(|_| CommandError::Timeout(timeout))?,
            None => run.await,
        };

        output.map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", command_name, e)))
    }
}
