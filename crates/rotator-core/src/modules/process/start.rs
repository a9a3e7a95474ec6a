//! Relaunching the target application.

use std::path::Path;
use std::process::Stdio;

use rotator_types::ProcessError;
use tokio::process::Command;
use tracing::{error, info, warn};

use super::patterns::Platform;
use crate::utils::paths::{is_wsl, wsl_to_windows_path};

const WSL_CMD: &str = "/mnt/c/Windows/System32/cmd.exe";

async fn run_checked(program: &str, args: &[&str]) -> Result<(), ProcessError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ProcessError::CommandFailed {
            command: program.to_string(),
            message: e.to_string(),
        })?;
    if output.status.success() {
        return Ok(());
    }
    Err(ProcessError::CommandFailed {
        command: program.to_string(),
        message: format!(
            "exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
    })
}

/// Hand a URI to the platform's handler.
pub(crate) async fn open_uri(platform: Platform, uri: &str) -> Result<(), ProcessError> {
    match platform {
        Platform::MacOs => run_checked("open", &[uri]).await,
        Platform::Windows => run_checked("cmd", &["/C", "start", "", uri]).await,
        Platform::Linux if is_wsl() => run_checked(WSL_CMD, &["/c", "start", "", uri]).await,
        Platform::Linux => run_checked("xdg-open", &[uri]).await,
    }
}

/// Start the executable directly, detached from this process.
pub(crate) async fn launch_executable(
    platform: Platform,
    display_name: &str,
    executable: &Path,
) -> Result<(), ProcessError> {
    let path = executable.to_string_lossy();
    match platform {
        Platform::MacOs => run_checked("open", &["-a", display_name]).await,
        Platform::Windows => run_checked("cmd", &["/C", "start", "", &path]).await,
        Platform::Linux if is_wsl() => {
            let windows_path = wsl_to_windows_path(&path);
            run_checked(WSL_CMD, &["/c", "start", "", &windows_path]).await
        },
        Platform::Linux => {
            std::process::Command::new(executable)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map(drop)
                .map_err(|e| ProcessError::LaunchFailed { message: format!("{path}: {e}") })
        },
    }
}

/// URI first when asked, then the executable.
pub(crate) async fn start_target(
    platform: Platform,
    use_uri: bool,
    uri: &str,
    display_name: &str,
    executable: &Path,
) -> Result<(), ProcessError> {
    if use_uri {
        info!("[Process] Using URI protocol to start...");
        match open_uri(platform, uri).await {
            Ok(()) => {
                info!("[Process] URI launch command sent");
                return Ok(());
            },
            Err(e) => warn!("[Process] URI launch failed ({}), trying executable path...", e),
        }
    }

    info!("[Process] Using executable path to start: {}", executable.display());
    launch_executable(platform, display_name, executable).await.map_err(|e| {
        error!("[Process] Failed to start via executable: {}", e);
        match e {
            ProcessError::LaunchFailed { .. } => e,
            other => ProcessError::LaunchFailed { message: other.to_string() },
        }
    })
}
