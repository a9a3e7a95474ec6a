//! Graceful-then-forceful termination of the target application.

use std::time::Duration;

use rotator_types::models::{SwitchConfig, TargetAppConfig};
use rotator_types::ProcessError;
use sysinfo::Pid;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::detection::{find_target_pids, snapshot};
use super::patterns::{Platform, TargetMatcher};

/// Ask the application to quit, bounded by the configured timeout and grace delay.
pub(crate) async fn request_graceful_quit(
    platform: Platform,
    target: &TargetAppConfig,
    config: &SwitchConfig,
) {
    let (program, args, grace_ms): (&str, Vec<String>, u64) = match platform {
        Platform::MacOs => (
            "osascript",
            vec![
                "-e".to_string(),
                format!("tell application \"{}\" to quit", target.display_name),
            ],
            config.graceful_grace_ms,
        ),
        // /T takes the child tree with it; no /F so the app can save state.
        Platform::Windows => (
            "taskkill",
            vec!["/IM".to_string(), windows_image_name(target), "/T".to_string()],
            config.graceful_grace_ms / 2,
        ),
        Platform::Linux => return,
    };

    info!("[Process] Attempting graceful exit via {}...", program);
    let run = Command::new(program).args(&args).kill_on_drop(true).output();
    match tokio::time::timeout(Duration::from_millis(config.graceful_quit_timeout_ms), run).await {
        Ok(Ok(output)) if output.status.success() => {
            tokio::time::sleep(Duration::from_millis(grace_ms)).await;
        },
        Ok(Ok(output)) => {
            debug!("[Process] {} exited with {}", program, output.status);
        },
        Ok(Err(e)) => warn!("[Process] {} could not be run: {}", program, e),
        Err(_) => warn!("[Process] {} timed out, proceeding to force stop", program),
    }
}

/// Kill every matching process. Individual failures are logged and skipped.
pub(crate) fn force_kill_all(matcher: &TargetMatcher) -> usize {
    let system = snapshot();
    let pids = find_target_pids(&system, matcher);
    if pids.is_empty() {
        info!("[Process] No target processes found running");
        return 0;
    }

    info!("[Process] Found {} remaining target processes. Killing...", pids.len());
    let mut killed = 0;
    for pid in &pids {
        match system.process(Pid::from_u32(*pid)) {
            Some(process) if process.kill() => killed += 1,
            // Already gone or not ours to kill.
            _ => debug!("[Process] Failed to kill process {}", pid),
        }
    }
    killed
}

/// Last resort: a single kill-by-name/path command.
pub(crate) async fn fallback_kill(
    platform: Platform,
    target: &TargetAppConfig,
    executable: &str,
) -> Result<(), ProcessError> {
    let (program, args): (&str, Vec<String>) = match platform {
        Platform::Windows => {
            let exe_name = executable
                .rsplit(['/', '\\'])
                .next()
                .filter(|s| !s.is_empty())
                .map_or_else(|| windows_image_name(target), str::to_string);
            ("taskkill", vec!["/F".into(), "/IM".into(), exe_name, "/T".into()])
        },
        Platform::MacOs => {
            let bundle = executable
                .split('/')
                .find(|seg| seg.to_lowercase().ends_with(".app"))
                .map_or_else(|| format!("{}.app", target.display_name), str::to_string);
            ("pkill", vec!["-9".into(), "-f".into(), format!("{bundle}/Contents/MacOS")])
        },
        Platform::Linux => ("pkill", vec!["-9".into(), "-f".into(), executable.to_string()]),
    };

    warn!("[Process] Attempting fallback termination: {} {}", program, args.join(" "));
    let status = Command::new(program)
        .args(&args)
        .status()
        .await
        .map_err(|e| ProcessError::CommandFailed {
            command: program.to_string(),
            message: e.to_string(),
        })?;
    debug!("[Process] Fallback command exited with {}", status);
    Ok(())
}

fn windows_image_name(target: &TargetAppConfig) -> String {
    // "antigravity.exe" -> "Antigravity.exe", matching the installed binary.
    let mut chars = target.windows_exe.chars();
    chars
        .next()
        .map(|c| c.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}
