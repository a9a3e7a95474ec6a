//! Process signature matching for the target application.
//!
//! Matching works on plain strings so it can be tested without a live process table.

use regex::{Regex, RegexBuilder};
use rotator_types::models::TargetAppConfig;

/// Name fragments of Electron/Chromium child processes.
const HELPER_MARKERS: &[&str] = &[
    "helper",
    "plugin",
    "renderer",
    "gpu",
    "crashpad",
    "utility",
    "audio",
    "sandbox",
    "language_server",
];

/// Operating system family whose signature rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

/// One row of the process table.
#[derive(Debug, Clone, Default)]
pub struct ProcessCandidate {
    pub pid: u32,
    pub name: String,
    /// Full command line, arguments joined by spaces
    pub cmd: String,
}

fn ci(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Compiled signature of the target application and of everything that must not be
/// mistaken for it.
#[derive(Debug, Clone)]
pub struct TargetMatcher {
    platform: Platform,
    manager_exact: Regex,
    manager_name: Regex,
    mac_app: Regex,
    win_exe: Regex,
    exact_name: Regex,
    path_based: Regex,
    exclusions: Vec<Regex>,
}

impl TargetMatcher {
    pub fn new(target: &TargetAppConfig, platform: Platform) -> Result<Self, regex::Error> {
        let process = regex::escape(&target.process_name);
        Ok(Self {
            platform,
            manager_exact: ci(&format!(r"\b{process}[-\s]?manager\b"))?,
            manager_name: ci(r"\bmanager\b")?,
            mac_app: ci(&format!(r"\b{}\b", regex::escape(&target.mac_bundle)))?,
            win_exe: ci(&format!(r"\b{}\b", regex::escape(&target.windows_exe)))?,
            exact_name: ci(&format!(r"^{process}$"))?,
            path_based: ci(&format!(r"[/\\]{process}\b"))?,
            exclusions: vec![
                ci(r"\belectron-forge\b")?,
                ci(r"\bnode_modules[/\\]electron\b")?,
                // Case-sensitive: the manager's own source checkout.
                Regex::new(r"\bAntigravityManager\b")?,
                ci(&format!(r"\b{process}[-\s]?tools\b"))?,
            ],
        })
    }

    /// This manager (or a sibling manager build).
    pub fn is_manager(&self, candidate: &ProcessCandidate) -> bool {
        self.manager_exact.is_match(&candidate.cmd)
            || self.manager_exact.is_match(&candidate.name)
            || self.manager_name.is_match(&candidate.name)
    }

    /// Chromium child process or crash handler.
    pub fn is_helper(candidate: &ProcessCandidate) -> bool {
        let name = candidate.name.to_lowercase();
        let cmd = candidate.cmd.to_lowercase();
        cmd.contains("--type=")
            || HELPER_MARKERS.iter().any(|marker| name.contains(marker))
            || cmd.contains("crashpad")
    }

    /// Development builds and unrelated tooling.
    pub fn is_excluded(&self, candidate: &ProcessCandidate) -> bool {
        self.exclusions.iter().any(|re| re.is_match(&candidate.cmd))
    }

    /// Platform signature of the main application process.
    pub fn is_target_app(&self, candidate: &ProcessCandidate) -> bool {
        let name = &candidate.name;
        match self.platform {
            Platform::MacOs => {
                self.mac_app.is_match(&candidate.cmd) || self.exact_name.is_match(name)
            },
            Platform::Windows => self.win_exe.is_match(name) || self.exact_name.is_match(name),
            Platform::Linux => {
                self.exact_name.is_match(name) || self.path_based.is_match(&candidate.cmd)
            },
        }
    }

    /// Full decision: a main target process that is neither us, a helper, nor a dev build.
    pub fn matches(&self, candidate: &ProcessCandidate, own_pids: &[u32]) -> bool {
        !own_pids.contains(&candidate.pid)
            && !self.is_manager(candidate)
            && !Self::is_helper(candidate)
            && !self.is_excluded(candidate)
            && self.is_target_app(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(pid: u32, name: &str, cmd: &str) -> ProcessCandidate {
        ProcessCandidate { pid, name: name.to_string(), cmd: cmd.to_string() }
    }

    fn matcher(platform: Platform) -> TargetMatcher {
        TargetMatcher::new(&TargetAppConfig::default(), platform).unwrap()
    }

    #[test]
    fn test_linux_main_process_matches() {
        let m = matcher(Platform::Linux);
        assert!(m.matches(&candidate(10, "antigravity", "/usr/share/antigravity/antigravity"), &[]));
        assert!(m.matches(&candidate(11, "electron", "/opt/Antigravity/antigravity --no-sandbox"), &[]));
        assert!(!m.matches(&candidate(12, "code", "/usr/bin/code"), &[]));
    }

    #[test]
    fn test_helpers_are_skipped() {
        let m = matcher(Platform::Linux);
        let renderer =
            candidate(20, "antigravity", "/usr/share/antigravity/antigravity --type=renderer");
        let crashpad = candidate(21, "chrome_crashpad_handler", "/opt/antigravity/crashpad");
        let server = candidate(22, "language_server_linux", "/usr/share/antigravity/bin/ls");
        assert!(!m.matches(&renderer, &[]));
        assert!(!m.matches(&crashpad, &[]));
        assert!(!m.matches(&server, &[]));
    }

    #[test]
    fn test_manager_and_dev_builds_are_skipped() {
        let m = matcher(Platform::Linux);
        assert!(!m.matches(&candidate(30, "antigravity-manager", "/opt/antigravity-manager"), &[]));
        assert!(!m.matches(
            &candidate(31, "node", "/home/u/AntigravityManager/node_modules/electron/dist/electron"),
            &[]
        ));
        assert!(!m.matches(&candidate(32, "node", "/home/u/antigravity-tools/run"), &[]));
        assert!(!m.matches(&candidate(33, "node", "npx electron-forge start /x/antigravity"), &[]));
    }

    #[test]
    fn test_own_pid_is_skipped() {
        let m = matcher(Platform::Linux);
        let me = candidate(40, "antigravity", "/usr/bin/antigravity");
        assert!(!m.matches(&me, &[40]));
        assert!(m.matches(&me, &[41]));
    }

    #[test]
    fn test_macos_bundle_signature() {
        let m = matcher(Platform::MacOs);
        let main = candidate(
            50,
            "Electron",
            "/Applications/Antigravity.app/Contents/MacOS/Electron",
        );
        let helper = candidate(
            51,
            "Antigravity Helper (GPU)",
            "/Applications/Antigravity.app/Contents/Frameworks/Antigravity Helper (GPU).app",
        );
        assert!(m.matches(&main, &[]));
        assert!(!m.matches(&helper, &[]));
        assert!(m.matches(&candidate(52, "Antigravity", ""), &[]));
    }

    #[test]
    fn test_windows_exe_signature() {
        let m = matcher(Platform::Windows);
        assert!(m.matches(&candidate(60, "Antigravity.exe", "C:\\Apps\\Antigravity.exe"), &[]));
        // Path-based matching is Linux only.
        assert!(!m.matches(&candidate(61, "node.exe", "C:\\x\\antigravity\\run.js"), &[]));
    }
}
