//! Process table scanning.

use std::collections::{HashMap, HashSet, VecDeque};

use sysinfo::{Pid, ProcessesToUpdate, System};

use super::patterns::{ProcessCandidate, TargetMatcher};

/// Fresh snapshot of every process.
pub(crate) fn snapshot() -> System {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All);
    system
}

/// Current process plus its ancestors and descendants, so a launcher or a child
/// of this daemon is never taken for the target.
pub(crate) fn own_family_pids(system: &System) -> Vec<u32> {
    let current_pid = std::process::id();
    let mut family = HashSet::new();
    family.insert(current_pid);

    let mut next_pid = current_pid;
    for _ in 0..10 {
        let Some(parent) = system.process(Pid::from_u32(next_pid)).and_then(|p| p.parent()) else {
            break;
        };
        let parent_id = parent.as_u32();
        if !family.insert(parent_id) {
            break;
        }
        next_pid = parent_id;
    }

    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (pid, process) in system.processes() {
        if let Some(parent) = process.parent() {
            children.entry(parent.as_u32()).or_default().push(pid.as_u32());
        }
    }

    let mut queue = VecDeque::from([current_pid]);
    while let Some(pid) = queue.pop_front() {
        for &child in children.get(&pid).map(Vec::as_slice).unwrap_or_default() {
            if family.insert(child) {
                queue.push_back(child);
            }
        }
    }

    family.into_iter().collect()
}

/// Turn the sysinfo table into plain candidates.
pub(crate) fn candidates(system: &System) -> Vec<ProcessCandidate> {
    system
        .processes()
        .iter()
        .map(|(pid, process)| {
            let cmd = process
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ");
            let cmd = if cmd.is_empty() {
                process.exe().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default()
            } else {
                cmd
            };
            ProcessCandidate {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                cmd,
            }
        })
        .collect()
}

/// PIDs of main target processes in `system`.
pub(crate) fn find_target_pids(system: &System, matcher: &TargetMatcher) -> Vec<u32> {
    let own = own_family_pids(system);
    let mut pids: Vec<u32> = candidates(system)
        .into_iter()
        .filter(|c| matcher.matches(c, &own))
        .map(|c| {
            tracing::debug!(
                "[Process] Target process: PID={}, name={}, cmd={}",
                c.pid,
                c.name,
                c.cmd.chars().take(100).collect::<String>()
            );
            c.pid
        })
        .collect();
    pids.sort_unstable();
    pids
}

/// Whether at least one main target process is running.
pub(crate) fn is_target_running(matcher: &TargetMatcher) -> bool {
    !find_target_pids(&snapshot(), matcher).is_empty()
}
