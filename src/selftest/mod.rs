//! Pre-flight check: are the external tools the commands rely on installed?

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::CommandSet;

/// Check every program named by `commands`.
pub fn run(commands: &CommandSet) -> SelfTestReport {
    info!("Self-test: checking external tools...");

    let mut results = Vec::new();
    let mut seen = BTreeSet::new();
    let mut needs_sudo = false;

    for (name, command) in commands.iter() {
        let Some(invocation) = Invocation::parse(command) else {
            results.push(ComponentResult {
                component: name.to_string(),
                status: TestStatus::Fail,
                details: "Command is empty".to_string(),
                remediation: Some(format!("Set [commands] {} in the config file.", name)),
            });
            continue;
        };
        needs_sudo |= invocation.sudo;

        if !seen.insert(invocation.program.to_string()) {
            continue;
        }

        // The impairment is optional: without it high_latency measures an unimpaired link.
        let optional = name.starts_with("netem");
        results.push(check_program(invocation.program, optional));
    }

    if needs_sudo && seen.insert("sudo".to_string()) {
        results.push(check_program("sudo", true));
    }

    info!("Self-test complete. {} check(s) run.", results.len());

    let ready = results.iter().all(|r| r.status != TestStatus::Fail);
    SelfTestReport { results, ready }
}

#[derive(Debug, Serialize)]
pub struct SelfTestReport {
    pub results: Vec<ComponentResult>,
    /// No check failed outright.
    pub ready: bool,
}

/// Self-test result for a single tool.
#[derive(Debug, Serialize, Clone)]
pub struct ComponentResult {
    pub component: String,
    pub status: TestStatus,
    pub details: String,
    pub remediation: Option<String>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Pass,
    Fail,
    Warning,
}

/// The program a shell command launches, seen through a leading `sudo`.
#[derive(Debug, PartialEq, Eq)]
struct Invocation<'a> {
    program: &'a str,
    sudo: bool,
}

impl<'a> Invocation<'a> {
    fn parse(command: &'a str) -> Option<Self> {
        let mut words = command
            .split_whitespace()
            // Leading VAR=value environment assignments
            .skip_while(|word| word.contains('=') && !word.starts_with('='));
        let first = words.next()?;
        if first != "sudo" {
            return Some(Self {
                program: first,
                sudo: false,
            });
        }
        let program = words.find(|word| !word.starts_with('-'))?;
        Some(Self {
            program,
            sudo: true,
        })
    }
}

fn check_program(program: &str, optional: bool) -> ComponentResult {
    match find_on_path(program) {
        Some(path) => ComponentResult {
            component: program.to_string(),
            status: TestStatus::Pass,
            details: format!("Found at {}", path.display()),
            remediation: None,
        },
        None => ComponentResult {
            component: program.to_string(),
            status: if optional {
                TestStatus::Warning
            } else {
                TestStatus::Fail
            },
            details: format!("'{}' not found on PATH", program),
            remediation: Some(remediation_for(program).to_string()),
        },
    }
}

fn remediation_for(program: &str) -> &'static str {
    match program {
        "iperf3" => "Install iperf3 (e.g. 'sudo apt install iperf3') and run 'iperf3 -s' on the server.",
        "ping" => "Install iputils-ping.",
        "scp" => "Install openssh-client and set up key-based access to the server.",
        "ffplay" => "Install ffmpeg (provides ffplay).",
        "tc" => "Install iproute2; high_latency will run without impairment otherwise.",
        "sudo" => "Install sudo or run tunnelbench as root for traffic shaping.",
        _ => "Install the tool or adjust the command template in the config file.",
    }
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}
