//! Static machine facts gathered once at startup.
//!
//! Every sub-query is best effort. A query that is unsupported on the running
//! platform, or whose command fails, is replaced by a sentinel ([`NOT_APPLICABLE`]
//! or [`UNKNOWN`]) and logged at debug level. [`probe`] itself never fails.

use crate::errors::{ProbeError, ProbeResult};
use log::debug;
use serde::Serialize;
use std::fs;
use std::process::Command;

/// Sentinel for queries that do not apply to this platform or failed outright.
pub const NOT_APPLICABLE: &str = "N/A";

/// Sentinel for queries that ran but did not report the value.
pub const UNKNOWN: &str = "Unknown";

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Immutable snapshot of the host, created once per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInfo {
    /// OS name and kernel release, e.g. `Darwin 23.4.0`.
    pub os: String,
    pub processor: String,
    pub physical_cores: usize,
    pub logical_cores: usize,
    pub total_memory_bytes: u64,
    /// Name of the selected accelerated backend, e.g. `METAL` or `CPU`.
    pub backend: String,
    /// GPU core count, or a sentinel.
    pub gpu_cores: String,
    /// Whether the neural accelerator toolkit was loaded.
    pub neural_toolkit: bool,
}

impl SystemInfo {
    pub fn memory_gib(&self) -> f64 {
        self.total_memory_bytes as f64 / BYTES_PER_GIB
    }

    pub fn cores_summary(&self) -> String {
        format!(
            "{} Physical / {} Logical",
            self.physical_cores, self.logical_cores
        )
    }

    pub fn device_summary(&self) -> String {
        format!("{} ({} Cores)", self.backend, self.gpu_cores)
    }

    pub fn npu_summary(&self) -> &'static str {
        if self.neural_toolkit {
            "Enabled"
        } else {
            "Disabled"
        }
    }
}

/// Probes the host.
///
/// The backend name and toolkit state come from the caller, which has already
/// run backend selection and the toolkit load exactly once.
pub fn probe(backend: &str, neural_toolkit: bool) -> SystemInfo {
    SystemInfo {
        os: or_sentinel("os", os_description(), UNKNOWN),
        processor: or_sentinel("processor", processor_description(), std::env::consts::ARCH),
        physical_cores: num_cpus::get_physical(),
        logical_cores: num_cpus::get(),
        total_memory_bytes: total_memory_bytes().unwrap_or_else(|e| {
            debug!("Memory size query failed: {}", e);
            0
        }),
        backend: backend.to_string(),
        gpu_cores: gpu_core_count(),
        neural_toolkit,
    }
}

/// GPU core count through the platform side channel.
///
/// Only Apple platforms expose it (via `system_profiler`). Everything else
/// reports [`NOT_APPLICABLE`]; a profile without the field reports [`UNKNOWN`].
pub fn gpu_core_count() -> String {
    match query_gpu_cores() {
        Ok(cores) => cores,
        Err(ProbeError::FieldNotFound { .. }) => UNKNOWN.to_string(),
        Err(e) => {
            debug!("GPU core query unavailable: {}", e);
            NOT_APPLICABLE.to_string()
        }
    }
}

/// Extracts the value of `Total Number of Cores` from a display profile.
pub fn parse_gpu_core_count(profile: &str) -> Option<String> {
    profile
        .lines()
        .find(|line| line.contains("Total Number of Cores"))
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Extracts the first `model name` entry of a `/proc/cpuinfo` dump.
pub fn parse_cpuinfo_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("model name"))
        .find_map(|line| line.split_once(':'))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn or_sentinel(query: &str, result: ProbeResult<String>, sentinel: &str) -> String {
    result.unwrap_or_else(|e| {
        debug!("Probe query '{}' failed: {}", query, e);
        sentinel.to_string()
    })
}

fn query_gpu_cores() -> ProbeResult<String> {
    if !cfg!(target_os = "macos") {
        return Err(ProbeError::Unsupported {
            platform: std::env::consts::OS,
        });
    }
    let profile = run_command("system_profiler", &["SPDisplaysDataType"])?;
    parse_gpu_core_count(&profile).ok_or_else(|| ProbeError::FieldNotFound {
        field: "Total Number of Cores".to_string(),
        origin: "system_profiler SPDisplaysDataType".to_string(),
    })
}

fn processor_description() -> ProbeResult<String> {
    if cfg!(target_os = "linux") {
        let cpuinfo = fs::read_to_string("/proc/cpuinfo")?;
        parse_cpuinfo_model(&cpuinfo).ok_or_else(|| ProbeError::FieldNotFound {
            field: "model name".to_string(),
            origin: "/proc/cpuinfo".to_string(),
        })
    } else if cfg!(target_os = "macos") {
        let brand = run_command("sysctl", &["-n", "machdep.cpu.brand_string"])?;
        Ok(brand.trim().to_string())
    } else {
        Err(ProbeError::Unsupported {
            platform: std::env::consts::OS,
        })
    }
}

#[cfg(unix)]
fn os_description() -> ProbeResult<String> {
    use std::ffi::CStr;

    // SAFETY: utsname is plain old data and uname only writes into it.
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut uts) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    let sysname = unsafe { CStr::from_ptr(uts.sysname.as_ptr()) }.to_string_lossy();
    let release = unsafe { CStr::from_ptr(uts.release.as_ptr()) }.to_string_lossy();
    Ok(format!("{} {}", sysname, release))
}

#[cfg(not(unix))]
fn os_description() -> ProbeResult<String> {
    Ok(std::env::consts::OS.to_string())
}

#[cfg(unix)]
fn total_memory_bytes() -> ProbeResult<u64> {
    let pages = unsafe { libc::sysconf(libc::_SC_PHYS_PAGES) };
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if pages <= 0 || page_size <= 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(pages as u64 * page_size as u64)
}

#[cfg(not(unix))]
fn total_memory_bytes() -> ProbeResult<u64> {
    Err(ProbeError::Unsupported {
        platform: std::env::consts::OS,
    })
}

fn run_command(program: &str, args: &[&str]) -> ProbeResult<String> {
    let command = format!("{} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ProbeError::CommandFailed {
            command: command.clone(),
            message: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(ProbeError::CommandFailed {
            command,
            message: format!("exited with {}", output.status),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
