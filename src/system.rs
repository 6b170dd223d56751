//! Runtime sampling from the /proc filesystem.
//!
//! [`ProcSampler`] feeds the library's `Sampler` contract with load averages,
//! uptime, process CPU, file descriptor, thread and memory figures, and disk
//! space from `statvfs`. Every reading is optional: a file that cannot be read
//! or parsed leaves the corresponding field empty.

use herakles_app_metrics::{Sampler, SystemSample};
use once_cell::sync::Lazy;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::debug;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    // SAFETY: sysconf is safe to call with _SC_CLK_TCK
    // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
    unsafe {
        let tck = libc::sysconf(libc::_SC_CLK_TCK);
        if tck > 0 {
            return tck as f64;
        }
    }
    100.0
}

/// System clock ticks per second (for CPU time calculation).
static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Parses "0.00 0.01 0.05 1/234 5678" from /proc/loadavg.
pub fn parse_load_average(content: &str) -> Result<[f64; 3], String> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(format!(
            "Invalid /proc/loadavg format: expected at least 3 fields, got {}",
            parts.len()
        ));
    }
    let mut loads = [0.0; 3];
    for (i, load) in loads.iter_mut().enumerate() {
        *load = parts[i]
            .parse::<f64>()
            .map_err(|e| format!("Failed to parse load average field {}: {}", i + 1, e))?;
    }
    Ok(loads)
}

/// Parses "<uptime_seconds> <idle_seconds>" from /proc/uptime.
pub fn parse_uptime(content: &str) -> Result<f64, String> {
    content
        .split_whitespace()
        .next()
        .ok_or_else(|| "Invalid /proc/uptime format: no fields found".to_string())?
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse uptime: {}", e))
}

/// CPU ticks (utime + stime) and start time in ticks from /proc/<pid>/stat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatTimes {
    pub cpu_ticks: u64,
    pub start_ticks: u64,
}

/// Parses /proc/<pid>/stat. Fields are counted after the closing parenthesis of
/// the command name, which may itself contain spaces.
pub fn parse_stat_times(content: &str) -> Result<StatTimes, String> {
    let (_, rest) = content
        .rsplit_once(')')
        .ok_or_else(|| "Invalid stat format: no command name".to_string())?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // rest starts at field 3 (state); utime=14, stime=15, starttime=22
    if fields.len() <= 19 {
        return Err("Invalid stat format: too few fields".to_string());
    }
    let field = |i: usize| {
        fields[i]
            .parse::<u64>()
            .map_err(|e| format!("Failed to parse stat field {}: {}", i + 3, e))
    };
    Ok(StatTimes {
        cpu_ticks: field(11)? + field(12)?,
        start_ticks: field(19)?,
    })
}

/// Reads a "Key:   1234 kB" line from /proc/<pid>/status, in bytes.
pub fn parse_status_kb(content: &str, key: &str) -> Option<u64> {
    parse_status_value(content, key).map(|kb| kb * 1024)
}

/// Reads a plain numeric "Key:  42" line from /proc/<pid>/status.
pub fn parse_status_value(content: &str, key: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|l| l.strip_prefix(key)?.strip_prefix(':'))
        .and_then(|v| v.split_whitespace().next())
        .and_then(|v| v.parse::<u64>().ok())
}

/// Soft limit of a /proc/<pid>/limits row, `None` when unlimited.
///
/// Format: "Max open files            1024                 1048576              files"
pub fn parse_soft_limit(content: &str, row: &str) -> Option<u64> {
    let line = content.lines().find(|l| l.starts_with(row))?;
    line[row.len()..]
        .split_whitespace()
        .next()
        .and_then(|v| v.parse::<u64>().ok())
}

/// Reads (sysname, nodename, release, machine) from uname.
fn read_uname_info() -> Result<(String, String, String, String), String> {
    use std::ffi::CStr;
    use std::mem;

    unsafe {
        // SAFETY: libc::utsname is a C struct with only arrays of i8/c_char
        // which are valid for zeroed memory initialization
        let mut utsname: libc::utsname = mem::zeroed();
        if libc::uname(&mut utsname) == 0 {
            let field = |p: *const libc::c_char| CStr::from_ptr(p).to_string_lossy().into_owned();
            Ok((
                field(utsname.sysname.as_ptr()),
                field(utsname.nodename.as_ptr()),
                field(utsname.release.as_ptr()),
                field(utsname.machine.as_ptr()),
            ))
        } else {
            Err("Failed to call uname".to_string())
        }
    }
}

/// Returns (available_bytes, total_bytes) for the filesystem holding `path`.
fn statvfs_space(path: &Path) -> Result<(u64, u64), String> {
    use std::ffi::CString;
    use std::mem;
    use std::os::unix::ffi::OsStrExt;

    let c_path =
        CString::new(path.as_os_str().as_bytes()).map_err(|e| format!("Invalid path: {}", e))?;

    unsafe {
        let mut stat: libc::statvfs = mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(format!("statvfs failed for {}", path.display()));
        }
        let block_size = stat.f_frsize as u64;
        Ok((
            block_size * stat.f_bavail as u64,
            block_size * stat.f_blocks as u64,
        ))
    }
}

/// cgroup v2 memory limit; `None` when unlimited or not in a cgroup.
fn read_cgroup_memory_max() -> Option<u64> {
    fs::read_to_string("/sys/fs/cgroup/memory.max")
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
}

fn read_or_log(path: &str) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!("Failed to read {}: {}", path, e);
            None
        }
    }
}

/// Previous CPU reading for delta-based usage.
struct CpuEntry {
    cpu_ticks: u64,
    at: Instant,
}

/// Sampler reading the current process and host from /proc.
pub struct ProcSampler {
    disk_path: PathBuf,
    processors: u32,
    started: Instant,
    last_cpu: Mutex<Option<CpuEntry>>,
    threads_peak: AtomicU64,
}

impl ProcSampler {
    pub fn new(disk_path: impl Into<PathBuf>) -> Self {
        let processors = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        Self {
            disk_path: disk_path.into(),
            processors,
            started: Instant::now(),
            last_cpu: Mutex::new(None),
            threads_peak: AtomicU64::new(0),
        }
    }

    /// CPU fraction since the previous call; `None` on the first call.
    fn cpu_usage(&self, cpu_ticks: u64) -> Option<f64> {
        let now = Instant::now();
        let mut last = self.last_cpu.lock().ok()?;
        let usage = last.as_ref().and_then(|prev| {
            let wall = now.duration_since(prev.at).as_secs_f64();
            if wall <= 0.0 {
                return None;
            }
            let cpu = cpu_ticks.saturating_sub(prev.cpu_ticks) as f64 / *CLK_TCK;
            Some((cpu / wall / self.processors as f64).clamp(0.0, 1.0))
        });
        *last = Some(CpuEntry { cpu_ticks, at: now });
        usage
    }
}

impl Sampler for ProcSampler {
    fn sample(&self) -> SystemSample {
        let mut sample = SystemSample {
            processors: Some(self.processors),
            ..Default::default()
        };

        match read_uname_info() {
            Ok((sysname, nodename, release, machine)) => {
                sample.hostname = Some(nodename);
                sample.os = Some(format!("{} {} {}", sysname, release, machine));
            }
            Err(e) => debug!("{}", e),
        }

        let system_uptime = read_or_log("/proc/uptime").and_then(|s| parse_uptime(&s).ok());
        sample.system_uptime_seconds = system_uptime.map(|u| u as u64);
        sample.load_average = read_or_log("/proc/loadavg").and_then(|s| parse_load_average(&s).ok());

        if let Some(times) = read_or_log("/proc/self/stat").and_then(|s| parse_stat_times(&s).ok()) {
            sample.cpu_usage = self.cpu_usage(times.cpu_ticks);
            sample.process_uptime_seconds = Some(match system_uptime {
                Some(up) => (up - times.start_ticks as f64 / *CLK_TCK).max(0.0),
                None => self.started.elapsed().as_secs_f64(),
            });
        }

        sample.files_open = fs::read_dir("/proc/self/fd").ok().map(|d| d.count() as u64);
        if let Some(limits) = read_or_log("/proc/self/limits") {
            sample.files_max = parse_soft_limit(&limits, "Max open files");
        }

        if let Some(status) = read_or_log("/proc/self/status") {
            sample.memory_used_bytes = parse_status_kb(&status, "VmRSS");
            sample.memory_peak_bytes = parse_status_kb(&status, "VmHWM");
            if let Some(threads) = parse_status_value(&status, "Threads") {
                let peak = self.threads_peak.fetch_max(threads, Ordering::Relaxed).max(threads);
                sample.threads_live = Some(threads);
                sample.threads_peak = Some(peak);
            }
        }
        sample.memory_max_bytes = read_cgroup_memory_max();

        match statvfs_space(&self.disk_path) {
            Ok((free, total)) => {
                sample.disk_free_bytes = Some(free);
                sample.disk_total_bytes = Some(total);
            }
            Err(e) => debug!("{}", e),
        }

        sample
    }

    fn memory_usage_bytes(&self) -> Option<u64> {
        fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| parse_status_kb(&s, "VmRSS"))
    }
}
