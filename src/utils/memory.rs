//! Memory-pressure signal sampled by the indexer.

/// One sample of memory use against a limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used_bytes: u64,
    pub limit_bytes: u64,
}

impl MemoryUsage {
    pub fn percent(&self) -> u8 {
        if self.limit_bytes == 0 {
            return 0;
        }
        let pct = self.used_bytes.saturating_mul(100) / self.limit_bytes;
        pct.min(u8::MAX as u64) as u8
    }
}

/// Source of memory-usage samples.
///
/// `None` means the platform offers no signal and the check is skipped.
pub trait MemoryProbe: Send + Sync {
    fn sample(&self) -> Option<MemoryUsage>;
}

/// Probe that never reports pressure
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemoryProbe;

impl MemoryProbe for NoMemoryProbe {
    fn sample(&self) -> Option<MemoryUsage> {
        None
    }
}

/// Probe returning the same sample every time
#[derive(Debug, Clone, Copy)]
pub struct FixedMemoryProbe(pub MemoryUsage);

impl MemoryProbe for FixedMemoryProbe {
    fn sample(&self) -> Option<MemoryUsage> {
        Some(self.0)
    }
}

/// Resident size of this process against its address-space limit, or
/// against `fallback_limit_bytes` when no limit is set
#[derive(Debug, Clone, Copy)]
pub struct ProcessMemory {
    fallback_limit_bytes: u64,
}

impl ProcessMemory {
    pub fn new(fallback_limit_bytes: u64) -> Self {
        Self {
            fallback_limit_bytes,
        }
    }

    pub fn from_megabytes(limit_mb: u64) -> Self {
        Self::new(limit_mb * 1024 * 1024)
    }

    fn limit_bytes(&self) -> u64 {
        address_space_limit().unwrap_or(self.fallback_limit_bytes)
    }
}

impl MemoryProbe for ProcessMemory {
    fn sample(&self) -> Option<MemoryUsage> {
        let used_bytes = resident_bytes()?;
        Some(MemoryUsage {
            used_bytes,
            limit_bytes: self.limit_bytes(),
        })
    }
}

#[cfg(target_os = "linux")]
fn resident_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    // SAFETY: sysconf has no preconditions
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        return None;
    }
    Some(resident_pages * page_size as u64)
}

#[cfg(not(target_os = "linux"))]
fn resident_bytes() -> Option<u64> {
    None
}

#[cfg(unix)]
fn address_space_limit() -> Option<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid, writable rlimit
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_AS, &mut limit) };
    if rc != 0 || limit.rlim_cur == libc::RLIM_INFINITY {
        return None;
    }
    Some(limit.rlim_cur as u64)
}

#[cfg(not(unix))]
fn address_space_limit() -> Option<u64> {
    None
}
