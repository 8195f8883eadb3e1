use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use sysinfo::{Pid, System};

#[cfg(test)]
use mockall::automock;

/// Point-in-time memory reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl MemorySnapshot {
    pub fn new(used_bytes: u64, total_bytes: u64) -> Self {
        Self {
            used_bytes,
            total_bytes,
        }
    }

    /// Used/total ratio; an unknown total reads as no pressure
    pub fn usage_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.total_bytes as f64
        }
    }
}

/// Source of memory readings used by admission and health evaluation
#[cfg_attr(test, automock)]
pub trait MemoryProbe: Send + Sync {
    fn sample(&self) -> MemorySnapshot;
}

/// Inputs available to [`SystemMemoryProbe`] on one sample
#[derive(Debug, Clone, Copy, Default)]
struct MemoryReadings {
    /// cgroup (total, free) when running under a memory limit
    cgroup: Option<(u64, u64)>,
    /// Resident set size of this process
    process_rss: Option<u64>,
    host_used: u64,
    host_total: u64,
}

impl MemoryReadings {
    /// Usage within the cgroup limit when there is one, otherwise this
    /// process's RSS against host memory, otherwise host usage
    fn pressure(&self) -> MemorySnapshot {
        if let Some((total, free)) = self.cgroup.filter(|(total, _)| *total > 0) {
            return MemorySnapshot::new(total.saturating_sub(free), total);
        }
        match self.process_rss {
            Some(rss) => MemorySnapshot::new(rss, self.host_total),
            None => MemorySnapshot::new(self.host_used, self.host_total),
        }
    }
}

/// Reads memory pressure for this process through `sysinfo`
pub struct SystemMemoryProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn sample(&self) -> MemorySnapshot {
        let mut system = self
            .system
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        system.refresh_memory();

        let process_rss = self.pid.and_then(|pid| {
            system.refresh_process(pid);
            system.process(pid).map(|process| process.memory())
        });

        MemoryReadings {
            cgroup: system
                .cgroup_limits()
                .map(|limits| (limits.total_memory, limits.free_memory)),
            process_rss,
            host_used: system.used_memory(),
            host_total: system.total_memory(),
        }
        .pressure()
    }
}

/// Probe returning a settable reading, for simulations and dry runs
#[derive(Debug, Default)]
pub struct FixedMemoryProbe {
    used_bytes: AtomicU64,
    total_bytes: AtomicU64,
}

impl FixedMemoryProbe {
    pub fn new(used_bytes: u64, total_bytes: u64) -> Self {
        Self {
            used_bytes: AtomicU64::new(used_bytes),
            total_bytes: AtomicU64::new(total_bytes),
        }
    }

    /// Probe that reports `ratio` of a 1 GiB total
    pub fn with_ratio(ratio: f64) -> Self {
        let probe = Self::new(0, 1 << 30);
        probe.set_ratio(ratio);
        probe
    }

    pub fn set(&self, used_bytes: u64, total_bytes: u64) {
        self.used_bytes.store(used_bytes, Ordering::SeqCst);
        self.total_bytes.store(total_bytes, Ordering::SeqCst);
    }

    pub fn set_ratio(&self, ratio: f64) {
        let total = self.total_bytes.load(Ordering::SeqCst).max(1);
        let used = (total as f64 * ratio.clamp(0.0, 1.0)).round() as u64;
        self.used_bytes.store(used, Ordering::SeqCst);
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn sample(&self) -> MemorySnapshot {
        MemorySnapshot::new(
            self.used_bytes.load(Ordering::SeqCst),
            self.total_bytes.load(Ordering::SeqCst),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_ratio() {
        assert_eq!(MemorySnapshot::new(50, 100).usage_ratio(), 0.5);
        assert_eq!(MemorySnapshot::new(50, 0).usage_ratio(), 0.0);
    }

    #[test]
    fn test_fixed_probe_ratio() {
        let probe = FixedMemoryProbe::with_ratio(0.9);
        assert!((probe.sample().usage_ratio() - 0.9).abs() < 1e-6);

        probe.set_ratio(0.25);
        assert!((probe.sample().usage_ratio() - 0.25).abs() < 1e-6);

        probe.set(3, 4);
        assert_eq!(probe.sample(), MemorySnapshot::new(3, 4));
    }

    #[test]
    fn test_cgroup_limit_takes_precedence() {
        let readings = MemoryReadings {
            cgroup: Some((512, 128)),
            process_rss: Some(300),
            host_used: 60_000,
            host_total: 64_000,
        };
        assert_eq!(readings.pressure(), MemorySnapshot::new(384, 512));
    }

    #[test]
    fn test_process_rss_ignores_other_host_usage() {
        let readings = MemoryReadings {
            cgroup: None,
            process_rss: Some(1_000),
            host_used: 60_000,
            host_total: 64_000,
        };
        let snapshot = readings.pressure();
        assert_eq!(snapshot, MemorySnapshot::new(1_000, 64_000));
        assert!(snapshot.usage_ratio() < 0.85);
    }

    #[test]
    fn test_falls_back_to_host_usage() {
        let readings = MemoryReadings {
            cgroup: Some((0, 0)),
            process_rss: None,
            host_used: 30,
            host_total: 40,
        };
        assert_eq!(readings.pressure(), MemorySnapshot::new(30, 40));
    }

    #[test]
    fn test_system_probe_reports_total() {
        let probe = SystemMemoryProbe::new();
        let snapshot = probe.sample();
        assert!(snapshot.total_bytes > 0);
        assert!(snapshot.usage_ratio() <= 1.0);
    }
}
