//! Host metric collection.
//!
//! `MetricsSource::collect` is allowed to block (CPU usage needs two
//! refreshes some time apart), so callers run it on the blocking pool.
//! The periodic sampler calls `collect`; request handlers call `sample_now`
//! and the other queries, which may be served from separate state so a busy
//! client cannot hold up a tick.

use crate::error::CollectionError;
use crate::types::{NetworkSummary, ProcessUsage, Reading};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use sysinfo::{Disks, MINIMUM_CPU_UPDATE_INTERVAL, Networks, ProcessesToUpdate, System};

pub trait MetricsSource: Send + Sync {
    fn collect(&self) -> Result<Reading, CollectionError>;

    /// An on-demand reading outside the sampling schedule.
    fn sample_now(&self) -> Result<Reading, CollectionError> {
        self.collect()
    }

    /// Unix epoch seconds of the last boot.
    fn boot_time(&self) -> Result<u64, CollectionError> {
        self.collect().map(|reading| reading.boot_time)
    }

    /// Top `n` processes by CPU usage, busiest first.
    fn top_processes(&self, _n: usize) -> Result<Vec<ProcessUsage>, CollectionError> {
        Err(CollectionError::unsupported("process listing"))
    }

    fn network(&self) -> Result<NetworkSummary, CollectionError> {
        Err(CollectionError::unsupported("network counters"))
    }
}

/// Metrics read through `sysinfo`, plus `/proc/net` for connection counts.
pub struct SysinfoSource {
    /// Owned by the sampler.
    sampling: Mutex<System>,
    /// Shared by `sample_now` and `top_processes`.
    queries: Mutex<System>,
    disk_mount: PathBuf,
    cpu_sample: Duration,
}

impl SysinfoSource {
    pub fn new(disk_mount: impl Into<PathBuf>, cpu_sample: Duration) -> Self {
        Self {
            sampling: Mutex::new(primed_system()),
            queries: Mutex::new(primed_system()),
            disk_mount: disk_mount.into(),
            cpu_sample: cpu_sample.max(MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    fn read(&self, system: &Mutex<System>) -> Result<Reading, CollectionError> {
        let (cpu_percent, memory_percent) = {
            let mut system = system.lock().unwrap_or_else(PoisonError::into_inner);

            system.refresh_cpu_usage();
            std::thread::sleep(self.cpu_sample);
            system.refresh_cpu_usage();
            if system.cpus().is_empty() {
                return Err(CollectionError::new("no CPUs reported by the OS"));
            }
            let cpu = f64::from(system.global_cpu_usage());

            system.refresh_memory();
            let total = system.total_memory();
            if total == 0 {
                return Err(CollectionError::new("total memory reported as zero"));
            }
            (cpu, system.used_memory() as f64 / total as f64 * 100.0)
        };

        let disk_percent = disk_usage(&self.disk_mount)?;
        let reading = Reading {
            cpu_percent,
            memory_percent,
            disk_percent,
            boot_time: System::boot_time(),
        };
        debug!(
            "[source] cpu={:.1}% mem={:.1}% disk={:.1}%",
            reading.cpu_percent, reading.memory_percent, reading.disk_percent
        );
        Ok(reading)
    }
}

fn primed_system() -> System {
    let mut system = System::new();
    system.refresh_cpu_usage();
    system.refresh_memory();
    system
}

impl MetricsSource for SysinfoSource {
    fn collect(&self) -> Result<Reading, CollectionError> {
        self.read(&self.sampling)
    }

    fn sample_now(&self) -> Result<Reading, CollectionError> {
        self.read(&self.queries)
    }

    fn boot_time(&self) -> Result<u64, CollectionError> {
        match System::boot_time() {
            0 => Err(CollectionError::new("boot time unavailable")),
            secs => Ok(secs),
        }
    }

    fn top_processes(&self, n: usize) -> Result<Vec<ProcessUsage>, CollectionError> {
        let mut system = self.queries.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes(ProcessesToUpdate::All, true);
        std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut processes: Vec<ProcessUsage> = system
            .processes()
            .values()
            .map(|p| ProcessUsage {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                cpu_percent: p.cpu_usage(),
                memory_bytes: p.memory(),
            })
            .collect();
        if processes.is_empty() {
            return Err(CollectionError::new("process table is empty"));
        }
        processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
        processes.truncate(n);
        Ok(processes)
    }

    fn network(&self) -> Result<NetworkSummary, CollectionError> {
        let networks = Networks::new_with_refreshed_list();
        let (bytes_received, bytes_sent) = networks
            .iter()
            .filter(|(name, _)| name.as_str() != "lo")
            .fold((0u64, 0u64), |(rx, tx), (_, data)| {
                (
                    rx.saturating_add(data.total_received()),
                    tx.saturating_add(data.total_transmitted()),
                )
            });

        Ok(NetworkSummary {
            bytes_received,
            bytes_sent,
            connections: established_connections(),
        })
    }
}

/// Used percentage of the filesystem holding `mount`.
fn disk_usage(mount: &Path) -> Result<f64, CollectionError> {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .filter(|d| mount.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .ok_or_else(|| {
            CollectionError::new(format!("no filesystem mounted at {}", mount.display()))
        })?;

    let total = disk.total_space();
    if total == 0 {
        return Err(CollectionError::new(format!(
            "filesystem at {} reports zero size",
            disk.mount_point().display()
        )));
    }
    let used = total.saturating_sub(disk.available_space());
    Ok(used as f64 / total as f64 * 100.0)
}

fn established_connections() -> Option<usize> {
    use procfs::net::TcpState;

    let v4 = procfs::net::tcp().ok()?;
    let v6 = procfs::net::tcp6().unwrap_or_default();
    Some(
        v4.iter()
            .chain(v6.iter())
            .filter(|entry| entry.state == TcpState::Established)
            .count(),
    )
}
