use anyhow::{bail, Result};
use opsdeck_common::types::Metric;
use std::sync::Mutex;
use std::time::Instant;
use sysinfo::{Disks, Networks, System};

/// Stateful `sysinfo` sampler for the resource metrics.
///
/// `sysinfo` handles want `&mut self` on refresh while the snapshot
/// port is `&self`, so each handle sits behind its own mutex. Network
/// throughput needs two observations; the first call after startup
/// reports no reading.
pub struct ResourceSampler {
    system: Mutex<System>,
    disks: Mutex<Disks>,
    network: Mutex<NetworkState>,
}

struct NetworkState {
    networks: Networks,
    last: Option<(Instant, u64)>,
}

impl ResourceSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            network: Mutex::new(NetworkState {
                networks: Networks::new_with_refreshed_list(),
                last: None,
            }),
        }
    }

    pub fn sample(&self, metric: Metric) -> Result<Option<f64>> {
        match metric {
            Metric::Cpu => Ok(Some(self.cpu_percent())),
            Metric::Memory => Ok(Some(self.memory_percent())),
            Metric::Disk => Ok(self.max_disk_percent()),
            Metric::Network => Ok(self.network_mb_per_sec()),
            other => bail!("{other} is not a resource metric"),
        }
    }

    fn cpu_percent(&self) -> f64 {
        let mut system = self.system.lock().unwrap();
        system.refresh_cpu_all();
        f64::from(system.global_cpu_usage())
    }

    fn memory_percent(&self) -> f64 {
        let mut system = self.system.lock().unwrap();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }
        (system.used_memory() as f64 / total as f64) * 100.0
    }

    /// Fullest real filesystem, as a percentage.
    fn max_disk_percent(&self) -> Option<f64> {
        let mut disks = self.disks.lock().unwrap();
        disks.refresh();
        disks
            .iter()
            .filter_map(|disk| {
                let total = disk.total_space();
                if total == 0 {
                    return None;
                }
                let used = total.saturating_sub(disk.available_space());
                Some((used as f64 / total as f64) * 100.0)
            })
            .fold(None, |max: Option<f64>, pct| {
                Some(max.map_or(pct, |m| m.max(pct)))
            })
    }

    /// Combined rx+tx throughput across all interfaces in MB/s, from
    /// the delta since the previous call.
    fn network_mb_per_sec(&self) -> Option<f64> {
        let mut state = self.network.lock().unwrap();
        state.networks.refresh();
        let total: u64 = state
            .networks
            .iter()
            .map(|(_, data)| data.total_received() + data.total_transmitted())
            .sum();
        let now = Instant::now();
        let reading = state.last.map(|(at, prev)| {
            let elapsed = now.duration_since(at).as_secs_f64();
            if elapsed <= 0.0 {
                return 0.0;
            }
            total.saturating_sub(prev) as f64 / elapsed / 1_000_000.0
        });
        state.last = Some((now, total));
        reading
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}
