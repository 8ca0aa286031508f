//! System metrics sampling for status reports
//!
//! Produces the payload of one report cycle: normalized CPU load,
//! RAM usage in MB and a capped process list.

use serde::Serialize;
use sysinfo::System;
use tracing::debug;

/// One sampled report payload
#[derive(Debug, Serialize)]
pub struct Sample {
    pub cpu_load: f64,
    pub ram_used_mb: i64,
    pub ram_total_mb: i64,
    pub processes: Vec<ProcessEntry>,
}

/// Individual process entry (wire shape: {"pid":..,"cmd":".."})
#[derive(Debug, Serialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub cmd: String,
}

pub struct Sampler {
    sys: System,
}

impl Sampler {
    pub fn new() -> Self {
        Self {
            sys: System::new_all(),
        }
    }

    /// Collect one sample. CPU usage needs two refreshes with a short
    /// pause in between for an accurate reading.
    pub async fn sample(&mut self, max_processes: usize) -> Sample {
        debug!("Collecting system metrics...");
        self.sys.refresh_all();
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
        self.sys.refresh_cpu_usage();

        // sysinfo reports percent; the wire format wants [0,1]
        let cpu_load = (self.sys.global_cpu_info().cpu_usage() as f64 / 100.0).clamp(0.0, 1.0);

        let total_bytes = self.sys.total_memory();
        let available_bytes = self.sys.available_memory();
        let used_bytes = total_bytes.saturating_sub(available_bytes);
        let ram_total_mb = (total_bytes / (1024 * 1024)) as i64;
        let ram_used_mb = (used_bytes / (1024 * 1024)) as i64;

        let processes = self
            .sys
            .processes()
            .values()
            .take(max_processes)
            .map(|p| ProcessEntry {
                pid: p.pid().as_u32(),
                cmd: if p.name().is_empty() {
                    "unknown".to_string()
                } else {
                    p.name().to_string()
                },
            })
            .collect();

        Sample {
            cpu_load,
            ram_used_mb,
            ram_total_mb,
            processes,
        }
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}
