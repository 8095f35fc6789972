// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/proc`-based resource probe. CPU percent is derived from the delta in
//! process ticks (`utime + stime` from `/proc/{pid}/stat`) across
//! successive samples, since a single `/proc` read only gives a cumulative
//! counter, not an instantaneous rate.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ResourceProbe, ResourceSample, SystemInfo};

/// Typical Linux `CLK_TCK`; `/proc/{pid}/stat` ticks are reported in this
/// unit on every mainstream kernel configuration.
const CLOCK_TICKS_PER_SEC: f64 = 100.0;

#[derive(Clone, Copy)]
struct PrevSample {
    total_ticks: u64,
    at: Instant,
}

#[derive(Default)]
pub struct LinuxResourceProbe {
    prev: Mutex<HashMap<u32, PrevSample>>,
}

impl LinuxResourceProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_rss_bytes(pid: u32) -> Option<u64> {
        let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("VmRSS:") {
                let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
                return Some(kb * 1024);
            }
        }
        None
    }

    fn read_total_ticks(pid: u32) -> Option<u64> {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        // Fields after the `(comm)` field can't be split naively on spaces
        // if comm contains spaces/parens, so split after the last ')'.
        let after_comm = stat.rsplit_once(')')?.1;
        let fields: Vec<&str> = after_comm.split_whitespace().collect();
        // state=0, ppid=1, ..., utime=11, stime=12 counting from after comm
        // (field 0 in the full record is pid, field 1 is comm, so utime is
        // field 13 overall == index 11 here, stime is field 14 == index 12).
        let utime: u64 = fields.get(11)?.parse().ok()?;
        let stime: u64 = fields.get(12)?.parse().ok()?;
        Some(utime + stime)
    }
}

#[async_trait]
impl ResourceProbe for LinuxResourceProbe {
    async fn sample(&self, pid: u32) -> Option<ResourceSample> {
        let rss_bytes = Self::read_rss_bytes(pid)?;
        let total_ticks = Self::read_total_ticks(pid)?;
        let now = Instant::now();

        let cpu_percent = {
            let mut prev = self.prev.lock();
            let percent = match prev.get(&pid) {
                Some(p) => {
                    let elapsed = now.saturating_duration_since(p.at).as_secs_f64();
                    let tick_delta = total_ticks.saturating_sub(p.total_ticks) as f64;
                    if elapsed > 0.0 {
                        (tick_delta / CLOCK_TICKS_PER_SEC / elapsed) * 100.0
                    } else {
                        0.0
                    }
                }
                None => 0.0,
            };
            prev.insert(pid, PrevSample { total_ticks, at: now });
            percent
        };

        Some(ResourceSample { cpu_percent, rss_bytes })
    }

    async fn system_info(&self) -> SystemInfo {
        let meminfo = std::fs::read_to_string("/proc/meminfo").unwrap_or_default();
        let mut total_memory = 0u64;
        let mut free_memory = 0u64;
        for line in meminfo.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                total_memory = parse_kb(rest);
            } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
                free_memory = parse_kb(rest);
            }
        }
        SystemInfo {
            total_memory,
            free_memory,
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
        }
    }
}

fn parse_kb(rest: &str) -> u64 {
    rest.trim()
        .trim_end_matches(" kB")
        .trim()
        .parse::<u64>()
        .unwrap_or(0)
        * 1024
}
