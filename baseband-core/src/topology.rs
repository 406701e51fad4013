//! NUMA-aware core pinning table (spec §4.6).
//!
//! The process enumerates NUMA nodes at startup and records the CPU id
//! list per node, so worker pinning uses that table rather than
//! kernel-assigned logical ids — logical neighbors then share L1/L2.
//! `core_affinity` (also used for real-time core pinning in
//! `other_examples/manifests/ethercrab-rs-ethercrab`) performs the actual
//! `sched_setaffinity` call; node discovery is local to this module.

use core_affinity::CoreId;

/// One NUMA node's available CPU ids, in kernel-reported order.
#[derive(Debug, Clone)]
pub struct NumaNode {
    pub node_id: usize,
    pub cpus: Vec<CoreId>,
}

/// The full per-process NUMA topology table.
#[derive(Debug, Clone)]
pub struct Topology {
    pub nodes: Vec<NumaNode>,
}

impl Topology {
    /// Assign the `n`-th worker to a core, cycling nodes round-robin so
    /// consecutive worker ids land on distinct nodes before reusing one,
    /// then cycling within a node so neighbors share cache.
    pub fn core_for_worker(&self, worker_index: usize) -> Option<CoreId> {
        if self.nodes.is_empty() {
            return None;
        }
        let node = &self.nodes[worker_index % self.nodes.len()];
        if node.cpus.is_empty() {
            return None;
        }
        let within = worker_index / self.nodes.len();
        Some(node.cpus[within % node.cpus.len()])
    }

    pub fn total_cpus(&self) -> usize {
        self.nodes.iter().map(|n| n.cpus.len()).sum()
    }
}

#[cfg(target_os = "linux")]
fn discover_linux() -> Option<Vec<NumaNode>> {
    use std::fs;

    let sys_node_dir = std::path::Path::new("/sys/devices/system/node");
    let entries = fs::read_dir(sys_node_dir).ok()?;

    let mut nodes = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(rest) = name.strip_prefix("node") {
            if let Ok(node_id) = rest.parse::<usize>() {
                let cpulist_path = entry.path().join("cpulist");
                if let Ok(contents) = fs::read_to_string(cpulist_path) {
                    let cpus = parse_cpulist(contents.trim());
                    if !cpus.is_empty() {
                        nodes.push(NumaNode { node_id, cpus });
                    }
                }
            }
        }
    }
    nodes.sort_by_key(|n| n.node_id);
    if nodes.is_empty() {
        None
    } else {
        Some(nodes)
    }
}

/// Parses a Linux `cpulist`-format string, e.g. `"0-3,8,10-11"`.
fn parse_cpulist(s: &str) -> Vec<CoreId> {
    let mut ids = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((lo, hi)) = part.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.parse::<usize>(), hi.parse::<usize>()) {
                for id in lo..=hi {
                    ids.push(CoreId { id });
                }
            }
        } else if let Ok(id) = part.parse::<usize>() {
            ids.push(CoreId { id });
        }
    }
    ids
}

/// Discover the NUMA layout. Falls back to a single synthetic node
/// covering every core reported by `core_affinity` when `/sys` NUMA
/// topology is unavailable (non-Linux hosts, containers, CI) — this
/// degraded mode is logged so it's visible rather than silently assumed.
pub fn discover_numa_nodes() -> Topology {
    #[cfg(target_os = "linux")]
    if let Some(nodes) = discover_linux() {
        return Topology { nodes };
    }

    let cpus = core_affinity::get_core_ids().unwrap_or_default();
    tracing::warn!(
        cpu_count = cpus.len(),
        "NUMA topology unavailable; falling back to a single synthetic node"
    );
    Topology {
        nodes: vec![NumaNode { node_id: 0, cpus }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_cpulist() {
        let ids: Vec<usize> = parse_cpulist("0-3,8,10-11").iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 8, 10, 11]);
    }

    #[test]
    fn round_robins_across_nodes_before_reuse() {
        let topo = Topology {
            nodes: vec![
                NumaNode {
                    node_id: 0,
                    cpus: vec![CoreId { id: 0 }, CoreId { id: 1 }],
                },
                NumaNode {
                    node_id: 1,
                    cpus: vec![CoreId { id: 2 }, CoreId { id: 3 }],
                },
            ],
        };
        let assigned: Vec<usize> = (0..4)
            .map(|i| topo.core_for_worker(i).unwrap().id)
            .collect();
        assert_eq!(assigned, vec![0, 2, 1, 3]);
    }

    #[test]
    fn empty_topology_yields_no_core() {
        let topo = Topology { nodes: vec![] };
        assert!(topo.core_for_worker(0).is_none());
    }
}
