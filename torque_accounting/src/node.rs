use std::collections::BTreeMap;

use derive_more::derive::{Deref, Display, From, Into};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    job::JobRecord,
    report::{NodeUsageRow, NodeUtilizationRow},
};

/// Cores × seconds. Reserved time, independent of how busy the cores actually were.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Into, From, Display, Serialize,
)]
#[serde(transparent)]
pub struct CoreSeconds(pub u64);

impl CoreSeconds {
    /// Sums pin at `u64::MAX` instead of overflowing.
    pub fn saturating_add(self, other: Self) -> Self {
        CoreSeconds(self.0.saturating_add(other.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    /// Returned in place of an empty table. The caller decides whether the period was idle.
    #[error("no job reached the ended state, there is no node usage to report")]
    EmptyResultSet,
}

/// Reserved core-seconds per node, summed over all ended jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, Into)]
pub struct NodeUsage(BTreeMap<String, CoreSeconds>);

impl NodeUsage {
    pub fn collect<'a>(jobs: impl IntoIterator<Item = &'a JobRecord>) -> Result<Self, AggregateError> {
        let mut ended = 0usize;
        let mut total = BTreeMap::<String, CoreSeconds>::new();

        // only ended jobs carry usage
        for usage in jobs.into_iter().filter_map(JobRecord::usage) {
            ended += 1;
            for (node, &secs) in usage {
                let sum = total.entry(node.clone()).or_default();
                *sum = sum.saturating_add(secs);
            }
        }

        if ended == 0 {
            return Err(AggregateError::EmptyResultSet);
        }
        debug!(ended, nodes = total.len(), "aggregated node usage");
        Ok(NodeUsage(total))
    }

    /// In node name order.
    pub fn rows(&self) -> impl Iterator<Item = NodeUsageRow> + '_ {
        self.0.iter().map(|(node, &reserved)| NodeUsageRow {
            node: node.clone(),
            reserved_core_seconds: reserved,
        })
    }
}

/// Cores per node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, Into, From)]
pub struct NodeCapacity(BTreeMap<String, u32>);

impl NodeCapacity {
    /// Highest slot index ever handed out on a node, plus one. Only a lower bound: cores that were
    /// never allocated in the period stay invisible.
    pub fn estimate<'a>(jobs: impl IntoIterator<Item = &'a JobRecord>) -> Self {
        let mut capacity = BTreeMap::<String, u32>::new();
        for job in jobs {
            for (node, &max_slot) in job.fields().exec_host.max_slot() {
                let cores = max_slot.saturating_add(1);
                capacity
                    .entry(node.clone())
                    .and_modify(|known| *known = (*known).max(cores))
                    .or_insert(cores);
            }
        }
        NodeCapacity(capacity)
    }

    /// Reads a Torque `server_priv/nodes` file: `<name> [np=<cores>] [properties...]` per line.
    /// Without `np` Torque assumes a single core. Lines with an unusable `np` are skipped.
    pub fn from_nodes_file(content: &str) -> Self {
        let mut capacity = BTreeMap::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default();
            let mut tokens = line.split_whitespace();
            let Some(node) = tokens.next() else {
                continue;
            };
            match tokens.find_map(|token| token.strip_prefix("np=")) {
                None => {
                    capacity.insert(node.to_owned(), 1);
                }
                Some(np) => match np.parse::<u32>() {
                    Ok(cores) => {
                        capacity.insert(node.to_owned(), cores);
                    }
                    Err(e) => warn!(line = i + 1, node, np, "skipping node with unusable np: {e}"),
                },
            }
        }
        NodeCapacity(capacity)
    }

    /// A supplied table is used as is, the estimate only replaces a table that is missing
    /// entirely. Nodes absent from a supplied table count as zero cores.
    pub fn resolve<'a>(authoritative: Option<Self>, jobs: impl IntoIterator<Item = &'a JobRecord>) -> Self {
        match authoritative {
            Some(table) => table,
            None => Self::estimate(jobs),
        }
    }
}

/// Reserved vs. available core-seconds per node over a period, for every node that shows up in
/// either table.
pub fn utilization(usage: &NodeUsage, capacity: &NodeCapacity, period_seconds: u64) -> Vec<NodeUtilizationRow> {
    let mut nodes: Vec<&String> = usage.keys().chain(capacity.keys()).collect();
    nodes.sort();
    nodes.dedup();

    nodes
        .into_iter()
        .map(|node| {
            let cores = capacity.get(node).copied().unwrap_or(0);
            let reserved = usage.get(node).copied().unwrap_or_default();
            let available = CoreSeconds(u64::from(cores).saturating_mul(period_seconds));
            let pct_utilized = match *available {
                0 => 0.0,
                available => 100.0 * (*reserved as f64) / (available as f64),
            };
            NodeUtilizationRow {
                node: node.clone(),
                cores,
                reserved_core_seconds: reserved,
                available_core_seconds: available,
                pct_utilized,
            }
        })
        .collect()
}
