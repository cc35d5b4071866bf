//! Allocated node/core slots as Torque records them in `exec_host`.
//!
//! The attribute is a `+`-separated list of `node/slot` tokens, e.g.
//! `n01/0+n01/1+n02/0`. Newer servers compress slots into lists and ranges:
//! `n01/0-3,8+n02/0`.

use std::collections::{BTreeMap, BTreeSet};

use crate::misc::parsing::UnparsableField;

const ATTRIBUTE: &str = "exec_host";

/// Upper bound for a single `a-b` slot range.
const MAX_SLOT_RANGE: u32 = 1 << 16;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecHost {
    cores: BTreeMap<String, u32>,
    max_slot: BTreeMap<String, u32>,
}

#[derive(Debug, Default)]
struct NodeSlots {
    slots: BTreeSet<u32>,
    /// Occurrences of the node without any usable slot index.
    bare: u32,
}

impl ExecHost {
    /// Empty segments (`a/0++b/0`, leading or trailing `+`) are dropped before grouping.
    pub fn parse(input: &str) -> (Self, Vec<UnparsableField>) {
        let mut issues = Vec::new();
        let mut nodes = BTreeMap::<&str, NodeSlots>::new();

        for segment in input.split('+').map(str::trim).filter(|s| !s.is_empty()) {
            let (node, slots) = match segment.split_once('/') {
                Some((node, slots)) => (node, Some(slots)),
                None => (segment, None),
            };
            if node.is_empty() {
                issues.push(UnparsableField::new(ATTRIBUTE, segment, "slot without node name"));
                continue;
            }

            let entry = nodes.entry(node).or_default();
            let before = entry.slots.len();
            let valid = match slots.map(|slots| parse_slot_list(slots, &mut entry.slots)) {
                Some(Ok(())) => true,
                Some(Err(reason)) => {
                    issues.push(UnparsableField::new(ATTRIBUTE, segment, reason));
                    false
                }
                None => false,
            };
            // a repeated slot is not a new core, a segment that contributed nothing at all is
            // still one occupied core on that node
            if !valid && entry.slots.len() == before {
                entry.bare += 1;
            }
        }

        let mut exec_host = ExecHost::default();
        for (node, NodeSlots { slots, bare }) in nodes {
            let distinct = u32::try_from(slots.len()).unwrap_or(u32::MAX);
            exec_host.cores.insert(node.to_owned(), distinct.saturating_add(bare));
            if let Some(&max) = slots.last() {
                exec_host.max_slot.insert(node.to_owned(), max);
            }
        }
        (exec_host, issues)
    }

    /// node name → number of allocated cores
    pub fn cores(&self) -> &BTreeMap<String, u32> {
        &self.cores
    }

    /// node name → highest slot index seen, for nodes that carried one
    pub fn max_slot(&self) -> &BTreeMap<String, u32> {
        &self.max_slot
    }

    pub fn nodes(&self) -> usize {
        self.cores.len()
    }

    pub fn total_cores(&self) -> u32 {
        self.cores.values().fold(0u32, |sum, &cores| sum.saturating_add(cores))
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }
}

/// `3`, `0,2`, `0-3,8`. Everything parseable is inserted even if a later item fails.
fn parse_slot_list(slots: &str, into: &mut BTreeSet<u32>) -> Result<(), String> {
    let mut items = slots.split(',').filter(|item| !item.is_empty()).peekable();
    if items.peek().is_none() {
        return Err("empty slot list".to_owned());
    }

    for item in items {
        match item.split_once('-') {
            Some((first, last)) => {
                let first: u32 = first.parse().map_err(|e| format!("range start: {e}"))?;
                let last: u32 = last.parse().map_err(|e| format!("range end: {e}"))?;
                if first > last {
                    return Err(format!("descending range {first}-{last}"));
                }
                if last - first >= MAX_SLOT_RANGE {
                    return Err(format!("range {first}-{last} is implausibly wide"));
                }
                into.extend(first..=last);
            }
            None => {
                into.insert(item.parse().map_err(|e| format!("slot index: {e}"))?);
            }
        }
    }
    Ok(())
}
