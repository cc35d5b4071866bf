use std::collections::HashMap;

use derive_more::derive::{Deref, Into};
use itertools::Itertools as _;

use crate::{job::JobRecord, node::CoreSeconds, report::UserBillingRow};

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserAggregate {
    pub used_cpu_seconds: u64,
    /// requested cores × walltime
    pub requested: CoreSeconds,
}

impl UserAggregate {
    /// How much of the reserved core time was actually spent computing. 0 when nothing was
    /// requested.
    pub fn parallel_pct(&self) -> f64 {
        match *self.requested {
            0 => 0.0,
            requested => 100.0 * self.used_cpu_seconds as f64 / requested as f64,
        }
    }
}

/// Cpu and reserved core time per user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, Into)]
pub struct UserBilling(HashMap<String, UserAggregate>);

impl UserBilling {
    /// Every job counts, whatever its status, with the last recorded cpu and wall time.
    pub fn collect<'a>(jobs: impl IntoIterator<Item = &'a JobRecord>) -> Self {
        let mut users = HashMap::<String, UserAggregate>::new();
        for job in jobs {
            let fields = job.fields();
            let user = users.entry(fields.user.clone()).or_default();
            user.used_cpu_seconds = user.used_cpu_seconds.saturating_add(fields.cpu_time);
            user.requested = user
                .requested
                .saturating_add(CoreSeconds(u64::from(fields.req_cpus).saturating_mul(fields.wall_time)));
        }
        UserBilling(users)
    }

    /// Heaviest users first.
    pub fn rows(&self) -> Vec<UserBillingRow> {
        self.0
            .iter()
            .sorted_by(|(a_name, a), (b_name, b)| {
                b.used_cpu_seconds
                    .cmp(&a.used_cpu_seconds)
                    .then_with(|| a_name.cmp(b_name))
            })
            .map(|(user, aggregate)| UserBillingRow {
                user: user.clone(),
                used_cpu_hours: aggregate.used_cpu_seconds as f64 / SECONDS_PER_HOUR,
                requested_hours: *aggregate.requested as f64 / SECONDS_PER_HOUR,
                pct_parallel: aggregate.parallel_pct(),
            })
            .collect()
    }
}
