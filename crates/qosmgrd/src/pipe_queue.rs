//! The 32 entry pipe queue table of a profile.

use std::collections::BTreeMap;

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, CheckFailure, Command};

use crate::platform::QosContext;
use crate::queue::{fmt_qmap_legacy, Queue, MAX_WRR_PER_TC, NUM_PIPE_QUEUES, NUM_TRAFFIC_CLASSES};
use crate::traffic_class::{QueueLimit, TrafficClassBlock};

/// Configured pipe queues keyed by id. Unconfigured ids map to themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipeQueueSet {
    queues: BTreeMap<u64, Queue>,
}

impl PipeQueueSet {
    /// Parses a `queue` list and links each queue into its traffic class.
    ///
    /// WRR ids are handed out per class in queue id order. A priority-local
    /// queue never takes WRR id 0.
    pub fn build(list: &[Value], tcs: &mut TrafficClassBlock) -> CfgMgrResult<Self> {
        let mut queues = BTreeMap::new();
        for entry in list {
            let queue = Queue::parse(entry)?;
            queues.insert(queue.id, queue);
        }

        let mut next_wrr = [0usize; NUM_TRAFFIC_CLASSES];
        for queue in queues.values_mut() {
            let Some(tc) = tcs.get_mut(queue.tc) else {
                continue;
            };
            let next = &mut next_wrr[queue.tc as usize];
            if queue.priority_local && *next == 0 {
                *next = 1;
            }
            queue.wrr = Some((*next).min(u8::MAX as usize) as u8);
            *next += 1;
            tc.queues.push(queue.id);
        }

        Ok(Self { queues })
    }

    /// Gets a configured queue.
    pub fn get(&self, id: u64) -> Option<&Queue> {
        self.queues.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Resolves a pipe queue id to its qmap.
    ///
    /// ```
    /// use sonic_qosmgrd::pipe_queue::PipeQueueSet;
    ///
    /// let set = PipeQueueSet::default();
    /// assert_eq!(set.qmap(13, 0), 13);
    /// ```
    pub fn qmap(&self, id: u64, dp: u8) -> u32 {
        match self.queues.get(&id) {
            Some(queue) => queue.qmap(dp),
            None => (u32::from(dp) << 5) | id as u32,
        }
    }

    pub fn check(&self, path: &str, tcs: &TrafficClassBlock) -> Result<(), CheckFailure> {
        for queue in self.queues.values() {
            let qpath = format!("{}/queue/{}", path, queue.id);
            if queue.id as usize >= NUM_PIPE_QUEUES {
                return Err(CheckFailure::new(
                    format!("Queue id {} out of range 0..{}", queue.id, NUM_PIPE_QUEUES - 1),
                    qpath,
                ));
            }
            let Some(tc) = tcs.get(queue.tc) else {
                return Err(CheckFailure::new(
                    format!(
                        "Queue {} traffic-class {} out of range 0..{}",
                        queue.id,
                        queue.tc,
                        NUM_TRAFFIC_CLASSES - 1
                    ),
                    qpath,
                ));
            };
            let limit = tc.explicit_limit().map(|l| (l.unit(), l.value()));
            queue.check(&qpath, limit)?;
        }

        for tc in tcs.iter() {
            let overflow = tc.queues.len() > MAX_WRR_PER_TC
                || tc.queues.iter().any(|id| {
                    self.queues
                        .get(id)
                        .and_then(|q| q.wrr)
                        .is_some_and(|wrr| wrr as usize >= MAX_WRR_PER_TC)
                });
            if overflow {
                return Err(CheckFailure::new(
                    format!("Too many queues assigned to traffic-class {}", tc.id),
                    format!("{}/traffic-class/{}", path, tc.id),
                ));
            }
        }
        Ok(())
    }

    /// Queue table lines of one profile.
    pub fn commands(
        &self,
        ctx: &QosContext,
        ifname: &str,
        profile: usize,
        tcs: &TrafficClassBlock,
    ) -> Vec<Command> {
        let mut cmds = Vec::new();
        for queue in self.queues.values() {
            let qmap = fmt_qmap_legacy(queue.qmap(0));
            let prio = if queue.priority_local { " prio-loc" } else { "" };
            cmds.push(Command::set(
                format!("qos/{}/profile/{}/queue/{}", ifname, profile, qmap),
                format!(
                    "qos {} profile {} queue {} wrr-weight {}{}",
                    ifname, profile, qmap, queue.weight, prio
                ),
                ifname,
            ));

            let tc = tcs.get(queue.tc);
            let explicit = tc.and_then(|tc| tc.explicit_limit());
            if queue.has_wred() || explicit.is_some() {
                let limit = tc
                    .map(|tc| tc.limit(ctx))
                    .unwrap_or_else(|| QueueLimit::default_for(ctx.limits));
                cmds.push(Command::set(
                    format!("qos/{}/param/{}/{}", ifname, profile, qmap),
                    format!(
                        "qos {} param {} {} {}{}",
                        ifname,
                        profile,
                        qmap,
                        limit.token(),
                        queue.wred_commands()
                    ),
                    ifname,
                ));
            }
        }
        cmds
    }
}
