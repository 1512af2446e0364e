use std::collections::HashSet;
use std::time::Duration;

use crate::buffer::DmxBuffer;
use crate::id::{ClientId, Origin, PortId, UniverseId};
use crate::time::{Timestamp, MERGE_TIMEOUT};

/// Upper bound on simultaneous contributors to one universe's merge. A
/// contribution from a new origin once this many are already active is
/// rejected rather than evicting an existing source.
pub const MAX_MERGE_SOURCES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    #[default]
    Htp,
    Ltp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityMode {
    #[default]
    Inherit,
    Override,
}

#[derive(Debug, Clone)]
pub struct MergeSource {
    pub origin: Origin,
    pub buffer: DmxBuffer,
    pub last_update: Timestamp,
    pub priority: u8,
    pub priority_mode: PriorityMode,
}

/// Per-universe merge state and membership. Dispatch to output ports and
/// clients is the caller's responsibility (see `dmxd-service::UniverseStore`
/// and `dmxd-service::Service`) — this type owns only the data that §4.2
/// describes as the universe's own state, deliberately with no dependency on
/// the port/client trait objects that would perform the fan-out.
#[derive(Debug, Clone)]
pub struct Universe {
    pub id: UniverseId,
    pub name: String,
    pub merge_mode: MergeMode,
    sources: Vec<MergeSource>,
    output: DmxBuffer,
    is_merging: bool,
    pub input_ports: HashSet<PortId>,
    pub output_ports: HashSet<PortId>,
    pub clients: HashSet<ClientId>,
}

impl Universe {
    pub fn new(id: UniverseId) -> Self {
        Self {
            id,
            name: String::new(),
            merge_mode: MergeMode::default(),
            sources: Vec::new(),
            output: DmxBuffer::new(),
            is_merging: false,
            input_ports: HashSet::new(),
            output_ports: HashSet::new(),
            clients: HashSet::new(),
        }
    }

    pub fn output(&self) -> &DmxBuffer {
        &self.output
    }

    pub fn is_merging(&self) -> bool {
        self.is_merging
    }

    pub fn member_count(&self) -> usize {
        self.input_ports.len() + self.output_ports.len() + self.clients.len()
    }

    /// Updates (or creates) the merge source for `origin` and recomputes the
    /// merge. Returns `Ok(true)` if the merged output changed, `Ok(false)`
    /// if it did not, and `Err` if the universe is already at
    /// `MAX_MERGE_SOURCES` and `origin` is not among the existing sources.
    pub fn update_source(
        &mut self,
        origin: Origin,
        buffer: DmxBuffer,
        now: Timestamp,
        priority: u8,
        priority_mode: PriorityMode,
    ) -> Result<bool, ()> {
        if let Some(existing) = self.sources.iter_mut().find(|s| s.origin == origin) {
            existing.buffer = buffer;
            existing.last_update = now;
            existing.priority = priority;
            existing.priority_mode = priority_mode;
        } else {
            if self.sources.len() >= MAX_MERGE_SOURCES {
                return Err(());
            }
            self.sources.push(MergeSource {
                origin,
                buffer,
                last_update: now,
                priority,
                priority_mode,
            });
        }
        Ok(self.recompute())
    }

    /// Drops any source whose `last_update` is older than `max_age`
    /// (`MERGE_TIMEOUT` for Art-Net-driven universes). Returns true if the
    /// merged output changed as a result.
    pub fn expire_sources(&mut self, now: Timestamp, max_age: Duration) -> bool {
        let before = self.sources.len();
        self.sources
            .retain(|s| !s.last_update.is_older_than(now, max_age));
        if self.sources.len() != before {
            self.recompute()
        } else {
            false
        }
    }

    pub fn expire_sources_default(&mut self, now: Timestamp) -> bool {
        self.expire_sources(now, MERGE_TIMEOUT)
    }

    pub fn remove_source(&mut self, origin: Origin) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.origin != origin);
        if self.sources.len() != before {
            self.recompute()
        } else {
            false
        }
    }

    pub fn sources(&self) -> &[MergeSource] {
        &self.sources
    }

    /// Re-runs the merge without touching any source — used by
    /// `SetMergeMode` (§4.5), which must re-fold the existing sources
    /// under the new policy rather than waiting for the next contribution.
    pub fn remerge(&mut self) -> bool {
        self.recompute()
    }

    /// Implements §4.2's merge algorithm: restrict to the highest-priority
    /// subset, then fold by `merge_mode` if more than one remains.
    fn recompute(&mut self) -> bool {
        let previous = self.output.clone();

        if self.sources.is_empty() {
            self.output = DmxBuffer::new();
            self.is_merging = false;
            return self.output != previous;
        }

        let max_priority = self.sources.iter().map(|s| s.priority).max().unwrap();
        let mut winners: Vec<&MergeSource> = self
            .sources
            .iter()
            .filter(|s| s.priority == max_priority)
            .collect();

        self.is_merging = winners.len() > 1;

        self.output = if winners.len() == 1 {
            winners[0].buffer.clone()
        } else {
            match self.merge_mode {
                MergeMode::Htp => {
                    let mut acc = DmxBuffer::new();
                    for w in &winners {
                        acc = acc.htp_merge(&w.buffer);
                    }
                    acc
                }
                MergeMode::Ltp => {
                    winners.sort_by_key(|s| s.last_update);
                    winners.last().unwrap().buffer.clone()
                }
            }
        };

        self.output != previous
    }

    /// True once a universe has no remaining members and is eligible for
    /// the next `garbage_collect()` sweep (it is not destroyed eagerly).
    pub fn is_gc_eligible(&self) -> bool {
        self.member_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn origin(n: u8) -> Origin {
        Origin::ArtNetRemote(Ipv4Addr::new(10, 0, 0, n))
    }

    #[test]
    fn htp_merge_scenario_from_spec() {
        let mut u = Universe::new(UniverseId::simple(0));
        let now = Timestamp::now();
        u.update_source(
            origin(1),
            DmxBuffer::from_slice(&[1, 2, 3, 4, 5]),
            now,
            100,
            PriorityMode::Inherit,
        )
        .unwrap();
        u.update_source(
            origin(2),
            DmxBuffer::from_slice(&[10, 11, 12]),
            now,
            100,
            PriorityMode::Inherit,
        )
        .unwrap();
        assert_eq!(u.output().get(), &[10, 11, 12, 4, 5]);
        assert!(u.is_merging());
    }

    #[test]
    fn ltp_merge_scenario_from_spec() {
        let mut u = Universe::new(UniverseId::simple(0));
        u.merge_mode = MergeMode::Ltp;
        let t1 = Timestamp::now();
        std::thread::sleep(Duration::from_millis(2));
        let t2 = Timestamp::now();
        u.update_source(
            origin(1),
            DmxBuffer::from_slice(&[1, 2, 3, 4, 5]),
            t1,
            100,
            PriorityMode::Inherit,
        )
        .unwrap();
        u.update_source(
            origin(2),
            DmxBuffer::from_slice(&[10, 11, 12]),
            t2,
            100,
            PriorityMode::Inherit,
        )
        .unwrap();
        assert_eq!(u.output().get(), &[10, 11, 12]);
    }

    #[test]
    fn higher_priority_source_wins_outright() {
        let mut u = Universe::new(UniverseId::simple(0));
        let now = Timestamp::now();
        u.update_source(
            origin(1),
            DmxBuffer::from_slice(&[1, 1, 1]),
            now,
            100,
            PriorityMode::Inherit,
        )
        .unwrap();
        u.update_source(
            origin(2),
            DmxBuffer::from_slice(&[200, 200, 200]),
            now,
            150,
            PriorityMode::Override,
        )
        .unwrap();
        assert_eq!(u.output().get(), &[200, 200, 200]);
        assert!(!u.is_merging());
    }

    #[test]
    fn source_capacity_is_enforced() {
        let mut u = Universe::new(UniverseId::simple(0));
        let now = Timestamp::now();
        for i in 0..MAX_MERGE_SOURCES as u8 {
            u.update_source(origin(i), DmxBuffer::new(), now, 100, PriorityMode::Inherit)
                .unwrap();
        }
        let result = u.update_source(
            origin(MAX_MERGE_SOURCES as u8),
            DmxBuffer::new(),
            now,
            100,
            PriorityMode::Inherit,
        );
        assert!(result.is_err());
    }

    #[test]
    fn gc_eligibility_is_membership_only() {
        let u = Universe::new(UniverseId::simple(0));
        assert!(u.is_gc_eligible());
    }

    #[test]
    fn expire_sources_drops_stale_contributions() {
        let mut u = Universe::new(UniverseId::simple(0));
        let old = Timestamp::now();
        u.update_source(
            origin(1),
            DmxBuffer::from_slice(&[5, 5, 5]),
            old,
            100,
            PriorityMode::Inherit,
        )
        .unwrap();
        assert!(!u.output().is_empty());
        let changed = u.expire_sources(Timestamp::now(), Duration::from_millis(0));
        assert!(changed);
        assert!(u.output().is_empty());
    }
}
