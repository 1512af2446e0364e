//! Per-port bookkeeping (§4.4): universe address, enable state and the
//! remote nodes/UIDs discovered on it. The actual HTP/LTP fold lives in
//! `dmxd_core::Universe`; this module only tracks what Art-Net itself needs
//! to know to keep talking to the network.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use dmxd_core::Timestamp;

use crate::constants::{ARTNET_DISABLE_PORT, RDM_MISSED_TODDATA_LIMIT};
use crate::uid::Uid;

/// A remote node that has PollReplied onto one of our ports.
#[derive(Debug, Clone)]
pub struct RemoteNode {
    pub ip: Ipv4Addr,
    pub last_seen: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniverseAddress {
    pub net: u8,
    pub subnet: u8,
    pub universe: u8,
}

impl UniverseAddress {
    pub fn from_sub_uni(net: u8, sub_uni: u8) -> Self {
        Self {
            net,
            subnet: (sub_uni >> 4) & 0x0f,
            universe: sub_uni & 0x0f,
        }
    }

    pub fn sub_uni(self) -> u8 {
        (self.subnet << 4) | (self.universe & 0x0f)
    }

    pub fn to_universe_id(self) -> dmxd_core::UniverseId {
        dmxd_core::UniverseId::new(self.net, ((self.subnet as u16) << 4) | self.universe as u16)
    }
}

#[derive(Debug, Clone)]
pub struct InputPortState {
    pub address: Option<UniverseAddress>,
    pub enabled: bool,
}

impl Default for InputPortState {
    fn default() -> Self {
        Self {
            address: None,
            enabled: false,
        }
    }
}

impl InputPortState {
    pub fn disable(&mut self) {
        self.address = None;
        self.enabled = false;
    }

    pub fn is_disabled_code(code: u8) -> bool {
        code == ARTNET_DISABLE_PORT
    }
}

/// One discovered UID's staleness counter and last-known responder,
/// aged per §4.4.4 and used to target unicast RDM requests (§3's
/// `uids: map<UID, (Ipv4, missed_tods)>`).
#[derive(Debug, Clone, Copy)]
struct TrackedUid {
    ip: Ipv4Addr,
    missed_rounds: u8,
}

#[derive(Debug, Clone, Default)]
pub struct OutputPortState {
    pub address: Option<UniverseAddress>,
    pub enabled: bool,
    pub subscribers: HashMap<Ipv4Addr, RemoteNode>,
    tod: HashMap<Uid, TrackedUid>,
    sequence: u8,
}

impl OutputPortState {
    pub fn disable(&mut self) {
        self.address = None;
        self.enabled = false;
        self.subscribers.clear();
        self.tod.clear();
    }

    /// Next ArtDmx sequence number for this port: a per-port counter that
    /// skips 0, since 0 is reserved on the wire to mean "sequencing not in
    /// use".
    pub fn next_sequence(&mut self) -> u8 {
        self.sequence = self.sequence.wrapping_add(1);
        if self.sequence == 0 {
            self.sequence = 1;
        }
        self.sequence
    }

    pub fn note_subscriber(&mut self, ip: Ipv4Addr, now: Timestamp) {
        self.subscribers
            .entry(ip)
            .and_modify(|n| n.last_seen = now)
            .or_insert(RemoteNode { ip, last_seen: now });
    }

    pub fn expire_subscribers(&mut self, now: Timestamp, timeout: std::time::Duration) {
        self.subscribers.retain(|_, node| !node.last_seen.is_older_than(now, timeout));
    }

    pub fn should_broadcast(&self, threshold: usize, always_broadcast: bool) -> bool {
        always_broadcast || self.subscribers.len() >= threshold
    }

    /// Records a freshly received `ArtTodData` into the tracked set,
    /// without touching `missed_rounds` — called once per inbound packet
    /// (§4.4.1). `from` is the node that answered with this TOD, recorded
    /// so a later RDM request to one of these UIDs knows where to unicast
    /// (§3, §4.4.1 step 2).
    pub fn note_tod(&mut self, discovered: &[Uid], from: Ipv4Addr) {
        for uid in discovered {
            self.tod.insert(*uid, TrackedUid { ip: from, missed_rounds: 0 });
        }
    }

    /// Ages every tracked UID by one discovery round: resets
    /// `missed_rounds` for everything in `seen` (the round's combined
    /// TOD, across every `ArtTodData` packet received during it) and
    /// increments it for everything else, evicting UIDs stale past
    /// `RDM_MISSED_TODDATA_LIMIT`. Driven from the discovery-round
    /// boundary rather than per packet, so UIDs reported by one
    /// responding node aren't penalized by another node's packet
    /// arriving first within the same round (§4.4.1).
    pub fn age_discovery_round(&mut self, seen: &std::collections::HashSet<Uid>) {
        for (uid, tracked) in self.tod.iter_mut() {
            if seen.contains(uid) {
                tracked.missed_rounds = 0;
            } else {
                tracked.missed_rounds += 1;
            }
        }
        self.tod.retain(|_, tracked| tracked.missed_rounds < RDM_MISSED_TODDATA_LIMIT);
    }

    /// Drops every tracked UID outright, used on an `ArtTodControl` flush
    /// where there is no `from` node to attribute a (now-empty) TOD to.
    pub fn clear_tod(&mut self) {
        self.tod.clear();
    }

    pub fn known_uids(&self) -> Vec<Uid> {
        self.tod.keys().copied().collect()
    }

    /// The last node known to answer for `uid`, if any (§4.4.1 step 2).
    pub fn uid_destination(&self, uid: &Uid) -> Option<Ipv4Addr> {
        self.tod.get(uid).map(|t| t.ip)
    }

    pub fn current_sequence(&self) -> u8 {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn universe_address_round_trips_sub_uni_byte() {
        let addr = UniverseAddress::from_sub_uni(3, 0x27);
        assert_eq!(addr.subnet, 2);
        assert_eq!(addr.universe, 7);
        assert_eq!(addr.sub_uni(), 0x27);
    }

    #[test]
    fn tod_aging_drops_uids_missed_past_the_limit_rounds() {
        let mut state = OutputPortState::default();
        let uid = Uid::new(0x4850, 1);
        let node = Ipv4Addr::new(10, 0, 0, 5);
        state.note_tod(&[uid], node);
        assert_eq!(state.known_uids(), vec![uid]);
        assert_eq!(state.uid_destination(&uid), Some(node));
        let empty = std::collections::HashSet::new();
        for _ in 0..RDM_MISSED_TODDATA_LIMIT {
            state.age_discovery_round(&empty);
        }
        assert!(state.known_uids().is_empty());
    }

    #[test]
    fn tod_aging_resets_counter_for_uids_seen_this_round() {
        let mut state = OutputPortState::default();
        let uid = Uid::new(0x4850, 1);
        let node = Ipv4Addr::new(10, 0, 0, 5);
        state.note_tod(&[uid], node);
        let mut seen = std::collections::HashSet::new();
        seen.insert(uid);
        for _ in 0..(RDM_MISSED_TODDATA_LIMIT * 2) {
            state.age_discovery_round(&seen);
        }
        assert_eq!(state.known_uids(), vec![uid]);
    }

    #[test]
    fn sequence_counter_skips_zero_on_wrap() {
        let mut state = OutputPortState::default();
        assert_eq!(state.next_sequence(), 1);
        assert_eq!(state.next_sequence(), 2);
        for _ in 0..252 {
            state.next_sequence();
        }
        assert_eq!(state.next_sequence(), 255);
        assert_eq!(state.next_sequence(), 1);
    }

    #[test]
    fn expire_subscribers_drops_stale_nodes() {
        let mut state = OutputPortState::default();
        let now = Timestamp::now();
        state.note_subscriber(Ipv4Addr::new(10, 0, 0, 1), now);
        std::thread::sleep(Duration::from_millis(5));
        state.expire_subscribers(Timestamp::now(), Duration::from_millis(1));
        assert!(state.subscribers.is_empty());
    }
}
