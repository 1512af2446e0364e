//! The Art-Net node engine (grounded in `plugins/artnet/ArtNetNode.h`):
//! owns the UDP socket, the per-port bookkeeping and the RDM queues, and
//! turns inbound datagrams into [`ArtNetEvent`]s for whatever owns the
//! universe merge (`dmxd-service`). Outbound DMX, discovery and RDM
//! requests are driven by the methods below rather than by the reactor —
//! this mirrors how the node's original C++ counterpart is a plain object
//! driven by its plugin, not a `SelectServer` client itself.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use dmxd_core::{DmxBuffer, Timestamp};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::constants::{
    ARTNET_DISABLE_PORT, ARTNET_MAX_PORTS, ARTNET_PORT, DEFAULT_BROADCAST_THRESHOLD, NODE_TIMEOUT, OpCode,
    RDM_REQUEST_TIMEOUT, RDM_TOD_TIMEOUT, TOD_FLUSH_COMMAND,
};
use crate::error::{ArtNetError, Result};
use crate::packet::{self, Dmx, IpProgReply, Poll, PollReply, Rdm, TodControl, TodData, TodRequest};
use crate::port::{InputPortState, OutputPortState, UniverseAddress};
use crate::rdm::{CommandClass, RdmOutcome, RdmRequest, RdmResponse};
use crate::uid::Uid;

/// Network-facing configuration (§10.4): the interface to bind, whether
/// DMX is always broadcast, and the node's advertised identity.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: Ipv4Addr,
    pub broadcast_address: Ipv4Addr,
    pub always_broadcast: bool,
    pub use_limited_broadcast_address: bool,
    pub broadcast_threshold: usize,
    pub short_name: String,
    pub long_name: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            broadcast_address: Ipv4Addr::new(255, 255, 255, 255),
            always_broadcast: false,
            use_limited_broadcast_address: true,
            broadcast_threshold: DEFAULT_BROADCAST_THRESHOLD,
            short_name: "dmxd".to_string(),
            long_name: "dmxd Art-Net node".to_string(),
        }
    }
}

/// Events the node surfaces to whatever owns universe merging. Inbound DMX
/// is not merged here — the node only decodes and forwards it.
#[derive(Debug, Clone)]
pub enum ArtNetEvent {
    Dmx {
        port_id: u8,
        address: UniverseAddress,
        source: Ipv4Addr,
        data: DmxBuffer,
    },
    RdmRequestReceived {
        port_id: u8,
        request: RdmRequest,
    },
}

struct DiscoveryState {
    callback: Box<dyn FnOnce(Vec<Uid>) + Send>,
    collected: Vec<Uid>,
    /// Nodes seeded from the port's subscribers at discovery start;
    /// responders are removed as their `ArtTodData` arrives, and the
    /// discovery completes early once this is empty (§4.4.1).
    expected: std::collections::HashSet<Ipv4Addr>,
    deadline: Timestamp,
}

struct PendingRdm {
    callback: Box<dyn FnOnce(RdmOutcome) + Send>,
    deadline: Timestamp,
    request: RdmRequest,
}

/// Per-port bookkeeping. `QueueingRdmController` is deliberately not a
/// field here — it is the caller's facility for queueing concurrent RDM
/// requests behind the one the node has in flight (§4.4.1), not the
/// node's own state.
#[derive(Default)]
struct PortState {
    input: InputPortState,
    output: OutputPortState,
    discovery: Option<DiscoveryState>,
    pending_rdm: Option<PendingRdm>,
}

struct Inner {
    config: NodeConfig,
    ports: [PortState; ARTNET_MAX_PORTS],
    transaction_counter: u8,
    /// ArtPollReply's NetSwitch/SubSwitch (§10.7): advertised net/subnet,
    /// settable independently of any individual port's universe address.
    net_address: u8,
    subnet_address: u8,
}

/// A cloneable handle to the running node. Cheap to clone; all mutable
/// state lives behind the inner mutex.
#[derive(Clone)]
pub struct ArtNetNode {
    inner: Arc<Mutex<Inner>>,
    socket: Arc<UdpSocket>,
    events: mpsc::UnboundedSender<ArtNetEvent>,
}

impl ArtNetNode {
    /// Binds the Art-Net socket and returns the node handle plus the event
    /// receiver the caller should drain (typically forwarding `Dmx` events
    /// into a universe's merge set).
    pub async fn bind(config: NodeConfig) -> Result<(Self, mpsc::UnboundedReceiver<ArtNetEvent>)> {
        let socket = UdpSocket::bind((config.bind_address, ARTNET_PORT)).await?;
        socket.set_broadcast(true)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            config,
            ports: Default::default(),
            transaction_counter: 0,
            net_address: 0,
            subnet_address: 0,
        };
        let node = Self {
            inner: Arc::new(Mutex::new(inner)),
            socket: Arc::new(socket),
            events: tx,
        };
        Ok((node, rx))
    }

    /// Spawns the receive loop. The returned handle completes only on a
    /// socket error; the caller owns its lifetime.
    pub fn spawn_receive_loop(&self) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            loop {
                match node.socket.recv_from(&mut buf).await {
                    Ok((len, from)) => node.handle_datagram(&buf[..len], from),
                    Err(e) => {
                        warn!(error = %e, "Art-Net socket read failed");
                        break;
                    }
                }
            }
        })
    }

    /// Spawns the periodic maintenance tick (subscriber aging, timeouts).
    /// Grounded in the node's `NODE_TIMEOUT`/`RDM_TOD_TIMEOUT` bookkeeping.
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                node.tick(Timestamp::now());
            }
        })
    }

    fn tick(&self, now: Timestamp) {
        let mut inner = self.inner.lock();
        for port in inner.ports.iter_mut() {
            port.output.expire_subscribers(now, NODE_TIMEOUT);
            if let Some(discovery) = &port.discovery {
                if discovery.deadline.is_older_than(now, Duration::ZERO) {
                    let discovery = port.discovery.take().unwrap();
                    let seen: std::collections::HashSet<Uid> = discovery.collected.iter().copied().collect();
                    port.output.age_discovery_round(&seen);
                    (discovery.callback)(discovery.collected);
                }
            }
            if let Some(pending) = &port.pending_rdm {
                if pending.deadline.is_older_than(now, Duration::ZERO) {
                    let pending = port.pending_rdm.take().unwrap();
                    (pending.callback)(RdmOutcome::Timeout);
                }
            }
        }
    }

    fn port_mut<'a>(inner: &'a mut Inner, port_id: u8) -> Result<&'a mut PortState> {
        inner
            .ports
            .get_mut(port_id as usize)
            .ok_or(ArtNetError::PortIdOutOfRange(port_id))
    }

    /// Configures an output port's universe address, or disables it when
    /// `sub_uni == ARTNET_DISABLE_PORT`.
    pub fn set_output_port_universe(&self, port_id: u8, net: u8, sub_uni: u8) -> Result<()> {
        let mut inner = self.inner.lock();
        let port = Self::port_mut(&mut inner, port_id)?;
        if InputPortState::is_disabled_code(sub_uni) {
            port.output.disable();
        } else {
            port.output.address = Some(UniverseAddress::from_sub_uni(net, sub_uni));
            port.output.enabled = true;
        }
        Ok(())
    }

    pub fn set_input_port_universe(&self, port_id: u8, net: u8, sub_uni: u8) -> Result<()> {
        let mut inner = self.inner.lock();
        let port = Self::port_mut(&mut inner, port_id)?;
        if InputPortState::is_disabled_code(sub_uni) {
            port.input.disable();
        } else {
            port.input.address = Some(UniverseAddress::from_sub_uni(net, sub_uni));
            port.input.enabled = true;
        }
        Ok(())
    }

    pub fn short_name(&self) -> String {
        self.inner.lock().config.short_name.clone()
    }

    pub fn set_short_name(&self, name: String) {
        self.inner.lock().config.short_name = name;
    }

    pub fn long_name(&self) -> String {
        self.inner.lock().config.long_name.clone()
    }

    pub fn set_long_name(&self, name: String) {
        self.inner.lock().config.long_name = name;
    }

    pub fn net_address(&self) -> u8 {
        self.inner.lock().net_address
    }

    pub fn set_net_address(&self, net: u8) {
        self.inner.lock().net_address = net;
    }

    pub fn subnet_address(&self) -> u8 {
        self.inner.lock().subnet_address
    }

    pub fn set_subnet_address(&self, subnet: u8) {
        self.inner.lock().subnet_address = subnet;
    }

    /// `SendPoll`: broadcasts an ArtPoll so remote nodes reply and refresh
    /// (or establish) their subscriber entries.
    pub async fn send_poll(&self) -> Result<()> {
        let bytes = packet::encode_poll(&Poll {
            flags: 0,
            diag_priority: 0,
        });
        self.broadcast(&bytes).await
    }

    /// `SendDMX` (§4.4): sends a freshly merged universe output out every
    /// enabled output port addressed to it. Unicasts to known subscribers
    /// unless broadcast is forced or the subscriber count clears the
    /// configured threshold.
    pub async fn send_dmx(&self, port_id: u8, data: &DmxBuffer) -> Result<()> {
        let (sub_uni, net, targets, broadcast, sequence) = {
            let mut inner = self.inner.lock();
            let threshold = inner.config.broadcast_threshold;
            let always_broadcast = inner.config.always_broadcast;
            let port = Self::port_mut(&mut inner, port_id)?;
            let addr = match port.output.address {
                Some(a) if port.output.enabled => a,
                _ => return Ok(()),
            };
            let broadcast = port.output.should_broadcast(threshold, always_broadcast);
            let targets: Vec<Ipv4Addr> = port.output.subscribers.keys().copied().collect();
            (addr.sub_uni(), addr.net, targets, broadcast, port.output.next_sequence())
        };
        let dmx = Dmx {
            sequence,
            physical: port_id,
            sub_uni,
            net,
            data: data.clone(),
        };
        let bytes = packet::encode_dmx(&dmx);
        if broadcast || targets.is_empty() {
            self.broadcast(&bytes).await?;
        } else {
            for ip in targets {
                self.socket.send_to(&bytes, (ip, ARTNET_PORT)).await?;
            }
        }
        Ok(())
    }

    /// `SendTimeCode`: fanned out to every output port that enables it, via
    /// a single broadcast (all ports share the one wire frame).
    pub async fn send_timecode(&self, frame: [u8; 4]) -> Result<()> {
        let bytes = packet::encode_timecode(frame);
        self.broadcast(&bytes).await
    }

    async fn broadcast(&self, bytes: &[u8]) -> Result<()> {
        let addr = {
            let inner = self.inner.lock();
            if inner.config.use_limited_broadcast_address {
                Ipv4Addr::new(255, 255, 255, 255)
            } else {
                inner.config.broadcast_address
            }
        };
        self.socket.send_to(bytes, (addr, ARTNET_PORT)).await?;
        Ok(())
    }

    /// `RunFullDiscovery` / `RunIncrementalDiscovery`: requests the TOD from
    /// every node subscribed to the port's universe and resolves once all
    /// replies arrive or `RDM_TOD_TIMEOUT` elapses.
    pub async fn run_discovery(&self, port_id: u8, full: bool, callback: Box<dyn FnOnce(Vec<Uid>) + Send>) -> Result<()> {
        let deadline = Timestamp::from(Timestamp::now().into_instant() + RDM_TOD_TIMEOUT);
        let (net, address) = {
            let mut inner = self.inner.lock();
            let port = Self::port_mut(&mut inner, port_id)?;
            if port.discovery.is_some() {
                return Err(ArtNetError::Core(dmxd_core::Error::DiscoveryInProgress));
            }
            let addr = port.output.address.ok_or(ArtNetError::PortIdOutOfRange(port_id))?;
            let expected = port.output.subscribers.keys().copied().collect();
            port.discovery = Some(DiscoveryState {
                callback,
                collected: Vec::new(),
                expected,
                deadline,
            });
            (addr.net, addr.universe)
        };
        let ctrl = TodControl {
            net,
            command: if full { TOD_FLUSH_COMMAND } else { 0 },
            address,
        };
        let bytes = packet::encode_tod_control(&ctrl);
        self.broadcast(&bytes).await?;
        let req = TodRequest {
            net,
            addresses: {
                let mut a = [0u8; 32];
                a[0] = address;
                a
            },
            address_count: 1,
        };
        self.broadcast(&packet::encode_tod_request(&req)).await?;
        // `tick` resolves the discovery once `deadline` passes, regardless
        // of whether every expected node replied.
        Ok(())
    }

    /// `SendRDMRequest`: rejects a second concurrent request on the same
    /// port with `RdmInFlight`, matching the original node's documented
    /// one-request-at-a-time contract; additional requests should be queued
    /// by the caller via [`QueueingRdmController`] instead. Looks up the
    /// target UID's last-known responder and unicasts; a UID never seen in
    /// a TOD fails with `UidUnknown` (§4.4.1 step 2).
    pub async fn send_rdm_request(&self, port_id: u8, request: RdmRequest, callback: Box<dyn FnOnce(RdmOutcome) + Send>) -> Result<()> {
        let (net, address, destination, bytes) = {
            let mut inner = self.inner.lock();
            let port = Self::port_mut(&mut inner, port_id)?;
            if port.pending_rdm.is_some() {
                return Err(ArtNetError::Core(dmxd_core::Error::RdmInFlight));
            }
            let addr = port.output.address.ok_or(ArtNetError::PortIdOutOfRange(port_id))?;
            let destination = port
                .output
                .uid_destination(&request.dest_uid)
                .ok_or_else(|| ArtNetError::Core(dmxd_core::Error::UidUnknown(request.dest_uid.to_string())))?;
            port.pending_rdm = Some(PendingRdm {
                callback,
                deadline: Timestamp::from(Timestamp::now().into_instant() + RDM_REQUEST_TIMEOUT),
                request: request.clone(),
            });
            (addr.net, addr.universe, destination, request.encode())
        };
        let rdm = Rdm { net, address, data: bytes };
        self.socket
            .send_to(&packet::encode_rdm(&rdm), (destination, ARTNET_PORT))
            .await?;
        Ok(())
    }

    fn next_transaction(inner: &mut Inner) -> u8 {
        inner.transaction_counter = inner.transaction_counter.wrapping_add(1);
        inner.transaction_counter
    }

    fn handle_datagram(&self, datagram: &[u8], from: SocketAddr) {
        let from_ip = match from.ip() {
            std::net::IpAddr::V4(v4) => v4,
            std::net::IpAddr::V6(_) => return,
        };
        let (op, payload) = match packet::parse_header(datagram) {
            Ok(v) => v,
            Err(e) => {
                trace!(error = %e, "dropping malformed Art-Net datagram");
                return;
            }
        };
        match op {
            OpCode::Poll => self.handle_poll(from_ip),
            OpCode::PollReply => self.handle_poll_reply(payload, from_ip),
            OpCode::Dmx => self.handle_dmx(payload, from_ip),
            OpCode::TodRequest => self.handle_tod_request(payload),
            OpCode::TodData => self.handle_tod_data(payload, from_ip),
            OpCode::TodControl => self.handle_tod_control(payload),
            OpCode::Rdm => self.handle_rdm(payload),
            OpCode::IpProg => self.handle_ip_prog(payload, from_ip),
            _ => trace!(?op, "unhandled Art-Net opcode"),
        }
    }

    /// `HandleTodRequest`: another controller is asking who answers on a
    /// given universe. Any output port discovering or already holding a TOD
    /// for one of the addressed universes replies with its current UID set
    /// (§4.4.2, `SendTod`).
    fn handle_tod_request(&self, payload: &[u8]) {
        let Ok(req) = packet::decode_tod_request(payload) else {
            return;
        };
        let addresses = req.addresses[..req.address_count as usize].to_vec();
        self.announce_tod(req.net, addresses);
    }

    /// `HandleTodControl`: a flush command means every node should drop its
    /// cached TOD for the addressed universe and rediscover from scratch.
    /// Either way, a TodControl is always followed by acting as a
    /// TodRequest for the addressed universe (§4.4.2).
    fn handle_tod_control(&self, payload: &[u8]) {
        let Ok(ctrl) = packet::decode_tod_control(payload) else {
            return;
        };
        if ctrl.command == TOD_FLUSH_COMMAND {
            let address = UniverseAddress::from_sub_uni(ctrl.net, ctrl.address);
            let mut inner = self.inner.lock();
            for port in inner.ports.iter_mut() {
                if port.output.address == Some(address) {
                    port.output.clear_tod();
                }
            }
        }
        self.announce_tod(ctrl.net, vec![ctrl.address]);
    }

    /// `SendTod`: for every output port on `net` whose sub-universe appears
    /// in `addresses` and that has a UID set (or discovery in progress) to
    /// report, broadcasts an `ArtTodData` with its current known UIDs.
    fn announce_tod(&self, net: u8, addresses: Vec<u8>) {
        let replies: Vec<TodData> = {
            let inner = self.inner.lock();
            inner
                .ports
                .iter()
                .filter_map(|port| {
                    let addr = port.output.address?;
                    if addr.net != net || !addresses.contains(&addr.sub_uni()) {
                        return None;
                    }
                    let uids = port.output.known_uids();
                    if uids.is_empty() && port.discovery.is_none() {
                        return None;
                    }
                    Some(TodData {
                        rdm_ver: 1,
                        port: 1,
                        net: addr.net,
                        address: addr.sub_uni(),
                        uids,
                    })
                })
                .collect()
        };
        if replies.is_empty() {
            return;
        }
        let node = self.clone();
        tokio::spawn(async move {
            for reply in replies {
                if let Err(e) = node.broadcast(&packet::encode_tod_data(&reply)).await {
                    warn!(error = %e, "failed to answer ArtTodRequest/ArtTodControl with ArtTodData");
                }
            }
        });
    }

    /// `HandleIpProgram` (§10.7): config-only. This node replies with its
    /// current network configuration and never applies a remote program
    /// command.
    fn handle_ip_prog(&self, _payload: &[u8], _from: Ipv4Addr) {
        let node = self.clone();
        tokio::spawn(async move {
            let ip = node.inner.lock().config.bind_address;
            let reply = IpProgReply {
                ip: ip.octets(),
                sm: Ipv4Addr::new(255, 255, 255, 0).octets(),
                port: ARTNET_PORT,
            };
            if let Err(e) = node.broadcast(&packet::encode_ip_prog_reply(&reply)).await {
                warn!(error = %e, "failed to answer ArtIpProg");
            }
        });
    }

    fn handle_poll(&self, _from: Ipv4Addr) {
        let node = self.clone();
        tokio::spawn(async move {
            if let Err(e) = node.reply_to_poll().await {
                warn!(error = %e, "failed to answer ArtPoll");
            }
        });
    }

    async fn reply_to_poll(&self) -> Result<()> {
        let (short_name, long_name, net_switch, sub_switch) = {
            let inner = self.inner.lock();
            (
                inner.config.short_name.clone(),
                inner.config.long_name.clone(),
                inner.net_address,
                inner.subnet_address,
            )
        };
        let reply = PollReply {
            ip: [0, 0, 0, 0],
            port: ARTNET_PORT,
            net_switch,
            sub_switch,
            short_name,
            long_name,
            num_ports: ARTNET_MAX_PORTS as u16,
            good_input: [0; 4],
            good_output: [0; 4],
            sw_in: [0; 4],
            sw_out: [0; 4],
            mac: [0; 6],
        };
        self.broadcast(&packet::encode_poll_reply(&reply)).await
    }

    fn handle_poll_reply(&self, payload: &[u8], from: Ipv4Addr) {
        let Ok(reply) = packet::decode_poll_reply(payload) else {
            return;
        };
        let now = Timestamp::now();
        let mut inner = self.inner.lock();
        for port in inner.ports.iter_mut() {
            if port.output.enabled {
                port.output.note_subscriber(from, now);
            }
        }
        debug!(node = reply.short_name, %from, "ArtPollReply recorded");
    }

    fn handle_dmx(&self, payload: &[u8], from: Ipv4Addr) {
        let Ok(dmx) = packet::decode_dmx(payload) else {
            return;
        };
        let address = UniverseAddress::from_sub_uni(dmx.net, dmx.sub_uni);
        let mut inner = self.inner.lock();
        for (idx, port) in inner.ports.iter().enumerate() {
            if !port.input.enabled {
                continue;
            }
            if port.input.address != Some(address) {
                continue;
            }
            let _ = self.events.send(ArtNetEvent::Dmx {
                port_id: idx as u8,
                address,
                source: from,
                data: dmx.data.clone(),
            });
        }
        drop(inner);
    }

    fn handle_tod_data(&self, payload: &[u8], from: Ipv4Addr) {
        let Ok(data) = packet::decode_tod_data(payload) else {
            return;
        };
        let address = UniverseAddress::from_sub_uni(data.net, data.address);
        let mut inner = self.inner.lock();
        for port in inner.ports.iter_mut() {
            let Some(addr) = port.output.address else { continue };
            if addr != address {
                continue;
            }
            port.output.note_tod(&data.uids, from);
            if let Some(discovery) = &mut port.discovery {
                discovery.collected.extend(data.uids.iter().copied());
                discovery.expected.remove(&from);
                if discovery.expected.is_empty() {
                    let discovery = port.discovery.take().unwrap();
                    let seen: std::collections::HashSet<Uid> = discovery.collected.iter().copied().collect();
                    port.output.age_discovery_round(&seen);
                    (discovery.callback)(discovery.collected);
                }
            }
        }
    }

    fn handle_rdm(&self, payload: &[u8]) {
        let Ok(rdm) = packet::decode_rdm(payload) else {
            return;
        };
        let address = UniverseAddress::from_sub_uni(rdm.net, rdm.address);
        let mut inner = self.inner.lock();
        for (idx, port) in inner.ports.iter_mut().enumerate() {
            let Some(addr) = port.output.address else { continue };
            if addr != address {
                continue;
            }
            if let Ok(response) = RdmResponse::decode(&rdm.data) {
                if let Some(pending) = port.pending_rdm.take() {
                    (pending.callback)(RdmOutcome::Response(response));
                }
            } else if let Ok(request) = RdmRequest::decode(&rdm.data) {
                if !request.command_class.is_response() {
                    let _ = self.events.send(ArtNetEvent::RdmRequestReceived {
                        port_id: idx as u8,
                        request,
                    });
                }
            }
        }
    }

    /// Allocates the next outgoing RDM transaction number for `port_id`,
    /// wrapping at `u8::MAX` as the wire format requires.
    pub fn next_rdm_transaction(&self, _port_id: u8) -> u8 {
        let mut inner = self.inner.lock();
        Self::next_transaction(&mut inner)
    }

    pub fn known_uids(&self, port_id: u8) -> Result<Vec<Uid>> {
        let mut inner = self.inner.lock();
        Ok(Self::port_mut(&mut inner, port_id)?.output.known_uids())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn bind_local() -> ArtNetNode {
        let mut config = NodeConfig::default();
        config.bind_address = Ipv4Addr::LOCALHOST;
        let (node, _rx) = ArtNetNode::bind(config).await.unwrap();
        node
    }

    #[tokio::test]
    async fn configuring_a_disabled_port_clears_its_address() {
        let node = bind_local().await;
        node.set_output_port_universe(0, 0, 3).unwrap();
        node.set_output_port_universe(0, 0, ARTNET_DISABLE_PORT).unwrap();
        let inner = node.inner.lock();
        assert!(!inner.ports[0].output.enabled);
    }

    #[tokio::test]
    async fn out_of_range_port_id_is_rejected() {
        let node = bind_local().await;
        assert!(node.set_output_port_universe(9, 0, 0).is_err());
    }

    #[tokio::test]
    async fn send_dmx_increments_the_per_port_sequence_number() {
        let node = bind_local().await;
        node.set_output_port_universe(0, 0, 0).unwrap();
        node.send_dmx(0, &DmxBuffer::from_slice(&[1, 2, 3])).await.unwrap();
        node.send_dmx(0, &DmxBuffer::from_slice(&[1, 2, 3])).await.unwrap();
        let inner = node.inner.lock();
        assert_eq!(inner.ports[0].output.current_sequence(), 2);
    }

    #[tokio::test]
    async fn net_and_subnet_address_round_trip() {
        let node = bind_local().await;
        node.set_net_address(3);
        node.set_subnet_address(9);
        assert_eq!(node.net_address(), 3);
        assert_eq!(node.subnet_address(), 9);
    }

    #[tokio::test]
    async fn tod_control_flush_clears_tracked_uids_for_matching_address() {
        let node = bind_local().await;
        node.set_output_port_universe(0, 0, 3).unwrap();
        {
            let mut inner = node.inner.lock();
            inner.ports[0]
                .output
                .note_tod(&[Uid::new(0x4850, 1)], Ipv4Addr::new(10, 0, 0, 1));
        }
        let ctrl_bytes = packet::encode_tod_control(&TodControl {
            net: 0,
            command: TOD_FLUSH_COMMAND,
            address: 3,
        });
        let (_op, payload) = packet::parse_header(&ctrl_bytes).unwrap();
        node.handle_tod_control(payload);
        let inner = node.inner.lock();
        assert!(inner.ports[0].output.known_uids().is_empty());
    }

    #[tokio::test]
    async fn second_concurrent_rdm_request_is_rejected() {
        let node = bind_local().await;
        node.set_output_port_universe(0, 0, 0).unwrap();
        let dest_uid = Uid::new(0x4850, 2);
        {
            let mut inner = node.inner.lock();
            inner.ports[0].output.note_tod(&[dest_uid], Ipv4Addr::new(10, 0, 0, 1));
        }
        let request = RdmRequest {
            transaction_number: 0,
            port_id: 0,
            source_uid: Uid::new(0x4850, 1),
            dest_uid,
            sub_device: 0,
            command_class: CommandClass::GetCommand,
            param_id: 0x0060,
            param_data: vec![],
        };
        node.send_rdm_request(0, request.clone(), Box::new(|_| {})).await.unwrap();
        let second = node.send_rdm_request(0, request, Box::new(|_| {})).await;
        assert!(second.is_err());
    }
}
