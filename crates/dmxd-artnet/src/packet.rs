//! Art-Net 4 wire codec (§6): every packet is `ARTNET_ID`, a little-endian
//! opcode, a big-endian protocol version, then an opcode-specific payload.
//! Multi-byte DMX-count fields are big-endian; port/universe addresses are
//! single bytes.

use bytes::{Buf, BufMut, BytesMut};
use dmxd_core::DmxBuffer;

use crate::constants::{OpCode, ARTNET_ID, ARTNET_VERSION};
use crate::error::{ArtNetError, Result};

fn put_header(buf: &mut BytesMut, op: OpCode) {
    buf.put_slice(ARTNET_ID);
    buf.put_u16_le(op.as_u16());
    buf.put_u16(ARTNET_VERSION);
}

fn put_padded_str(buf: &mut BytesMut, s: &str, width: usize) {
    let bytes = s.as_bytes();
    let len = bytes.len().min(width);
    buf.put_slice(&bytes[..len]);
    buf.put_bytes(0, width - len);
}

fn take_padded_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Parsed packet header: the opcode plus the remainder of the datagram.
pub fn parse_header(datagram: &[u8]) -> Result<(OpCode, &[u8])> {
    if datagram.len() < 10 {
        return Err(ArtNetError::Decode("packet shorter than the fixed header".into()));
    }
    if &datagram[0..8] != ARTNET_ID {
        return Err(ArtNetError::Decode("bad Art-Net magic".into()));
    }
    let op = u16::from_le_bytes([datagram[8], datagram[9]]);
    let op = OpCode::from_u16(op).ok_or_else(|| ArtNetError::Decode(format!("unsupported opcode {op:#x}")))?;
    // Poll/PollReply carry no protocol version field worth gating on for
    // some legacy senders; every opcode this node handles does, so we
    // always require it.
    if datagram.len() < 12 {
        return Err(ArtNetError::Decode("packet missing protocol version".into()));
    }
    let version = u16::from_be_bytes([datagram[10], datagram[11]]);
    if version < ARTNET_VERSION {
        return Err(ArtNetError::Decode(format!("protocol version {version} below {ARTNET_VERSION}")));
    }
    Ok((op, &datagram[12..]))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poll {
    pub flags: u8,
    pub diag_priority: u8,
}

pub fn encode_poll(poll: &Poll) -> BytesMut {
    let mut buf = BytesMut::with_capacity(14);
    put_header(&mut buf, OpCode::Poll);
    buf.put_u8(poll.flags);
    buf.put_u8(poll.diag_priority);
    buf
}

pub fn decode_poll(payload: &[u8]) -> Result<Poll> {
    if payload.len() < 2 {
        return Err(ArtNetError::Decode("ArtPoll payload too short".into()));
    }
    Ok(Poll {
        flags: payload[0],
        diag_priority: payload[1],
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReply {
    pub ip: [u8; 4],
    pub port: u16,
    pub net_switch: u8,
    pub sub_switch: u8,
    pub short_name: String,
    pub long_name: String,
    pub num_ports: u16,
    pub good_input: [u8; 4],
    pub good_output: [u8; 4],
    pub sw_in: [u8; 4],
    pub sw_out: [u8; 4],
    pub mac: [u8; 6],
}

const POLL_REPLY_LEN: usize = 207;

pub fn encode_poll_reply(reply: &PollReply) -> BytesMut {
    let mut buf = BytesMut::with_capacity(12 + POLL_REPLY_LEN);
    put_header(&mut buf, OpCode::PollReply);
    buf.put_slice(&reply.ip);
    buf.put_u16_le(reply.port);
    buf.put_u16(0); // version info, unused
    buf.put_u8(reply.net_switch);
    buf.put_u8(reply.sub_switch);
    buf.put_u16(0x0431); // OEM code, matches the original node's placeholder
    buf.put_u8(0); // UBEA version
    buf.put_u8(0); // status1
    buf.put_u16(0x4850); // ESTA manufacturer code ("HP")
    put_padded_str(&mut buf, &reply.short_name, 18);
    put_padded_str(&mut buf, &reply.long_name, 64);
    put_padded_str(&mut buf, "", 64); // node report
    buf.put_u16(reply.num_ports);
    buf.put_slice(&[1, 0, 0, 0]); // port types: output port 0 only, by default
    buf.put_slice(&reply.good_input);
    buf.put_slice(&reply.good_output);
    buf.put_slice(&reply.sw_in);
    buf.put_slice(&reply.sw_out);
    buf.put_u8(0); // sw_video
    buf.put_u8(0); // sw_macro
    buf.put_u8(0); // sw_remote
    buf.put_bytes(0, 3); // spare
    buf.put_u8(0); // style: StNode
    buf.put_slice(&reply.mac);
    buf.put_slice(&reply.ip); // bind ip, same as primary
    buf.put_u8(0); // bind index
    buf.put_u8(0); // status2
    buf.put_bytes(0, 26); // filler to pad to the documented 239-byte body
    buf
}

pub fn decode_poll_reply(payload: &[u8]) -> Result<PollReply> {
    if payload.len() < 108 {
        return Err(ArtNetError::Decode("ArtPollReply payload too short".into()));
    }
    let mut ip = [0u8; 4];
    ip.copy_from_slice(&payload[0..4]);
    let port = u16::from_le_bytes([payload[4], payload[5]]);
    let net_switch = payload[8];
    let sub_switch = payload[9];
    let short_name = take_padded_str(&payload[14..32]);
    let long_name = take_padded_str(&payload[32..96]);
    let num_ports = u16::from_be_bytes([payload[160], payload[161]]);
    let mut good_input = [0u8; 4];
    good_input.copy_from_slice(&payload[166..170]);
    let mut good_output = [0u8; 4];
    good_output.copy_from_slice(&payload[170..174]);
    let mut sw_in = [0u8; 4];
    sw_in.copy_from_slice(&payload[174..178]);
    let mut sw_out = [0u8; 4];
    sw_out.copy_from_slice(&payload[178..182]);
    let mut mac = [0u8; 6];
    if payload.len() >= 195 {
        mac.copy_from_slice(&payload[189..195]);
    }
    Ok(PollReply {
        ip,
        port,
        net_switch,
        sub_switch,
        short_name,
        long_name,
        num_ports,
        good_input,
        good_output,
        sw_in,
        sw_out,
        mac,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dmx {
    pub sequence: u8,
    pub physical: u8,
    pub sub_uni: u8,
    pub net: u8,
    pub data: DmxBuffer,
}

pub fn encode_dmx(dmx: &Dmx) -> BytesMut {
    let mut buf = BytesMut::with_capacity(18 + dmx.data.len());
    put_header(&mut buf, OpCode::Dmx);
    buf.put_u8(dmx.sequence);
    buf.put_u8(dmx.physical);
    buf.put_u8(dmx.sub_uni);
    buf.put_u8(dmx.net);
    buf.put_u16(dmx.data.len() as u16);
    buf.put_slice(dmx.data.get());
    buf
}

pub fn decode_dmx(payload: &[u8]) -> Result<Dmx> {
    if payload.len() < 6 {
        return Err(ArtNetError::Decode("ArtDmx payload too short".into()));
    }
    let sequence = payload[0];
    let physical = payload[1];
    let sub_uni = payload[2];
    let net = payload[3];
    let length = u16::from_be_bytes([payload[4], payload[5]]) as usize;
    if payload.len() < 6 + length {
        return Err(ArtNetError::Decode("ArtDmx data shorter than declared length".into()));
    }
    Ok(Dmx {
        sequence,
        physical,
        sub_uni,
        net,
        data: DmxBuffer::from_slice(&payload[6..6 + length]),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TodRequest {
    pub net: u8,
    pub addresses: [u8; 32],
    pub address_count: u8,
}

pub fn encode_tod_request(req: &TodRequest) -> BytesMut {
    let mut buf = BytesMut::with_capacity(12 + 43);
    put_header(&mut buf, OpCode::TodRequest);
    buf.put_bytes(0, 2); // filler
    buf.put_bytes(0, 8); // spare
    buf.put_u8(req.net);
    buf.put_u8(0); // command
    buf.put_u8(req.address_count);
    buf.put_slice(&req.addresses[..req.address_count as usize]);
    buf
}

pub fn decode_tod_request(payload: &[u8]) -> Result<TodRequest> {
    if payload.len() < 13 {
        return Err(ArtNetError::Decode("ArtTodRequest payload too short".into()));
    }
    let net = payload[10];
    let address_count = payload[12].min(32);
    let mut addresses = [0u8; 32];
    let available = (payload.len() - 13).min(address_count as usize);
    addresses[..available].copy_from_slice(&payload[13..13 + available]);
    Ok(TodRequest {
        net,
        addresses,
        address_count,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodData {
    pub rdm_ver: u8,
    pub port: u8,
    pub net: u8,
    pub address: u8,
    pub uids: Vec<crate::uid::Uid>,
}

pub fn encode_tod_data(data: &TodData) -> BytesMut {
    let mut buf = BytesMut::with_capacity(24 + data.uids.len() * 6);
    put_header(&mut buf, OpCode::TodData);
    buf.put_u8(data.rdm_ver);
    buf.put_u8(data.port);
    buf.put_bytes(0, 6); // spare
    buf.put_u8(data.net);
    buf.put_u8(0); // command response
    buf.put_u8(data.address);
    buf.put_u16(data.uids.len() as u16);
    buf.put_u8(1); // block count
    buf.put_u8(data.uids.len() as u8);
    for uid in &data.uids {
        buf.put_slice(&uid.to_bytes());
    }
    buf
}

pub fn decode_tod_data(payload: &[u8]) -> Result<TodData> {
    if payload.len() < 15 {
        return Err(ArtNetError::Decode("ArtTodData payload too short".into()));
    }
    let rdm_ver = payload[0];
    let port = payload[1];
    let net = payload[8];
    let address = payload[10];
    let uid_count = payload[14] as usize;
    let mut uids = Vec::with_capacity(uid_count);
    let mut off = 15;
    for _ in 0..uid_count {
        if payload.len() < off + 6 {
            break;
        }
        if let Some(uid) = crate::uid::Uid::from_bytes(&payload[off..off + 6]) {
            uids.push(uid);
        }
        off += 6;
    }
    Ok(TodData {
        rdm_ver,
        port,
        net,
        address,
        uids,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TodControl {
    pub net: u8,
    pub command: u8,
    pub address: u8,
}

pub fn encode_tod_control(ctrl: &TodControl) -> BytesMut {
    let mut buf = BytesMut::with_capacity(23);
    put_header(&mut buf, OpCode::TodControl);
    buf.put_bytes(0, 2);
    buf.put_bytes(0, 8);
    buf.put_u8(ctrl.net);
    buf.put_u8(ctrl.command);
    buf.put_u8(ctrl.address);
    buf
}

pub fn decode_tod_control(payload: &[u8]) -> Result<TodControl> {
    if payload.len() < 13 {
        return Err(ArtNetError::Decode("ArtTodControl payload too short".into()));
    }
    Ok(TodControl {
        net: payload[10],
        command: payload[11],
        address: payload[12],
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdm {
    pub net: u8,
    pub address: u8,
    pub data: Vec<u8>,
}

pub fn encode_rdm(rdm: &Rdm) -> BytesMut {
    let mut buf = BytesMut::with_capacity(22 + rdm.data.len());
    put_header(&mut buf, OpCode::Rdm);
    buf.put_u8(0x01); // RdmVer
    buf.put_bytes(0, 8); // filler + spare
    buf.put_u8(rdm.net);
    buf.put_u8(0); // command
    buf.put_u8(rdm.address);
    buf.put_slice(&rdm.data);
    buf
}

pub fn decode_rdm(payload: &[u8]) -> Result<Rdm> {
    if payload.len() < 11 {
        return Err(ArtNetError::Decode("ArtRdm payload too short".into()));
    }
    Ok(Rdm {
        net: payload[9],
        address: payload[10],
        data: payload[11..].to_vec(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpProg {
    pub command: u8,
    pub prog_ip: [u8; 4],
    pub prog_sm: [u8; 4],
    pub prog_port: u16,
}

pub fn decode_ip_prog(payload: &[u8]) -> Result<IpProg> {
    if payload.len() < 16 {
        return Err(ArtNetError::Decode("ArtIpProg payload too short".into()));
    }
    let command = payload[4];
    let mut prog_ip = [0u8; 4];
    prog_ip.copy_from_slice(&payload[8..12]);
    let mut prog_sm = [0u8; 4];
    prog_sm.copy_from_slice(&payload[12..16]);
    Ok(IpProg {
        command,
        prog_ip,
        prog_sm,
        prog_port: 0,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpProgReply {
    pub ip: [u8; 4],
    pub sm: [u8; 4],
    pub port: u16,
}

pub fn encode_ip_prog_reply(reply: &IpProgReply) -> BytesMut {
    let mut buf = BytesMut::with_capacity(12 + 34);
    put_header(&mut buf, OpCode::IpProgReply);
    buf.put_bytes(0, 4); // filler
    buf.put_slice(&reply.ip);
    buf.put_slice(&reply.sm);
    buf.put_u16_le(reply.port);
    buf.put_u8(0); // status
    buf.put_bytes(0, 7); // spare
    buf
}

/// `ArtTimeCode` (§10.7): four BCD-style bytes, frames/seconds/minutes/hours.
pub fn encode_timecode(frame: [u8; 4]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(19);
    put_header(&mut buf, OpCode::TimeCode);
    buf.put_bytes(0, 2); // filler
    buf.put_slice(&frame);
    buf.put_u8(0); // frame type: film
    buf
}

pub fn decoded_remaining(mut buf: BytesMut) -> Vec<u8> {
    buf.split_off(0).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dmx_round_trips() {
        let dmx = Dmx {
            sequence: 5,
            physical: 0,
            sub_uni: 0x12,
            net: 0,
            data: DmxBuffer::from_slice(&[1, 2, 3, 4]),
        };
        let bytes = encode_dmx(&dmx);
        let (op, payload) = parse_header(&bytes).unwrap();
        assert_eq!(op, OpCode::Dmx);
        let decoded = decode_dmx(payload).unwrap();
        assert_eq!(decoded, dmx);
    }

    #[test]
    fn tod_data_round_trips_uids() {
        let data = TodData {
            rdm_ver: 1,
            port: 0,
            net: 0,
            address: 3,
            uids: vec![crate::uid::Uid::new(0x4850, 1), crate::uid::Uid::new(0x4850, 2)],
        };
        let bytes = encode_tod_data(&data);
        let (op, payload) = parse_header(&bytes).unwrap();
        assert_eq!(op, OpCode::TodData);
        let decoded = decode_tod_data(payload).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn rejects_packets_with_bad_magic() {
        let mut bytes = encode_poll(&Poll {
            flags: 0,
            diag_priority: 0,
        });
        bytes[0] = b'X';
        assert!(parse_header(&bytes).is_err());
    }

    #[test]
    fn rejects_old_protocol_versions() {
        let mut bytes = encode_poll(&Poll {
            flags: 0,
            diag_priority: 0,
        });
        bytes[10] = 0;
        bytes[11] = 13;
        assert!(parse_header(&bytes).is_err());
    }
}
