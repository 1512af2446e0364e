//! A minimal ANSI E1.20 RDM command encoding: enough to round-trip the
//! fields `ArtNetNode` actually inspects (source/dest UID, command class,
//! parameter id, parameter data) inside an `ArtRdm` packet's payload. Full
//! PID-table semantics are a client-side concern outside this core.

use crate::error::{ArtNetError, Result};
use crate::uid::Uid;

const RDM_START_CODE: u8 = 0xcc;
const RDM_SUB_START_CODE: u8 = 0x01;
/// Fixed header bytes before the variable-length parameter data, plus the
/// trailing 2-byte checksum.
const FIXED_OVERHEAD: usize = 24 + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    DiscoveryCommand,
    DiscoveryCommandResponse,
    GetCommand,
    GetCommandResponse,
    SetCommand,
    SetCommandResponse,
}

impl CommandClass {
    fn to_u8(self) -> u8 {
        match self {
            CommandClass::DiscoveryCommand => 0x10,
            CommandClass::DiscoveryCommandResponse => 0x11,
            CommandClass::GetCommand => 0x20,
            CommandClass::GetCommandResponse => 0x21,
            CommandClass::SetCommand => 0x30,
            CommandClass::SetCommandResponse => 0x31,
        }
    }

    fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            0x10 => CommandClass::DiscoveryCommand,
            0x11 => CommandClass::DiscoveryCommandResponse,
            0x20 => CommandClass::GetCommand,
            0x21 => CommandClass::GetCommandResponse,
            0x30 => CommandClass::SetCommand,
            0x31 => CommandClass::SetCommandResponse,
            other => return Err(ArtNetError::Decode(format!("unknown RDM command class {other:#x}"))),
        })
    }

    pub fn is_response(self) -> bool {
        matches!(
            self,
            CommandClass::DiscoveryCommandResponse
                | CommandClass::GetCommandResponse
                | CommandClass::SetCommandResponse
        )
    }
}

fn checksum(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdmRequest {
    pub transaction_number: u8,
    pub port_id: u8,
    pub source_uid: Uid,
    pub dest_uid: Uid,
    pub sub_device: u16,
    pub command_class: CommandClass,
    pub param_id: u16,
    pub param_data: Vec<u8>,
}

impl RdmRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FIXED_OVERHEAD + self.param_data.len());
        let message_length = (FIXED_OVERHEAD + self.param_data.len() - 2) as u8;
        out.push(RDM_START_CODE);
        out.push(RDM_SUB_START_CODE);
        out.push(message_length);
        out.extend_from_slice(&self.dest_uid.to_bytes());
        out.extend_from_slice(&self.source_uid.to_bytes());
        out.push(self.transaction_number);
        out.push(self.port_id);
        out.push(0); // message count, always 0 on a request
        out.extend_from_slice(&self.sub_device.to_be_bytes());
        out.push(self.command_class.to_u8());
        out.extend_from_slice(&self.param_id.to_be_bytes());
        out.push(self.param_data.len() as u8);
        out.extend_from_slice(&self.param_data);
        let sum = checksum(&out);
        out.extend_from_slice(&sum.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FIXED_OVERHEAD {
            return Err(ArtNetError::Decode("RDM frame too short".into()));
        }
        if bytes[0] != RDM_START_CODE || bytes[1] != RDM_SUB_START_CODE {
            return Err(ArtNetError::Decode("bad RDM start code".into()));
        }
        let dest_uid = Uid::from_bytes(&bytes[3..9]).unwrap();
        let source_uid = Uid::from_bytes(&bytes[9..15]).unwrap();
        let transaction_number = bytes[15];
        let port_id = bytes[16];
        let sub_device = u16::from_be_bytes([bytes[18], bytes[19]]);
        let command_class = CommandClass::from_u8(bytes[20])?;
        let param_id = u16::from_be_bytes([bytes[21], bytes[22]]);
        let param_len = bytes[23] as usize;
        let data_start = 24;
        if bytes.len() < data_start + param_len + 2 {
            return Err(ArtNetError::Decode("RDM parameter data truncated".into()));
        }
        let param_data = bytes[data_start..data_start + param_len].to_vec();
        Ok(Self {
            transaction_number,
            port_id,
            source_uid,
            dest_uid,
            sub_device,
            command_class,
            param_id,
            param_data,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdmResponse {
    pub transaction_number: u8,
    pub source_uid: Uid,
    pub dest_uid: Uid,
    pub command_class: CommandClass,
    pub param_id: u16,
    pub param_data: Vec<u8>,
}

impl RdmResponse {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let req = RdmRequest::decode(bytes)?;
        if !req.command_class.is_response() {
            return Err(ArtNetError::Decode("expected an RDM response command class".into()));
        }
        Ok(Self {
            transaction_number: req.transaction_number,
            source_uid: req.source_uid,
            dest_uid: req.dest_uid,
            command_class: req.command_class,
            param_id: req.param_id,
            param_data: req.param_data,
        })
    }
}

/// Outcome handed to an RDM completion callback. Mirrors §7's Transient
/// error class plus the happy path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RdmOutcome {
    Response(RdmResponse),
    Timeout,
    UnknownUid,
    SendFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RdmRequest {
        RdmRequest {
            transaction_number: 7,
            port_id: 1,
            source_uid: Uid::new(0x4850, 1),
            dest_uid: Uid::new(0x4850, 2),
            sub_device: 0,
            command_class: CommandClass::GetCommand,
            param_id: 0x0060, // IDENTIFY_DEVICE
            param_data: vec![],
        }
    }

    #[test]
    fn request_round_trips_through_wire_bytes() {
        let req = sample();
        let decoded = RdmRequest::decode(&req.encode()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn response_rejects_request_command_classes() {
        let req = sample();
        assert!(RdmResponse::decode(&req.encode()).is_err());
    }
}
