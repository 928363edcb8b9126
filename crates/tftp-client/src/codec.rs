//! Wire-format encoding and decoding for the five RFC 1350 TFTP opcodes.
//!
//! Pure byte-layout functions: no I/O, no state. All multi-byte integers are
//! big-endian, matching the `NET_UTIL_VAL_SET_NET_16`/`GET_NET_16` calls of
//! the reference client this module replaces.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, TftpClientError};
use crate::{ErrorCode, Opcode, TransferMode};

/// Maximum DATA payload per RFC 1350 (no block-size option negotiation).
pub const MAX_DATA_LEN: usize = 512;

/// `u16 opcode || filename || 0x00 || mode || 0x00`
pub fn encode_req(opcode: Opcode, filename: &str, mode: &TransferMode) -> Result<BytesMut> {
    if !matches!(opcode, Opcode::Rrq | Opcode::Wrq) {
        return Err(TftpClientError::InvalidOpcode);
    }
    if filename.is_empty() {
        return Err(TftpClientError::NullArg("filename"));
    }
    let mode_str = mode.as_str().ok_or(TftpClientError::InvalidMode)?;

    let mut pkt = BytesMut::with_capacity(2 + filename.len() + 1 + mode_str.len() + 1);
    pkt.put_u16(opcode as u16);
    pkt.put(filename.as_bytes());
    pkt.put_u8(0);
    pkt.put(mode_str.as_bytes());
    pkt.put_u8(0);
    Ok(pkt)
}

/// `u16 opcode(DATA) || u16 block || payload`
pub fn encode_data(block: u16, payload: &[u8]) -> Result<BytesMut> {
    if payload.len() > MAX_DATA_LEN {
        return Err(TftpClientError::CfgInvalid(format!(
            "data payload of {} bytes exceeds the {}-byte block size",
            payload.len(),
            MAX_DATA_LEN
        )));
    }
    let mut pkt = BytesMut::with_capacity(4 + payload.len());
    pkt.put_u16(Opcode::Data as u16);
    pkt.put_u16(block);
    pkt.put(payload);
    Ok(pkt)
}

/// `u16 opcode(ACK) || u16 block`
pub fn encode_ack(block: u16) -> BytesMut {
    let mut pkt = BytesMut::with_capacity(4);
    pkt.put_u16(Opcode::Ack as u16);
    pkt.put_u16(block);
    pkt
}

/// `u16 opcode(ERR) || u16 errcode || message || 0x00`
pub fn encode_err(code: ErrorCode, message: Option<&str>) -> BytesMut {
    let message = message.unwrap_or("");
    let mut pkt = BytesMut::with_capacity(4 + message.len() + 1);
    pkt.put_u16(Opcode::Error as u16);
    pkt.put_u16(code as u16);
    pkt.put(message.as_bytes());
    pkt.put_u8(0);
    pkt
}

/// Reads the first two octets as the packet's opcode.
pub fn decode_opcode(bytes: &[u8]) -> Result<u16> {
    if bytes.len() < 2 {
        return Err(TftpClientError::Rx("packet shorter than 2 bytes".into()));
    }
    Ok((&bytes[0..2]).get_u16())
}

/// Reads the block number at offset 2 (valid for DATA and ACK packets).
pub fn decode_block(bytes: &[u8]) -> Result<u16> {
    if bytes.len() < 4 {
        return Err(TftpClientError::Rx("packet shorter than 4 bytes".into()));
    }
    Ok((&bytes[2..4]).get_u16())
}

/// Returns the DATA payload, i.e. everything from offset 4 to the end.
pub fn decode_data_payload(bytes: &[u8]) -> Result<&[u8]> {
    if bytes.len() < 4 {
        return Err(TftpClientError::Rx("packet shorter than 4 bytes".into()));
    }
    Ok(&bytes[4..])
}

/// Reads the error code at offset 2 and the NUL-terminated message following it
/// (lossily decoded, mirroring the reference client's treatment of ERR text).
pub fn decode_err_payload(bytes: &[u8]) -> Result<(u16, String)> {
    if bytes.len() < 4 {
        return Err(TftpClientError::Rx("packet shorter than 4 bytes".into()));
    }
    let code = (&bytes[2..4]).get_u16();
    let msg_bytes = &bytes[4..];
    let end = msg_bytes.iter().position(|&b| b == 0).unwrap_or(msg_bytes.len());
    Ok((code, String::from_utf8_lossy(&msg_bytes[..end]).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_req_rejects_mail_mode() {
        let err = encode_req(Opcode::Rrq, "f", &TransferMode::Mail).unwrap_err();
        assert!(matches!(err, TftpClientError::InvalidMode));
    }

    #[test]
    fn encode_req_rejects_non_request_opcode() {
        let err = encode_req(Opcode::Data, "f", &TransferMode::Octet).unwrap_err();
        assert!(matches!(err, TftpClientError::InvalidOpcode));
    }

    #[test]
    fn encode_req_rejects_empty_filename() {
        let err = encode_req(Opcode::Rrq, "", &TransferMode::Octet).unwrap_err();
        assert!(matches!(err, TftpClientError::NullArg(_)));
    }

    #[test]
    fn encode_req_produces_exact_length() {
        let pkt = encode_req(Opcode::Rrq, "boot.img", &TransferMode::Octet).unwrap();
        assert_eq!(pkt.len(), 4 + "boot.img".len() + "octet".len());
        assert_eq!(decode_opcode(&pkt).unwrap(), Opcode::Rrq as u16);
    }

    #[test]
    fn encode_data_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_DATA_LEN + 1];
        let err = encode_data(1, &payload).unwrap_err();
        assert!(matches!(err, TftpClientError::CfgInvalid(_)));
    }

    #[test]
    fn round_trips_data_packet() {
        let payload = b"hello world";
        let pkt = encode_data(42, payload).unwrap();
        assert_eq!(decode_opcode(&pkt).unwrap(), Opcode::Data as u16);
        assert_eq!(decode_block(&pkt).unwrap(), 42);
        assert_eq!(decode_data_payload(&pkt).unwrap(), payload);
    }

    #[test]
    fn round_trips_ack_packet() {
        let pkt = encode_ack(7);
        assert_eq!(decode_opcode(&pkt).unwrap(), Opcode::Ack as u16);
        assert_eq!(decode_block(&pkt).unwrap(), 7);
    }

    #[test]
    fn encode_err_without_message_emits_single_nul() {
        let pkt = encode_err(ErrorCode::NotDefined, None);
        assert_eq!(&pkt[4..], &[0u8]);
    }

    #[test]
    fn round_trips_err_packet_with_message() {
        let pkt = encode_err(ErrorCode::AccessViolation, Some("nope"));
        let (code, msg) = decode_err_payload(&pkt).unwrap();
        assert_eq!(code, ErrorCode::AccessViolation as u16);
        assert_eq!(msg, "nope");
    }

    #[test]
    fn decode_rejects_short_packets() {
        assert!(decode_opcode(&[0u8]).is_err());
        assert!(decode_block(&[0, 4, 0]).is_err());
        assert!(decode_data_payload(&[0, 3, 0]).is_err());
    }
}
