//! The Transfer Engine: the RRQ-GET / WRQ-PUT state machine.
//!
//! Drives the DATA/ACK lockstep exchange over a [`Transport`] to completion,
//! timeout exhaustion, or a terminal protocol error. Only two conditions are
//! recovered locally: a receive timeout while the retry budget remains, and a
//! block-number mismatch (the anti-Sorcerer's-Apprentice rule) — every other
//! condition tears the transfer down.

use std::net::IpAddr;
use std::time::Duration;

use bytes::BytesMut;
use tracing::{debug, info, warn};

use crate::audit::{self, AuditEvent};
use crate::codec;
use crate::error::{Result, TftpClientError};
use crate::fileio::FileHandle;
use crate::transport::Transport;
use crate::{ErrorCode, Opcode, TransferMode, DEFAULT_BLOCK_SIZE, MAX_TX_RETRY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Get,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Get { expected_block: u16 },
    Put { last_sent_block: u16 },
    PutLast { last_sent_block: u16 },
    Done,
}

/// Runs one transfer to completion. `server_ip` is the resolved address the
/// request was sent to; every inbound datagram's source IP is checked
/// against it regardless of whether the TID has latched yet.
#[allow(clippy::too_many_arguments)]
pub async fn run_until_complete(
    transport: &mut Transport,
    file: &mut FileHandle,
    direction: Direction,
    remote_filename: &str,
    mode: TransferMode,
    server_ip: IpAddr,
    inactivity_timeout: Duration,
    audit_enabled: bool,
) -> Result<u64> {
    let request_opcode = match direction {
        Direction::Get => Opcode::Rrq,
        Direction::Put => Opcode::Wrq,
    };
    let request = codec::encode_req(request_opcode, remote_filename, &mode)?;
    transport.send(&request).await?;

    audit::emit(
        audit_enabled,
        &AuditEvent::TransferStarted {
            direction: if direction == Direction::Get { "get" } else { "put" },
            remote_filename: remote_filename.to_string(),
            peer: transport.pinned_addr(),
        },
    );

    let mut state = match direction {
        Direction::Get => State::Get { expected_block: 1 },
        Direction::Put => State::Put { last_sent_block: 0 },
    };
    let mut last_sent: BytesMut = request;
    let mut retry_count: u32 = 0;
    let mut bytes_transferred: u64 = 0;
    let mut recv_buf = vec![0u8; crate::MAX_PACKET_SIZE];

    loop {
        if state == State::Done {
            break;
        }

        let (n, from) = match transport.recv(&mut recv_buf, inactivity_timeout).await {
            Ok(result) => result,
            Err(TftpClientError::RxTimeout) => {
                if !last_sent.is_empty() && retry_count < MAX_TX_RETRY {
                    retry_count += 1;
                    warn!(retry_count, "retransmitting after inactivity timeout");
                    audit::emit(
                        audit_enabled,
                        &AuditEvent::RetryAttempted {
                            retry_count,
                            max_retries: MAX_TX_RETRY,
                        },
                    );
                    transport.send(&last_sent).await?;
                    continue;
                }
                audit::emit(
                    audit_enabled,
                    &AuditEvent::TransferFailed {
                        reason: "receive inactivity timeout".to_string(),
                    },
                );
                return Err(TftpClientError::RxTimeout);
            }
            Err(e) => {
                audit::emit(
                    audit_enabled,
                    &AuditEvent::TransferFailed {
                        reason: e.to_string(),
                    },
                );
                return Err(e);
            }
        };

        if from.ip() != server_ip {
            warn!(source = %from, expected = %server_ip, "rejecting datagram from unexpected source");
            let err_pkt = codec::encode_err(ErrorCode::UnknownTransferId, Some("unknown transfer id"));
            transport.send_to(&err_pkt, from).await?;
            continue;
        }

        if !transport.tid_latched() {
            transport.latch_port(from.port());
            audit::emit(audit_enabled, &AuditEvent::TidLatched { peer: from });
        }

        let packet = &recv_buf[..n];
        let opcode = codec::decode_opcode(packet)?;

        match (state, Opcode::from_u16(opcode)) {
            (State::Get { .. }, Some(Opcode::Data)) => {
                let block = codec::decode_block(packet)?;
                let State::Get { expected_block } = state else {
                    unreachable!()
                };
                if block != expected_block {
                    debug!(block, expected_block, "discarding out-of-sequence DATA");
                    continue;
                }

                let payload = codec::decode_data_payload(packet)?;
                if let Err(e) = file.write_block(payload).await {
                    let err_pkt = codec::encode_err(ErrorCode::NotDefined, Some("File write error"));
                    let _ = transport.send(&err_pkt).await;
                    audit::emit(
                        audit_enabled,
                        &AuditEvent::TransferFailed {
                            reason: e.to_string(),
                        },
                    );
                    return Err(e);
                }
                bytes_transferred += payload.len() as u64;

                let ack = codec::encode_ack(block);
                transport.send(&ack).await?;
                last_sent = ack;
                retry_count = 0;

                if payload.len() < DEFAULT_BLOCK_SIZE {
                    info!(bytes_transferred, "get transfer complete");
                    audit::emit(
                        audit_enabled,
                        &AuditEvent::TransferCompleted { bytes_transferred },
                    );
                    state = State::Done;
                } else {
                    state = State::Get {
                        expected_block: expected_block.wrapping_add(1),
                    };
                }
            }

            (State::Put { .. }, Some(Opcode::Ack)) | (State::PutLast { .. }, Some(Opcode::Ack)) => {
                let block = codec::decode_block(packet)?;
                let last_sent_block = match state {
                    State::Put { last_sent_block } | State::PutLast { last_sent_block } => {
                        last_sent_block
                    }
                    _ => unreachable!(),
                };
                if block != last_sent_block {
                    debug!(block, last_sent_block, "discarding stale ACK");
                    continue;
                }

                if matches!(state, State::PutLast { .. }) {
                    info!(bytes_transferred, "put transfer complete");
                    audit::emit(
                        audit_enabled,
                        &AuditEvent::TransferCompleted { bytes_transferred },
                    );
                    state = State::Done;
                    continue;
                }

                let payload = match file.read_block().await {
                    Ok(payload) => payload,
                    Err(e) => {
                        let err_pkt = codec::encode_err(ErrorCode::NotDefined, Some("File read error"));
                        let _ = transport.send(&err_pkt).await;
                        audit::emit(
                            audit_enabled,
                            &AuditEvent::TransferFailed {
                                reason: e.to_string(),
                            },
                        );
                        return Err(e);
                    }
                };
                bytes_transferred += payload.len() as u64;

                let next_block = last_sent_block.wrapping_add(1);
                let data_pkt = codec::encode_data(next_block, &payload)?;
                transport.send(&data_pkt).await?;
                retry_count = 0;

                state = if payload.len() < DEFAULT_BLOCK_SIZE {
                    State::PutLast {
                        last_sent_block: next_block,
                    }
                } else {
                    State::Put {
                        last_sent_block: next_block,
                    }
                };
                last_sent = data_pkt;
            }

            (_, Some(Opcode::Error)) => {
                let (code, message) = codec::decode_err_payload(packet)?;
                audit::emit(
                    audit_enabled,
                    &AuditEvent::TransferFailed {
                        reason: format!("server error {code}: {message}"),
                    },
                );
                return Err(TftpClientError::ErrPacketReceived { code, message });
            }

            (_, other) => {
                let opcode_value = other.map(|o| o as u16).unwrap_or(opcode);
                let err_pkt = codec::encode_err(ErrorCode::IllegalOperation, Some("unexpected opcode"));
                let _ = transport.send(&err_pkt).await;
                audit::emit(
                    audit_enabled,
                    &AuditEvent::TransferFailed {
                        reason: format!("unexpected opcode {opcode_value}"),
                    },
                );
                return Err(TftpClientError::InvalidOpcodeReceived(opcode_value));
            }
        }
    }

    Ok(bytes_transferred)
}
