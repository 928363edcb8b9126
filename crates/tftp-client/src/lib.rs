//! A client for the Trivial File Transfer Protocol (RFC 1350).
//!
//! The entry point is [`session::TftpClient`], which serializes `get`/`put`
//! calls behind a process-wide lock and drives [`engine::run_until_complete`]
//! through the DATA/ACK lockstep over a [`transport::Transport`].

pub mod audit;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod fileio;
pub mod resolver;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use error::{Result, TftpClientError};
pub use session::TftpClient;

/// Fixed block size per RFC 1350; this client negotiates no block-size option.
pub const DEFAULT_BLOCK_SIZE: usize = 512;
/// Maximum TFTP packet size: 4-byte DATA/ACK header plus a full block.
pub const MAX_PACKET_SIZE: usize = DEFAULT_BLOCK_SIZE + 4;
/// Default server port (RFC 1350 §1).
pub const DEFAULT_SERVER_PORT: u16 = 69;
/// Default per-receive inactivity timeout.
pub const DEFAULT_TIMEOUT_MS: u32 = 3000;
/// Retransmissions attempted per expected response before giving up.
pub const MAX_TX_RETRY: u32 = 3;

/// The five RFC 1350 opcodes. No OACK: this client negotiates no options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Opcode {
    Rrq = 1,
    Wrq = 2,
    Data = 3,
    Ack = 4,
    Error = 5,
}

impl Opcode {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Opcode::Rrq),
            2 => Some(Opcode::Wrq),
            3 => Some(Opcode::Data),
            4 => Some(Opcode::Ack),
            5 => Some(Opcode::Error),
            _ => None,
        }
    }
}

/// RFC 1350 §5 error codes. Option negotiation failure (RFC 2347's code 8) does
/// not apply: this client never sends an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    NotDefined = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    DiskFull = 3,
    IllegalOperation = 4,
    UnknownTransferId = 5,
    FileAlreadyExists = 6,
    NoSuchUser = 7,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotDefined => "Not defined",
            ErrorCode::FileNotFound => "File not found",
            ErrorCode::AccessViolation => "Access violation",
            ErrorCode::DiskFull => "Disk full or allocation exceeded",
            ErrorCode::IllegalOperation => "Illegal TFTP operation",
            ErrorCode::UnknownTransferId => "Unknown transfer ID",
            ErrorCode::FileAlreadyExists => "File already exists",
            ErrorCode::NoSuchUser => "No such user",
        }
    }
}

/// Transfer mode. `Mail` is retained only so argument validation can reject it
/// by name rather than by treating any unrecognized string as a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Netascii,
    Octet,
    Mail,
}

impl TransferMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "netascii" => Ok(TransferMode::Netascii),
            "octet" => Ok(TransferMode::Octet),
            "mail" => Ok(TransferMode::Mail),
            other => Err(TftpClientError::CfgInvalid(format!(
                "unknown transfer mode: {other}"
            ))),
        }
    }

    /// The wire-format mode string, or `None` for `Mail` (rejected at encode time).
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            TransferMode::Netascii => Some("netascii"),
            TransferMode::Octet => Some("octet"),
            TransferMode::Mail => None,
        }
    }
}

/// Preferred address family for endpoint resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFamily {
    V4,
    V6,
    #[default]
    Unspecified,
}
