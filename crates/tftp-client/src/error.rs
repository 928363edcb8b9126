//! Flat error taxonomy for the TFTP client.
//!
//! Mirrors the `TFTPc_ERR` enum of the reference client this crate's state
//! machine is modeled on, but carries its variant as a typed `Result` rather
//! than an out-parameter plus boolean return.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TftpClientError {
    /// The process-wide serialization lock could not be acquired.
    #[error("another transfer is already in progress")]
    Lock,

    /// Initialization of the client faulted.
    #[error("client initialization failed: {0}")]
    FaultInit(String),

    /// A lock or other resource could not be allocated.
    #[error("resource allocation failed: {0}")]
    MemAlloc(String),

    /// The supplied configuration is malformed.
    #[error("invalid configuration: {0}")]
    CfgInvalid(String),

    /// A required argument was missing or empty.
    #[error("required argument missing: {0}")]
    NullArg(&'static str),

    /// `mail` mode (or any mode other than netascii/octet) was requested.
    #[error("invalid transfer mode")]
    InvalidMode,

    /// A request opcode other than RRQ/WRQ was supplied to the encoder.
    #[error("invalid opcode for request")]
    InvalidOpcode,

    /// No socket could be opened for the transfer.
    #[error("could not open socket: {0}")]
    NoSock(String),

    /// The requested or resolved address family is not usable.
    #[error("invalid or unsupported protocol family")]
    InvalidProtoFamily,

    /// A receive fault other than a timeout occurred.
    #[error("error receiving packet: {0}")]
    Rx(String),

    /// The receive-inactivity timeout elapsed with the retry budget exhausted.
    #[error("timed out waiting for a response")]
    RxTimeout,

    /// A send fault occurred.
    #[error("error transmitting packet: {0}")]
    Tx(String),

    /// The peer replied with a TFTP ERROR packet.
    #[error("server returned error {code}: {message}")]
    ErrPacketReceived { code: u16, message: String },

    /// The peer sent an opcode that is not valid in the current state.
    #[error("received unexpected opcode {0}")]
    InvalidOpcodeReceived(u16),

    /// The client state machine reached an inconsistent state.
    #[error("internal state machine inconsistency")]
    InvalidState,

    /// The local file could not be opened.
    #[error("could not open local file: {0}")]
    FileOpen(String),

    /// A read from the local file failed.
    #[error("error reading local file")]
    FileRead,

    /// A write to the local file failed (short write or I/O error).
    #[error("error writing local file")]
    FileWrite,

    /// Catch-all for lower-level I/O failures.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TftpClientError>;
