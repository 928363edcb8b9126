//! The Session Facade: top-level `get`/`put` entry points.
//!
//! Serializes transfers behind a process-wide lock, resolves the server
//! endpoint with IPv6→IPv4 failover, and composes the Resolver, Transport,
//! File I/O Adapter, and Transfer Engine into one call.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::config::ClientConfig;
use crate::engine::{self, Direction};
use crate::error::{Result, TftpClientError};
use crate::fileio::FileHandle;
use crate::resolver;
use crate::transport::Transport;
use crate::{AddressFamily, TransferMode};

const FAMILY_V4: u8 = 0;
const FAMILY_V6: u8 = 1;

/// A TFTP client instance: one default configuration, one serialization
/// lock, and the process-wide "family that last succeeded" preference.
pub struct TftpClient {
    default_config: Mutex<Option<ClientConfig>>,
    lock: Mutex<()>,
    last_used_family: AtomicU8,
}

impl Default for TftpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TftpClient {
    pub fn new() -> Self {
        Self {
            default_config: Mutex::new(None),
            lock: Mutex::new(()),
            last_used_family: AtomicU8::new(FAMILY_V6),
        }
    }

    pub async fn init(&self, default_config: ClientConfig) -> Result<()> {
        crate::config::validate_config(&default_config)?;
        self.set_default_config(default_config).await
    }

    pub async fn set_default_config(&self, config: ClientConfig) -> Result<()> {
        *self.default_config.lock().await = Some(config);
        Ok(())
    }

    /// The address family the most recent successful transfer used, so that a
    /// subsequent `Unspecified`-family call can be told to prefer it. Starts
    /// at `V6` per the connection-attempt loop's IPv6-first policy.
    pub fn last_used_family(&self) -> AddressFamily {
        match self.last_used_family.load(Ordering::Relaxed) {
            FAMILY_V4 => AddressFamily::V4,
            _ => AddressFamily::V6,
        }
    }

    /// Downloads `remote_path` from the server into `local_path` (RRQ).
    #[instrument(skip(self, cfg_override), fields(remote = %remote_path))]
    pub async fn get(
        &self,
        cfg_override: Option<ClientConfig>,
        local_path: &Path,
        remote_path: &str,
        mode: TransferMode,
    ) -> Result<()> {
        let _guard = self.lock.try_lock().map_err(|_| TftpClientError::Lock)?;
        let config = self.effective_config(cfg_override).await?;

        let mut file = FileHandle::open_write(local_path).await?;
        let result = self
            .connect_and_run(&config, Direction::Get, remote_path, mode, &mut file)
            .await;
        let _ = file.close().await;
        result.map(|_bytes_transferred| ())
    }

    /// Uploads `local_path` to the server as `remote_path` (WRQ).
    #[instrument(skip(self, cfg_override), fields(remote = %remote_path))]
    pub async fn put(
        &self,
        cfg_override: Option<ClientConfig>,
        local_path: &Path,
        remote_path: &str,
        mode: TransferMode,
    ) -> Result<()> {
        let _guard = self.lock.try_lock().map_err(|_| TftpClientError::Lock)?;
        let config = self.effective_config(cfg_override).await?;

        let mut file = FileHandle::open_read(local_path).await?;
        let result = self
            .connect_and_run(&config, Direction::Put, remote_path, mode, &mut file)
            .await;
        let _ = file.close().await;
        result.map(|_bytes_transferred| ())
    }

    async fn effective_config(&self, cfg_override: Option<ClientConfig>) -> Result<ClientConfig> {
        if let Some(cfg) = cfg_override {
            return Ok(cfg);
        }
        self.default_config
            .lock()
            .await
            .clone()
            .ok_or(TftpClientError::FaultInit(
                "no configuration set; call init() or pass cfg_override".to_string(),
            ))
    }

    /// The connection-attempt loop of §4.6: try the preferred family, and
    /// when the preference is `Unspecified`, fail over from IPv6 to IPv4 if
    /// the hostname is not a numeric literal.
    async fn connect_and_run(
        &self,
        config: &ClientConfig,
        direction: Direction,
        remote_path: &str,
        mode: TransferMode,
        file: &mut FileHandle,
    ) -> Result<u64> {
        let unspec = config.address_family == AddressFamily::Unspecified;
        let literal = resolver::is_numeric_literal(&config.server_hostname);
        // A literal address resolves to its own family regardless of preference,
        // so no IPv6-first attempt — and no failover — applies to it. Otherwise,
        // start from whichever family last succeeded (IPv6 until one transfer
        // has completed), so a prior IPv4 success skips a doomed IPv6 attempt.
        let mut family_tmp = if unspec && !literal {
            self.last_used_family()
        } else if unspec {
            AddressFamily::Unspecified
        } else {
            config.address_family
        };
        let timeout = Duration::from_millis(u64::from(config.rx_inactivity_timeout_ms));

        loop {
            let resolved = resolver::resolve(&config.server_hostname, config.server_port, family_tmp).await;
            let server_addr = match resolved {
                Ok(addr) => addr,
                Err(e) if unspec && family_tmp == AddressFamily::V6 && !literal => {
                    warn!("IPv6 resolution failed, retrying on IPv4: {e}");
                    family_tmp = AddressFamily::V4;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut transport = match Transport::open(server_addr).await {
                Ok(t) => t,
                Err(e) if unspec && family_tmp == AddressFamily::V6 && !literal => {
                    warn!("IPv6 transport open failed, retrying on IPv4: {e}");
                    family_tmp = AddressFamily::V4;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let run_result = engine::run_until_complete(
                &mut transport,
                file,
                direction,
                remote_path,
                mode,
                server_addr.ip(),
                timeout,
                config.logging.transfer_audit,
            )
            .await;

            match run_result {
                Ok(bytes) => {
                    let family_code = if server_addr.is_ipv6() { FAMILY_V6 } else { FAMILY_V4 };
                    self.last_used_family.store(family_code, Ordering::Relaxed);
                    return Ok(bytes);
                }
                Err(e @ TftpClientError::Tx(_)) if unspec && family_tmp == AddressFamily::V6 && !literal => {
                    warn!("IPv6 send failed, retrying on IPv4: {e}");
                    family_tmp = AddressFamily::V4;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
