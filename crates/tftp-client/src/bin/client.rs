//! Command-line front end for the TFTP client.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use tftp_client::config::{ClientConfig, LogFormat};
use tftp_client::{AddressFamily, Result, TftpClient, TftpClientError, TransferMode};

/// TFTP client (RFC 1350)
#[derive(Parser, Debug)]
#[command(name = "tftp-client")]
#[command(about = "RFC 1350 TFTP client", long_about = None)]
struct Cli {
    /// TFTP server address, `host` or `host:port` (default port 69)
    #[arg(short, long)]
    server: String,

    /// Download this remote file (RRQ)
    #[arg(short, long, conflicts_with = "put")]
    get: Option<String>,

    /// Upload this local file (WRQ)
    #[arg(short, long, conflicts_with = "get")]
    put: Option<String>,

    /// Local file path: destination for --get, source for --put.
    /// Defaults to the remote/local filename given to --get/--put.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Transfer mode
    #[arg(short, long, default_value = "octet")]
    mode: String,

    /// Preferred address family
    #[arg(long, value_enum, default_value = "auto")]
    family: CliFamily,

    /// Receive-inactivity timeout in milliseconds
    #[arg(short, long, default_value_t = tftp_client::DEFAULT_TIMEOUT_MS)]
    timeout: u32,

    /// Load a ClientConfig from this TOML file instead of building one from flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Raise the tracing level to debug
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliFamily {
    Auto,
    V4,
    V6,
}

impl From<CliFamily> for AddressFamily {
    fn from(f: CliFamily) -> Self {
        match f {
            CliFamily::Auto => AddressFamily::Unspecified,
            CliFamily::V4 => AddressFamily::V4,
            CliFamily::V6 => AddressFamily::V6,
        }
    }
}

fn split_host_port(server: &str) -> (String, Option<u16>) {
    // IPv6 literals (`[::1]:69`) carry their own colons; only split on the
    // last colon when it looks like a port suffix.
    if let Some(idx) = server.rfind(':') {
        if let Ok(port) = server[idx + 1..].parse::<u16>() {
            return (server[..idx].trim_matches(['[', ']']).to_string(), Some(port));
        }
    }
    (server.trim_matches(['[', ']']).to_string(), None)
}

/// Initializes the global tracing subscriber. Returns the `tracing-appender`
/// worker guard when logging to a file; the caller must hold it for the
/// duration of `main`, or buffered log lines are dropped on exit.
fn init_tracing(
    cli: &Cli,
    logging: &tftp_client::config::LoggingConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let level = if cli.verbose { "debug" } else { logging.level.as_str() };

    if let Some(log_file) = &logging.file {
        let dir = log_file.parent().unwrap_or_else(|| std::path::Path::new("."));
        let file_name = log_file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| TftpClientError::CfgInvalid("logging.file must include a file name".to_string()))?;
        let file_appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let builder = tracing_subscriber::fmt()
            .with_env_filter(level)
            .with_target(false)
            .with_writer(non_blocking);
        match logging.format {
            LogFormat::Json => builder.json().init(),
            LogFormat::Text => builder.init(),
        }
        Ok(Some(guard))
    } else {
        let builder = tracing_subscriber::fmt().with_env_filter(level).with_target(false);
        match logging.format {
            LogFormat::Json => builder.json().init(),
            LogFormat::Text => builder.init(),
        }
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        tftp_client::config::load_config(config_path)?
    } else {
        ClientConfig::default()
    };

    if config.server_hostname.is_empty() {
        let (host, port) = split_host_port(&cli.server);
        config.server_hostname = host;
        if let Some(port) = port {
            config.server_port = port;
        }
    }
    config.address_family = cli.family.into();
    config.rx_inactivity_timeout_ms = cli.timeout;

    tftp_client::config::validate_config(&config)?;
    let _log_guard = init_tracing(&cli, &config.logging)?;

    let mode = TransferMode::parse(&cli.mode)?;
    let client = TftpClient::new();
    client.init(config).await?;

    if let Some(remote_file) = cli.get {
        let local_file = cli.file.unwrap_or_else(|| PathBuf::from(&remote_file));
        client.get(None, &local_file, &remote_file, mode).await?;
        info!("download complete");
    } else if let Some(local_file) = cli.put {
        let local_path = PathBuf::from(&local_file);
        let remote_file = cli
            .file
            .and_then(|p| p.to_str().map(String::from))
            .unwrap_or(local_file);
        client.put(None, &local_path, &remote_file, mode).await?;
        info!("upload complete");
    } else {
        return Err(TftpClientError::CfgInvalid(
            "must specify either --get or --put".to_string(),
        ));
    }

    Ok(())
}
