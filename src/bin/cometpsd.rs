//! cometpsd - comet pub/sub daemon
//!
//! Starts one or more comet servers from CLI flags or a YAML
//! configuration file and runs them until interrupted. SIGUSR1
//! re-parses the configuration file; the topology of running servers
//! is not changed by a reload.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_yaml::Value;

use cometps::config;
use cometps::server::DEFAULT_CHANNELS_PREFIX;
use cometps::{ChannelOptions, CometServer, Config, DeliveryMode, LogLevel, ServerConfig};

const CONFIG_HELP: &str = "\
Configuration file:
  A YAML file which can configure multiple servers.

  Example:

    servers:
      - address: \"0.0.0.0\"
        port: 8080
        channels:
          test:
            publish_key: xyz
          test2:
            max_clients: 3
      - port: 1234
        address: \"localhost\"
        log_level: 2
        channels: {a: {publish_key: xyz}, b: {}}

  SIGUSR1 re-reads the file; running servers are not reconfigured.";

#[derive(Parser, Debug)]
#[command(
    name = "cometpsd",
    version,
    about = "HTTP slow-response comet pub/sub server",
    after_long_help = CONFIG_HELP
)]
struct Args {
    /// Address to bind on
    #[arg(short = 'a', long, default_value = "127.0.0.1")]
    address: String,

    /// Port number to listen on
    #[arg(short = 'p', long, default_value_t = 8080)]
    port: u16,

    /// Channel name
    #[arg(short = 'c', long, default_value = "default")]
    channel: String,

    /// Only allow publishing of requests with this key in the header
    /// field "X-CPS-Publish-Key: <secret>"
    #[arg(short = 'k', long = "publish-key")]
    publish_key: Option<String>,

    /// Read configuration from a YAML file ("-" reads stdin)
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Verbose (repeat for more logging)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silent (repeat for less logging)
    #[arg(short = 's', action = clap::ArgAction::Count)]
    silent: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cometps=debug".parse()?)
                .add_directive("cometpsd=debug".parse()?),
        )
        .init();

    let mut log_level =
        LogLevel::DEFAULT.offset(i64::from(args.verbose) - i64::from(args.silent));

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(c) => Some(c),
            Err(e) => {
                eprintln!("cometpsd: {}", e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    if let Some(cfg) = &config {
        log_level = LogLevel::from_i64(cfg.get_int("logging/log_level", log_level.as_i64()));
    }

    let mut servers: Vec<Arc<CometServer>> = Vec::new();

    let configured = config
        .as_ref()
        .and_then(|c| c.node("servers"))
        .and_then(Value::as_sequence)
        .is_some_and(|list| !list.is_empty());

    if configured {
        if let Some(cfg) = &config {
            if let Some(list) = cfg.node("servers").and_then(Value::as_sequence) {
                for node in list {
                    if let Some(server) = start_configured_server(node, &args, log_level).await {
                        servers.push(server);
                    }
                }
            }
        }
    } else {
        // no servers in config (or no config file): start from flags
        if let Some(addr) = resolve_addr(&args.address, args.port) {
            match CometServer::start(
                ServerConfig::with_addr(addr).log_level(log_level),
            )
            .await
            {
                Ok(server) => {
                    server.open_channel(
                        ChannelOptions::new(args.channel.as_str())
                            .publish_key(args.publish_key.clone().unwrap_or_default())
                            .log_level(log_level),
                    );
                    servers.push(Arc::new(server));
                }
                Err(e) => tracing::error!(error = %e, "skipping server"),
            }
        }
    }

    if servers.is_empty() {
        tracing::error!("no servers started");
        std::process::exit(1);
    }

    #[cfg(unix)]
    if let Some(mut cfg) = config.take() {
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let mut usr1 = match signal(SignalKind::user_defined1()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGUSR1 handler");
                    return;
                }
            };
            while usr1.recv().await.is_some() {
                match cfg.reload() {
                    Ok(()) => tracing::info!("config reloaded"),
                    Err(e) => tracing::warn!(error = %e, "config reload failed"),
                }
            }
        });
    }

    let mut tasks = Vec::with_capacity(servers.len());
    for server in &servers {
        let server = Arc::clone(server);
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                tracing::error!(server = %server.name(), error = %e, "server error");
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    for task in &tasks {
        task.abort();
    }
    for server in &servers {
        server.shutdown();
    }

    Ok(())
}

/// Start one server from a `servers` list entry, falling back to the
/// CLI flags for anything the entry leaves out. Returns `None` (after
/// logging) when the address does not resolve or cannot be bound.
async fn start_configured_server(
    node: &Value,
    args: &Args,
    default_level: LogLevel,
) -> Option<Arc<CometServer>> {
    let address = config::get_str_at(node, "address", &args.address);
    let port = u16::try_from(config::get_int_at(node, "port", i64::from(args.port)))
        .unwrap_or(args.port);
    let level = LogLevel::from_i64(config::get_int_at(
        node,
        "log_level",
        default_level.as_i64(),
    ));
    let prefix = config::get_str_at(node, "channels_uri", DEFAULT_CHANNELS_PREFIX);

    let addr = resolve_addr(&address, port)?;
    let server = match CometServer::start(
        ServerConfig::with_addr(addr)
            .channels_prefix(prefix)
            .log_level(level),
    )
    .await
    {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "skipping server");
            return None;
        }
    };

    if let Some(channels) = config::find_node(node, "channels").and_then(Value::as_mapping) {
        for (key, chnode) in channels {
            let Some(name) = key.as_str() else { continue };
            server.open_channel(channel_options(name, chnode, level));
        }
    }

    Some(Arc::new(server))
}

fn channel_options(name: &str, node: &Value, default_level: LogLevel) -> ChannelOptions {
    let mode = DeliveryMode::parse(&config::get_str_at(node, "mode", "")).unwrap_or_default();
    let max_clients = config::get_int_at(node, "max_clients", 0).max(0) as usize;
    ChannelOptions::new(name)
        .publish_key(config::get_str_at(node, "publish_key", ""))
        .mode(mode)
        .max_clients(max_clients)
        .log_level(LogLevel::from_i64(config::get_int_at(
            node,
            "log_level",
            default_level.as_i64(),
        )))
}

fn resolve_addr(host: &str, port: u16) -> Option<SocketAddr> {
    match (host, port).to_socket_addrs() {
        Ok(mut addrs) => addrs.next(),
        Err(e) => {
            tracing::warn!(address = %host, port = port, error = %e, "address does not resolve");
            None
        }
    }
}
