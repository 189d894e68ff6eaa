//! `log4j-relay` binary: collect log4j socket streams, forward JSON lines.

mod cli;

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use log4j_relay::{
    config::{DialPolicy, Endpoint, RelayConfig, WritePolicy},
    error::RelayError,
    relay::Relay,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = relay_config(cli::Cli::parse());
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "relay failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: RelayConfig) -> Result<(), RelayError> {
    if let Some(addr) = config.metrics_addr {
        install_metrics(addr)?;
    }
    let relay = Relay::start(config).await?;
    let summary = relay.run().await?;
    info!(
        forwarded = summary.forwarded,
        dropped = summary.dropped,
        "shutdown complete"
    );
    Ok(())
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), RelayError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(%addr, "metrics exporter listening");
    Ok(())
}

#[cfg(not(feature = "metrics"))]
#[expect(clippy::unnecessary_wraps, reason = "matches the metrics-enabled signature")]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), RelayError> {
    tracing::warn!(%addr, "built without the metrics feature; exporter disabled");
    Ok(())
}

fn relay_config(cli: cli::Cli) -> RelayConfig {
    let defaults = RelayConfig::default();
    RelayConfig {
        listen: Endpoint::new(cli.listen_host, cli.listen_port),
        forward: Endpoint::new(cli.forward_host, cli.forward_port),
        queue_capacity: cli.buffer,
        max_frame_length: cli.max_frame_length.unwrap_or(defaults.max_frame_length),
        dial: DialPolicy {
            attempts: cli.dial_attempts,
            delay: Duration::from_millis(cli.dial_delay_ms),
            ..defaults.dial
        },
        write: WritePolicy {
            attempts: cli.write_attempts,
            ..defaults.write
        },
        metrics_addr: cli.metrics_addr,
        ..defaults
    }
    .normalized()
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn cli_defaults_produce_default_config() {
        let config = relay_config(cli::Cli::parse_from(["log4j-relay"]));
        assert_eq!(config, RelayConfig::default().normalized());
    }

    #[test]
    fn zero_values_are_lifted() {
        let config = relay_config(cli::Cli::parse_from([
            "log4j-relay",
            "--buffer",
            "0",
            "--dial-attempts",
            "0",
            "--write-attempts",
            "0",
        ]));
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.dial.attempts, 1);
        assert_eq!(config.write.attempts, 1);
    }
}
