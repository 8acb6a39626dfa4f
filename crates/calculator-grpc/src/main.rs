//! Calculator client
//!
//! Streams numbers to the calculator service's `FindMaximum` call and prints
//! every new maximum the server reports.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use calculator_grpc::{
    CalculatorServiceClient, DEFAULT_NUMBERS, FindMaximumRequest, FindMaximumResponse,
    open_find_maximum,
};
use duplex_driver::{DriverConfig, DuplexStreamDriver};

/// Calculator client - stream numbers and print the running maximum
#[derive(Parser, Debug)]
#[command(name = "calculator-client")]
#[command(about = "Streams numbers to FindMaximum and prints the running maximum")]
struct Args {
    /// Server endpoint
    #[arg(long, default_value = "http://localhost:50051")]
    endpoint: String,

    /// JSON file with driver settings (`pacing` and `timeout` in ms)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Delay between numbers in milliseconds, overriding the config file
    #[arg(long)]
    pacing_ms: Option<u64>,

    /// Give up after this many milliseconds, overriding the config file
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Requests queued ahead of the transport
    #[arg(long, default_value_t = 16)]
    buffer: usize,

    /// Numbers to send
    #[arg(allow_negative_numbers = true)]
    numbers: Vec<i32>,
}

impl Args {
    /// Config file settings with command-line overrides applied.
    fn driver_config(&self) -> anyhow::Result<DriverConfig> {
        let mut config = match &self.config {
            Some(path) => DriverConfig::from_json_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => DriverConfig::default(),
        };
        if let Some(ms) = self.pacing_ms {
            config.pacing = Duration::from_millis(ms);
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout = Some(Duration::from_millis(ms));
        }
        Ok(config)
    }

    fn requests(&self) -> Vec<FindMaximumRequest> {
        let numbers: &[i32] = if self.numbers.is_empty() {
            &DEFAULT_NUMBERS
        } else {
            &self.numbers
        };
        numbers
            .iter()
            .map(|&number| FindMaximumRequest { number })
            .collect()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing - output to stderr so it doesn't mix with the results
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = args.driver_config()?;

    tracing::info!("Connecting to {}", args.endpoint);
    let mut client = CalculatorServiceClient::connect(args.endpoint.clone())
        .await
        .with_context(|| format!("could not connect to {}", args.endpoint))?;

    let stream = open_find_maximum(&mut client, args.buffer)
        .await
        .context("failed to open FindMaximum stream")?;

    let driver = DuplexStreamDriver::new(
        stream,
        args.requests(),
        |response: FindMaximumResponse| println!("{}", received_line(&response)),
    )
    .on_send(|request: &FindMaximumRequest| println!("{}", sending_line(request)))
    .with_config(config);

    let summary = driver
        .run_until(ctrl_c())
        .await
        .inspect_err(|e| tracing::error!("FindMaximum failed: {}", e))?;

    tracing::info!(
        sent = summary.sent,
        received = summary.received,
        "FindMaximum finished"
    );

    Ok(())
}

fn sending_line(request: &FindMaximumRequest) -> String {
    format!("Sending message: {}", request.number)
}

fn received_line(response: &FindMaximumResponse) -> String {
    format!("Received: {}", response.maximum)
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, cancelling");
}
