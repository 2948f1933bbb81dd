use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "driftwire",
    about = "real-time client for infrastructure drift events over sse and websocket channels",
    version
)]
pub struct Args {
    /// Push (SSE) endpoint URL; falls back to DRIFTWIRE_PUSH_URL, then the built-in default
    #[arg(long)]
    pub push_url: Option<String>,

    /// Duplex (WebSocket) endpoint URL; falls back to DRIFTWIRE_DUPLEX_URL, then the built-in default
    #[arg(long)]
    pub duplex_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Enable metrics server
    #[arg(long)]
    pub metrics: bool,

    /// Metrics server port
    #[arg(long, default_value = "9090")]
    pub metrics_port: u16,

    /// Maximum number of automatic reconnection attempts per channel
    #[arg(long, default_value = "10")]
    pub reconnect_attempts: u32,

    /// Base reconnection delay in milliseconds (doubled per attempt)
    #[arg(long, default_value = "1000")]
    pub reconnect_delay: u64,

    /// Interval between duplex heartbeat pings in milliseconds
    #[arg(long, default_value = "30000")]
    pub heartbeat_interval: u64,

    /// Push-channel event history capacity
    #[arg(long, default_value = "100")]
    pub buffer_capacity: usize,

    /// Topics to subscribe on the duplex channel in addition to the baseline
    /// (all, drifts, events, state, stats)
    #[arg(long, value_delimiter = ',')]
    pub topics: Vec<String>,

    /// Quiet mode - status lines only, no event output
    #[arg(long)]
    pub quiet: bool,
}
