use clap::Parser;
use tracing_subscriber::EnvFilter;

use icinga2_procmgr::config::{LogConfig, LogFormat, RedisConfig, WorkerConfig};
use icinga2_procmgr::shutdown::{install_drain_handler, InFlightGate};
use icinga2_procmgr::stream::Consumer;

#[derive(Parser, Debug)]
#[command(name = "icinga2-procmgr")]
#[command(about = "Distributed process execution worker for Icinga 2")]
struct Args {
    /// Redis server address (host:port, or an absolute unix socket path)
    #[arg(long, default_value = "127.0.0.1:6379")]
    redis_address: String,

    /// Redis password
    #[arg(long)]
    redis_password: Option<String>,

    /// Redis database index
    #[arg(long, default_value = "0")]
    redis_database: i64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = WorkerConfig {
        redis: RedisConfig::new(args.redis_address, args.redis_password, args.redis_database)?,
        log: LogConfig::new(&args.log_level, &args.log_format)?,
    };

    init_logging(&config);

    let client = redis::Client::open(config.redis.connection_info())?;
    // Blocking group reads get a connection of their own so responses never
    // queue behind XREADGROUP BLOCK.
    let read_conn = client.get_multiplexed_async_connection().await?;
    let publish_conn = client.get_multiplexed_async_connection().await?;

    let drain = install_drain_handler()?;
    let gate = InFlightGate::new();

    let consumer = Consumer::new(read_conn, publish_conn, drain.clone(), gate.clone());
    tracing::info!(
        consumer = %consumer.identity(),
        address = %config.redis.address,
        "starting icinga2-procmgr worker"
    );

    let mut consumer_task = tokio::spawn(consumer.run());

    let result: Result<(), Box<dyn std::error::Error>> = tokio::select! {
        _ = drain.cancelled() => Ok(()),
        joined = &mut consumer_task => match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(e.into()),
        },
    };

    // Both exits drain: the token fans the kill out to every execution
    // task, then the gate writer blocks until each child has been reaped.
    // The guard is held until exit so a late execution task stalls in
    // registration and dies with the process instead of spawning a child.
    drain.cancel();
    let _gate_closed = gate.drain().await;

    result
}

fn init_logging(config: &WorkerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone()));

    match config.log.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}
