use clap::Parser;
use tracing::{error, info};
use twitch_soda_relay::{relay, Args};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let stdin = std::io::stdin();
    let config = match args.resolve(stdin.lock(), std::io::stdout()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    info!(
        channel = %config.bridge.channel,
        broadcast = config.bridge.broadcast,
        socket = %config.socket_url,
        limit = config.limit,
        "starting relay"
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    if let Err(err) = relay::run(config, shutdown).await {
        error!(error = %err, "relay exited with error");
        std::process::exit(1);
    }
}
