use futures_util::StreamExt;
use nano_ws::{
    connect_with_backoff, ClientConfig, NanoWsClient, ReconnectConfig, SubscriptionOptions, Topic,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let url = std::env::var("NANO_WS_URL").unwrap_or_else(|_| ClientConfig::DEFAULT_URL.into());

    // Accounts to watch, e.g. `cargo run --example confirmations -- nano_1abc...`
    let accounts: Vec<String> = std::env::args().skip(1).collect();

    let client = NanoWsClient::new(url.clone())?;
    let options = SubscriptionOptions::new()
        .accounts(accounts.iter().cloned())
        .include_election_info(true);
    client.subscribe_confirmation(options).await?;
    client.subscribe_telemetry().await?;

    println!("Connecting to {}...", url);
    if accounts.is_empty() {
        println!("Watching all confirmations");
    } else {
        println!("Watching {} account(s)", accounts.len());
    }

    let retry = ReconnectConfig {
        jitter: 0.2,
        ..Default::default()
    };
    let mut stream = client.events().await?;
    connect_with_backoff(&client, &retry).await?;
    println!("✅ Connected successfully!");
    println!("Waiting for events...\n");

    let mut confirmation_count = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
            item = stream.next() => match item {
                Some(Ok(event)) if event.is(Topic::Confirmation) => {
                    confirmation_count += 1;
                    let message = &event.payload;
                    println!("[Confirmation #{}]", confirmation_count);
                    println!("  Account: {}", message["account"]);
                    println!("  Amount:  {}", message["amount"]);
                    println!("  Hash:    {}", message["hash"]);
                    if let Some(time) = event.time {
                        println!("  Time:    {}", time);
                    }
                    println!();
                }
                Some(Ok(event)) => {
                    println!("[{}] {}", event.topic, event.payload);
                }
                Some(Err(e)) if e.is_connection_failure() => {
                    println!("⚠️  Connection lost: {}", e);
                    connect_with_backoff(&client, &retry).await?;
                    println!("✅ Reconnected, subscriptions restored");
                }
                Some(Err(e)) => {
                    eprintln!("Skipping frame: {}", e);
                }
                None => break,
            },
        }
    }

    client.disconnect().await?;
    println!("Received {} confirmation(s)", confirmation_count);
    Ok(())
}
