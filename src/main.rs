use kraken_feed::models::ChannelUpdate;
use kraken_feed::{Channel, Event, FeedError, KrakenClient, OrderBook, fetch_config};
use tracing::{info, warn};

const PAIR: &str = "XBT/EUR";
const DEPTH: u32 = 10;

#[tokio::main]
async fn main() -> Result<(), FeedError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt::init();

    let config = fetch_config()?;
    let client = KrakenClient::connect(config).await?;
    let mut events = client.listen().ok_or(FeedError::Closed)?;

    client.subscribe_ticker(&[PAIR]).await?;
    client.subscribe_book(&[PAIR], DEPTH).await?;

    // Book levels arrive as "50251.20000" / "0.00100000": 5 price and 8
    // volume decimals.
    let book = OrderBook::new(DEPTH as usize, 5, 8);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    Event::Update(update) => match &update.data {
                        ChannelUpdate::Book(diff) => match book.apply_update(diff, true) {
                            Ok(()) => {
                                let top = book.best();
                                info!(
                                    pair = PAIR,
                                    bid = ?top.bid.map(|l| l.price),
                                    ask = ?top.ask.map(|l| l.price),
                                    spread = ?top.spread(),
                                    "Book"
                                );
                            }
                            Err(err) => {
                                warn!(error = %err, "Book out of sync, resubscribing");
                                book.clear();
                                client.unsubscribe(Channel::Book, &[PAIR]).await?;
                                client.subscribe_book(&[PAIR], DEPTH).await?;
                            }
                        },
                        ChannelUpdate::Ticker(ticker) => {
                            info!(pair = PAIR, last = %ticker.close.price, "Ticker");
                        }
                        _ => {}
                    },
                    Event::Fatal(err) => return Err(err),
                    other => info!(event = ?other, "Session event"),
                }
            }
        }
    }

    client.close().await
}
