use crate::model::HealthEvent;
use eventsource_stream::Eventsource;
use futures_util::stream::{Stream, StreamExt};
use reqwest::Client;
use std::error::Error;

/// Follow `/events` and print every recorded snapshot until the daemon
/// closes the stream.
pub async fn run_watch(
    client: &Client,
    url: &str,
    render: impl Fn(&HealthEvent) -> String,
) -> Result<(), Box<dyn Error>> {
    let response = client
        .get(format!("{url}/events"))
        .header("accept", "text/event-stream")
        .send()
        .await?
        .error_for_status()?;

    let mut events = health_events(response.bytes_stream());
    while let Some(event) = events.next().await {
        match event {
            Ok(ev) => println!("{}", render(&ev)),
            Err(e) => {
                eprintln!("Error reading SSE: {e}");
                break;
            }
        }
    }
    Ok(())
}

/// Decode an SSE byte stream into health events. Keep-alives carry no data
/// and are skipped; undecodable payloads are reported and skipped.
fn health_events<S, B, E>(body: S) -> impl Stream<Item = Result<HealthEvent, String>> + Unpin
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    Box::pin(body.eventsource().filter_map(|event| async move {
        match event {
            Ok(ev) if ev.data.trim().is_empty() => None,
            Ok(ev) => match serde_json::from_str::<HealthEvent>(&ev.data) {
                Ok(parsed) => Some(Ok(parsed)),
                Err(e) => {
                    eprintln!("Failed to parse event: {e}\nInput: {}", ev.data);
                    None
                }
            },
            Err(e) => Some(Err(e.to_string())),
        }
    }))
}
