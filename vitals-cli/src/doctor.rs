use crate::model::{DaemonStatus, HealthEvent};
use colored::*;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;

#[derive(Deserialize, Debug)]
struct HealthzResponse {
    #[allow(dead_code)]
    status: String,
}

pub async fn run_doctor(client: &Client, url: &str) -> Result<(), Box<dyn Error>> {
    println!("{}", "🩺 Vitals Doctor".bold().cyan());
    println!("{}", "Checking monitor health...".dimmed());
    println!();

    let mut all_good = true;

    // 1. Connectivity
    print!("• Daemon Connectivity: ");
    match client.get(format!("{url}/healthz")).send().await {
        Ok(resp) => {
            if resp.status().is_success() {
                if resp.json::<HealthzResponse>().await.is_ok() {
                    println!("{}", "OK".green());
                } else {
                    println!("{}", "OK (Invalid JSON)".yellow());
                }
            } else {
                println!("{}", format!("FAIL (Status {})", resp.status()).red());
                all_good = false;
            }
        }
        Err(e) => {
            println!("{}", format!("FAIL ({e})").red());
            println!("  → Is vitalsd running? Try 'systemctl status vitalsd'");
            return Ok(());
        }
    }

    // 2. Status
    print!("• Daemon Status:       ");
    let status: DaemonStatus = match client.get(format!("{url}/status")).send().await {
        Ok(resp) => match resp.json().await {
            Ok(status) => status,
            Err(e) => {
                println!("{}", format!("FAIL ({e})").red());
                return Ok(());
            }
        },
        Err(e) => {
            println!("{}", format!("FAIL ({e})").red());
            return Ok(());
        }
    };
    println!("{}", format!("OK (v{})", status.version).green());

    // 3. Sampling
    print!("• Sampling:            ");
    let c = &status.counters;
    if c.ticks == 0 {
        println!(
            "{}",
            format!("Waiting for first tick (every {}s)", status.interval_seconds).yellow()
        );
    } else if c.collection_errors > 0 {
        println!(
            "{}",
            format!("{} ticks, {} failed", c.ticks, c.collection_errors).yellow()
        );
    } else {
        println!("{}", format!("{} ticks", c.ticks).green());
    }

    // 4. History store
    print!("• History:             ");
    if c.storage_errors > 0 {
        println!(
            "{}",
            format!("FAIL ({} write errors)", c.storage_errors).red()
        );
        println!("  → Check that the history path is writable.");
        all_good = false;
    } else {
        println!(
            "{}",
            format!("{}/{} entries", status.history_len, status.max_entries).green()
        );
    }

    // 5. Sinks
    print!("• Notification Sinks:  ");
    if status.sinks.is_empty() {
        println!("{}", "None configured".dimmed());
    } else if c.sink_failures > 0 {
        println!(
            "{}",
            format!(
                "{} ({} delivered, {} failed)",
                status.sinks.join(", "),
                c.sink_deliveries,
                c.sink_failures
            )
            .yellow()
        );
    } else {
        println!(
            "{}",
            format!("{} ({} delivered)", status.sinks.join(", "), c.sink_deliveries).green()
        );
    }

    // 6. Latest sample
    print!("• Latest Sample:       ");
    match latest(client, url).await {
        Ok(None) => println!("{}", "No data yet".dimmed()),
        Ok(Some(event)) => {
            let line = format!("{} ({})", event.snapshot.timestamp, event.status.describe());
            if event.status.is_warning() {
                println!("{}", line.yellow());
            } else {
                println!("{}", line.green());
            }
        }
        Err(e) => {
            println!("{}", format!("FAIL ({e})").red());
            all_good = false;
        }
    }

    println!();
    if all_good {
        println!("{}", "✅ Monitor is healthy.".bold().green());
    } else {
        println!("{}", "⚠️  Monitor has issues. See above.".bold().yellow());
    }

    Ok(())
}

/// `None` while the daemon has not recorded anything yet.
async fn latest(client: &Client, url: &str) -> Result<Option<HealthEvent>, Box<dyn Error>> {
    let body: serde_json::Value = client
        .get(format!("{url}/history/latest"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    if body["snapshot"].is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(body)?))
}
