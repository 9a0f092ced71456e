use crate::model::TopProcesses;
use colored::*;
use reqwest::Client;
use std::error::Error;

const BUSY_CPU: f32 = 50.0;

pub async fn run_top(client: &Client, url: &str, n: usize) -> Result<(), Box<dyn Error>> {
    let top: TopProcesses = client
        .get(format!("{url}/processes/top"))
        .query(&[("n", n)])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    println!("{:<8} {:<7} {:<10} CMD", "PID", "CPU%", "MEM");
    for p in top.processes {
        let cpu = format!("{:.1}", p.cpu_percent);
        let cpu = if p.cpu_percent >= BUSY_CPU {
            cpu.red()
        } else {
            cpu.normal()
        };
        println!(
            "{:<8} {:<7} {:<10} {}",
            p.pid,
            cpu,
            format_bytes(p.memory_bytes),
            p.name
        );
    }
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes < 1024 * 1024 {
        format!("{:.0}K", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}M", bytes as f64 / MIB)
    }
}
