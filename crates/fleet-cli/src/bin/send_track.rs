//! CLI tool to send simulated shipment tracking to the fleet server.
//!
//! Drives one shipment along a straight line, posting location batches and
//! optional DEPARTURE / ARRIVAL events.

use chrono::Utc;
use clap::Parser;
use std::time::Duration;
use tokio::time;

use fleet_cli::sim::{sample_at, FleetClient, LinearPath, TrackPath};
use fleet_core::models::{Coordinate, TrackingEvent};

/// Send simulated shipment tracking to the fleet server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Fleet server URL
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    /// Shipment to report for
    #[arg(long)]
    shipment: String,

    /// Device identifier attached to every sample
    #[arg(long, default_value = "SIM-DEVICE-1")]
    device: String,

    #[arg(long, default_value_t = 52.5200)]
    start_lat: f64,

    #[arg(long, default_value_t = 13.4050)]
    start_lon: f64,

    #[arg(long, default_value_t = 52.3906)]
    end_lat: f64,

    #[arg(long, default_value_t = 13.0645)]
    end_lon: f64,

    /// Cruising speed in km/h
    #[arg(long, default_value_t = 70.0)]
    speed: f64,

    /// Simulated seconds between samples
    #[arg(long, default_value_t = 30.0)]
    interval: f64,

    /// Samples per batch request
    #[arg(long, default_value_t = 20)]
    batch: usize,

    /// Wall-clock pause between batches in milliseconds
    #[arg(long, default_value_t = 500)]
    pause_ms: u64,

    /// Post DEPARTURE before the first batch
    #[arg(long)]
    depart: bool,

    /// Post ARRIVAL after the last batch
    #[arg(long)]
    arrive: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.interval <= 0.0 {
        anyhow::bail!("--interval must be positive");
    }
    if args.batch == 0 {
        anyhow::bail!("--batch must be at least 1");
    }

    let client = FleetClient::new(&args.url);
    let path = LinearPath::new(
        Coordinate::new(args.start_lat, args.start_lon),
        Coordinate::new(args.end_lat, args.end_lon),
        args.speed,
    );

    println!("Simulating shipment {} against {}", args.shipment, args.url);
    println!(
        "  From ({}, {}) to ({}, {})",
        args.start_lat, args.start_lon, args.end_lat, args.end_lon
    );
    println!(
        "  Distance: {:.2} km at {} km/h ({:.1} min)",
        path.distance_km,
        args.speed,
        path.duration_s() / 60.0
    );
    println!();

    if args.depart {
        let receipt = client
            .post_event(&args.shipment, &TrackingEvent::Departure, Some("simulated departure"))
            .await?;
        println!("DEPARTURE -> {} ({})", receipt.shipment_status, receipt.event_id);
    }

    let departed_at = Utc::now();
    let sample_count = (path.duration_s() / args.interval).ceil() as usize + 1;
    let offsets: Vec<f64> = (0..sample_count)
        .map(|i| (i as f64 * args.interval).min(path.duration_s()))
        .collect();

    let mut sent = 0usize;
    let mut rejected = 0usize;
    for (batch_no, chunk) in offsets.chunks(args.batch).enumerate() {
        let updates: Vec<_> = chunk
            .iter()
            .map(|t| sample_at(&path, *t, departed_at, &args.device))
            .collect();

        match client.post_batch(&args.shipment, &updates).await {
            Ok(summary) => {
                sent += summary.successful;
                rejected += summary.failed;
                println!(
                    "[{:3}] {} ok, {} failed, {} anomalies, progress {:.1}%",
                    batch_no + 1,
                    summary.successful,
                    summary.failed,
                    summary.anomalies,
                    summary.progress
                );
            }
            Err(e) => {
                eprintln!("Error sending batch {}: {:#}", batch_no + 1, e);
            }
        }
        time::sleep(Duration::from_millis(args.pause_ms)).await;
    }

    if args.arrive {
        let receipt = client
            .post_event(&args.shipment, &TrackingEvent::Arrival, Some("simulated arrival"))
            .await?;
        println!("ARRIVAL -> {} ({})", receipt.shipment_status, receipt.event_id);
    }

    println!("\nSimulation complete. {} samples accepted, {} rejected.", sent, rejected);
    Ok(())
}
