//! Fleet simulator
//!
//! Drives a small fleet of virtual vehicles with a simple gear/physics model
//! and posts their readings to the relay's ingest endpoint. One vehicle can
//! be made permanently aggressive - always accelerating, never shifting up -
//! to exercise the WARN/CRITICAL advisory paths.
//!
//! ```bash
//! cargo run --bin simulation -- --relay http://localhost:8080 --vehicles 5 --aggressive
//! ```

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rand::Rng;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "simulation")]
#[command(about = "EcoFleet vehicle fleet simulator")]
struct SimArgs {
    /// Relay base URL
    #[arg(long, default_value = "http://localhost:8080")]
    relay: String,

    /// Number of simulated vehicles
    #[arg(long, default_value = "5")]
    vehicles: usize,

    /// Seconds between telemetry sends per vehicle
    #[arg(long, default_value = "5")]
    interval: u64,

    /// Make the last vehicle drive aggressively
    #[arg(long)]
    aggressive: bool,
}

/// Gear ratio and the speed band it covers (km/h).
struct Gear {
    ratio: f64,
    max: f64,
}

const GEARS: [Gear; 6] = [
    Gear { ratio: 4.0, max: 30.0 },
    Gear { ratio: 2.5, max: 50.0 },
    Gear { ratio: 1.8, max: 80.0 },
    Gear { ratio: 1.2, max: 110.0 },
    Gear { ratio: 0.9, max: 140.0 },
    Gear { ratio: 0.7, max: 180.0 },
];

struct VehicleSim {
    vehicle_id: String,
    speed: f64,
    rpm: f64,
    gear: usize,
    fuel_level: f64,
    aggressive: bool,
}

impl VehicleSim {
    fn new(vehicle_id: String, aggressive: bool) -> Self {
        Self {
            vehicle_id,
            speed: 0.0,
            rpm: 800.0,
            gear: 0,
            fuel_level: 100.0,
            aggressive,
        }
    }

    /// Advance the driving model by one tick.
    fn step(&mut self, rng: &mut impl Rng) {
        if self.aggressive {
            // Always accelerating, rare hard braking, never above third gear
            self.speed += rng.gen_range(5.0..25.0);
            if rng.gen_bool(0.05) {
                self.speed -= rng.gen_range(10.0..30.0);
            }
            self.speed = self.speed.clamp(20.0, 180.0);
            if self.gear > 2 {
                self.gear = 2;
            }
        } else {
            let action: f64 = rng.gen();
            if action < 0.10 {
                // Hard braking (traffic, lights)
                self.speed -= rng.gen_range(5.0..15.0);
            } else if action < 0.20 {
                self.speed += rng.gen_range(8.0..20.0);
            } else if self.speed < GEARS[self.gear].max - 5.0 {
                self.speed += rng.gen_range(1.0..5.0);
            } else if self.speed > GEARS[self.gear].max {
                self.speed -= rng.gen_range(1.0..3.0);
            }
            // Rolling resistance
            self.speed = (self.speed - 0.2).clamp(0.0, 180.0);
        }

        self.rpm = self.speed * GEARS[self.gear].ratio * 40.0 + 800.0 + rng.gen_range(-100.0..100.0);
        self.rpm = self.rpm.clamp(600.0, 6000.0);

        // Shift points
        if self.rpm > 3500.0 && self.gear < GEARS.len() - 1 {
            self.gear += 1;
            self.rpm -= 1500.0;
        } else if self.rpm < 1200.0 && self.gear > 0 && self.speed > 10.0 {
            self.gear -= 1;
            self.rpm += 1000.0;
        }

        // Burn rate exaggerated so a tank empties in minutes, not hours
        let fuel_burn = (self.rpm / 2500.0) * 2.0;
        self.fuel_level = (self.fuel_level - fuel_burn).max(0.0);
    }

    fn reading(&self) -> serde_json::Value {
        serde_json::json!({
            "vehicle_id": self.vehicle_id,
            "speed": (self.speed * 100.0).round() / 100.0,
            "rpm": self.rpm as u32,
            "gear": self.gear + 1,
            "fuel_level": (self.fuel_level * 100.0).round() / 100.0,
        })
    }
}

async fn run_vehicle(mut sim: VehicleSim, relay: String, interval: Duration, http: reqwest::Client) {
    let url = format!("{}/api/telemetry", relay.trim_end_matches('/'));
    loop {
        let (reading, jitter) = {
            let mut rng = rand::thread_rng();
            sim.step(&mut rng);
            (sim.reading(), rng.gen_range(0.0..1.0))
        };

        info!(
            vehicle_id = %sim.vehicle_id,
            gear = sim.gear + 1,
            speed = sim.speed,
            rpm = sim.rpm as u32,
            fuel = sim.fuel_level,
            "Sending telemetry"
        );

        match http.post(&url).json(&reading).send().await {
            Ok(resp) if !resp.status().is_success() => {
                warn!(vehicle_id = %sim.vehicle_id, status = %resp.status(), "Relay rejected reading");
            }
            Ok(_) => {}
            Err(e) => error!(vehicle_id = %sim.vehicle_id, error = %e, "Send failed"),
        }

        // Pit stop when the tank runs dry
        if sim.fuel_level <= 0.0 {
            warn!(vehicle_id = %sim.vehicle_id, "Tank empty - refuelling stop");
            sim.speed = 0.0;
            sim.rpm = 800.0;
            sim.gear = 0;
            tokio::time::sleep(Duration::from_secs(2)).await;
            sim.fuel_level = 100.0;
        }

        tokio::time::sleep(interval + Duration::from_secs_f64(jitter)).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = SimArgs::parse();
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    info!(
        relay = %args.relay,
        vehicles = args.vehicles,
        "Starting fleet simulation (CTRL+C to stop)"
    );

    let mut tasks = Vec::with_capacity(args.vehicles);
    for i in 1..=args.vehicles {
        let vehicle_id = format!("Bus-{i:02}");
        let aggressive = args.aggressive && i == args.vehicles;
        if aggressive {
            warn!(vehicle_id = %vehicle_id, "Vehicle is in aggressive mode");
        }
        let sim = VehicleSim::new(vehicle_id, aggressive);
        tasks.push(tokio::spawn(run_vehicle(
            sim,
            args.relay.clone(),
            Duration::from_secs(args.interval),
            http.clone(),
        )));
    }

    tokio::signal::ctrl_c().await?;
    info!("Stopping simulation");
    for task in tasks {
        task.abort();
    }
    Ok(())
}
