//! Book one ride in the demo city and let the background runner drive it to
//! completion, printing a line per state change.
//!
//! Run with: cargo run -p dispatch_core --example demo_dispatch

use std::time::Duration;

use dispatch_core::config::DispatchConfig;
use dispatch_core::logging::init_logging;
use dispatch_core::matching::VehicleType;
use dispatch_core::service::{DispatchService, RouteQuery};
use dispatch_core::spatial::Coordinate;

const MAJESTIC: Coordinate = Coordinate::new(12.9716, 77.5946);
const INDIRANAGAR: Coordinate = Coordinate::new(12.9626, 77.6371);

#[tokio::main]
async fn main() -> dispatch_core::Result<()> {
    init_logging("dispatch_core=info");

    let config = DispatchConfig::default()
        .with_speed_multiplier(120.0)
        .with_release_grace_secs(1.0);
    let service = DispatchService::demo(config)?;

    let quote = service.quote_route(&RouteQuery::new(MAJESTIC, INDIRANAGAR))?;
    let stops: Vec<&str> = quote.path.nodes.iter().map(|n| n.name.as_str()).collect();
    println!(
        "Quote: {} ({:.1} km, ~{} min, fare {:.2})",
        stops.join(" -> "),
        quote.path.total_distance_km,
        quote.eta_minutes,
        quote.estimated_fare
    );

    let offer = service.request_ride("user-001", MAJESTIC, Some(INDIRANAGAR), VehicleType::Sedan)?;
    println!("\n{} candidates for {}:", offer.candidates.len(), offer.request.id);
    for candidate in &offer.candidates {
        println!(
            "  {:<10} {:>5.2} km away, ETA {:>3} min, rating {:.1}",
            candidate.driver_name,
            candidate.direct_distance_km,
            candidate.eta_minutes,
            candidate.rating
        );
    }
    let Some(best) = offer.candidates.first() else {
        println!("No sedan nearby, try again later.");
        return Ok(());
    };

    let confirmed = service.confirm_ride(offer.request.id, best.driver_id)?;
    let ride = confirmed.ride.ride_id;
    println!("\n{ride} confirmed with {}", confirmed.ride.driver_name);

    service.start_simulation()?;
    let mut last = confirmed.ride.status;
    let mut interval = tokio::time::interval(Duration::from_millis(250));
    loop {
        interval.tick().await;
        let snapshot = service.status(ride)?;
        if snapshot.status != last {
            println!(
                "  {:>15} at ({:.4}, {:.4})",
                snapshot.status.as_str(),
                snapshot.driver_location.lat, snapshot.driver_location.lng
            );
            last = snapshot.status;
        }
        if last.is_terminal() && service.simulation_state().counts.active_rides == 0 {
            break;
        }
    }

    let ticks = service.stop_simulation().await.unwrap_or_default();
    let state = service.simulation_state();
    println!(
        "\nDone after {ticks} ticks: {} completed, {} drivers available",
        state.counts.completed_rides, state.counts.available_drivers
    );
    Ok(())
}
