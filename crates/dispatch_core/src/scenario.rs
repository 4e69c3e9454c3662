//! Scenario setup: the built-in demo city and driver fleets.
//!
//! The demo city is a ten-intersection slice of central Bangalore joined by
//! fourteen two-way roads. Random fleets are scattered over a graph's bounding
//! box and snapped to H3 (resolution 9) cell centres, so a seed always yields
//! the same fleet.

use h3o::{LatLng, Resolution};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{DispatchError, Result};
use crate::graph::Graph;
use crate::matching::{DriverProfile, VehicleType};
use crate::spatial::Coordinate;

/// `(id, lat, lng, name)`
const DEMO_NODES: [(&str, f64, f64, &str); 10] = [
    ("1", 12.9716, 77.5946, "Majestic"),
    ("2", 12.9766, 77.5993, "Cubbon Park"),
    ("3", 12.9719, 77.6062, "MG Road"),
    ("4", 12.9647, 77.6039, "Richmond Circle"),
    ("5", 12.9580, 77.5970, "Lalbagh"),
    ("6", 12.9542, 77.6035, "Jayanagar"),
    ("7", 12.9399, 77.6108, "BTM Layout"),
    ("8", 12.9516, 77.6318, "Koramangala"),
    ("9", 12.9626, 77.6371, "Indiranagar"),
    ("10", 12.9784, 77.6408, "Ulsoor"),
];

/// `(from, to, km, minutes)`, all two-way.
const DEMO_ROADS: [(&str, &str, f64, f64); 14] = [
    ("1", "2", 1.5, 8.0),
    ("2", "3", 1.2, 6.0),
    ("3", "4", 1.0, 5.0),
    ("4", "5", 1.8, 10.0),
    ("5", "6", 1.4, 7.0),
    ("6", "7", 2.1, 12.0),
    ("7", "8", 2.8, 15.0),
    ("8", "9", 1.9, 11.0),
    ("9", "10", 2.0, 12.0),
    ("10", "2", 2.2, 13.0),
    ("3", "9", 3.0, 16.0),
    ("4", "8", 2.5, 14.0),
    ("5", "7", 2.7, 15.0),
    ("1", "4", 1.6, 9.0),
];

/// Where the demo fleet starts, loosely around the demo city's landmarks.
const DEMO_DRIVER_LOCATIONS: [(f64, f64); 8] = [
    (12.9742, 77.6033),
    (12.9652, 77.5831),
    (12.9779, 77.6408),
    (12.9254, 77.5963),
    (12.9352, 77.6245),
    (12.9615, 77.5891),
    (12.9866, 77.5641),
    (12.9698, 77.7499),
];

pub fn demo_city_graph() -> Result<Graph> {
    let mut graph = Graph::new();
    for (id, lat, lng, name) in DEMO_NODES {
        graph.add_node(id, lat, lng, Some(name))?;
    }
    for (from, to, distance_km, time_min) in DEMO_ROADS {
        graph.add_edge(from, to, distance_km, time_min, true)?;
    }
    Ok(graph)
}

fn fleet_profile(index: usize, location: Coordinate) -> DriverProfile {
    let n = index + 1;
    DriverProfile::new(format!("driver-{n:03}"), format!("Driver {n}"), location)
        .with_vehicle_type(VehicleType::ALL[index % VehicleType::ALL.len()])
        .with_rating(4.0 + (index % 10) as f64 / 10.0)
        .with_total_trips(100 + 50 * index as u32)
}

/// The eight-driver demo fleet. Vehicle types rotate through every class.
pub fn demo_drivers() -> Vec<DriverProfile> {
    DEMO_DRIVER_LOCATIONS
        .iter()
        .enumerate()
        .map(|(i, &(lat, lng))| fleet_profile(i, Coordinate::new(lat, lng)))
        .collect()
}

/// `count` drivers placed uniformly at random over `graph`'s bounding box.
pub fn scatter_drivers(graph: &Graph, count: usize, seed: u64) -> Result<Vec<DriverProfile>> {
    let (south_west, north_east) = graph
        .bounding_box()
        .ok_or_else(|| DispatchError::invalid("cannot scatter drivers over an empty graph"))?;
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let location = random_cell_centre(&mut rng, south_west, north_east)?;
            Ok(fleet_profile(i, location))
        })
        .collect()
}

fn random_cell_centre<R: Rng>(
    rng: &mut R,
    south_west: Coordinate,
    north_east: Coordinate,
) -> Result<Coordinate> {
    let lat = rng.gen_range(south_west.lat..=north_east.lat);
    let lng = rng.gen_range(south_west.lng..=north_east.lng);
    let point = LatLng::new(lat, lng)
        .map_err(|err| DispatchError::invalid(format!("({lat}, {lng}): {err}")))?;
    let centre = LatLng::from(point.to_cell(Resolution::Nine));
    Ok(Coordinate::new(centre.lat(), centre.lng()))
}
