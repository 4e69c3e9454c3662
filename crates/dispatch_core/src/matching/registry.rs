use std::collections::HashMap;

use tracing::debug;

use crate::error::{DispatchError, EntityKind, Result};
use crate::graph::Graph;
use crate::matching::{Driver, DriverId, DriverProfile, DriverStatus, VehicleType};
use crate::spatial::Coordinate;

/// Dense driver table. Drivers are never removed, so handles stay valid.
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    drivers: Vec<Driver>,
    by_external_id: HashMap<String, DriverId>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn register(&mut self, graph: &Graph, profile: DriverProfile) -> Result<DriverId> {
        if self.by_external_id.contains_key(&profile.external_id) {
            return Err(DispatchError::invalid(format!(
                "driver {} is already registered",
                profile.external_id
            )));
        }
        if !(0.0..=5.0).contains(&profile.rating) {
            return Err(DispatchError::invalid(format!(
                "driver rating must be within 0..=5, got {}",
                profile.rating
            )));
        }
        let location = profile.location.validate()?;
        let (nearest_node, _) = graph.nearest_node(location)?;

        let id = DriverId(self.drivers.len() as u32);
        self.by_external_id.insert(profile.external_id.clone(), id);
        self.drivers.push(Driver {
            id,
            external_id: profile.external_id,
            name: profile.name,
            location,
            nearest_node,
            status: profile.status,
            vehicle_type: profile.vehicle_type,
            rating: profile.rating,
            total_trips: profile.total_trips,
        });
        debug!(%id, %nearest_node, "registered driver");
        Ok(id)
    }

    pub fn get(&self, id: DriverId) -> Result<&Driver> {
        self.drivers
            .get(id.index())
            .ok_or_else(|| DispatchError::not_found(EntityKind::Driver, id))
    }

    fn get_mut(&mut self, id: DriverId) -> Result<&mut Driver> {
        self.drivers
            .get_mut(id.index())
            .ok_or_else(|| DispatchError::not_found(EntityKind::Driver, id))
    }

    pub fn find_by_external_id(&self, external_id: &str) -> Result<&Driver> {
        let id = self
            .by_external_id
            .get(external_id)
            .copied()
            .ok_or_else(|| DispatchError::not_found(EntityKind::Driver, external_id))?;
        self.get(id)
    }

    pub fn list(&self) -> &[Driver] {
        &self.drivers
    }

    /// Available drivers, optionally restricted to one vehicle type.
    pub fn available(&self, vehicle_type: Option<VehicleType>) -> impl Iterator<Item = &Driver> {
        self.drivers.iter().filter(move |driver| {
            driver.is_available() && vehicle_type.map_or(true, |vt| driver.vehicle_type == vt)
        })
    }

    /// Move a driver and recompute its nearest node.
    pub fn update_location(
        &mut self,
        graph: &Graph,
        id: DriverId,
        location: Coordinate,
    ) -> Result<&Driver> {
        let location = location.validate()?;
        let (nearest_node, _) = graph.nearest_node(location)?;
        let driver = self.get_mut(id)?;
        driver.location = location;
        driver.nearest_node = nearest_node;
        Ok(driver)
    }

    /// Set a driver's status, returning the previous one.
    pub fn update_status(&mut self, id: DriverId, status: DriverStatus) -> Result<DriverStatus> {
        let driver = self.get_mut(id)?;
        let previous = std::mem::replace(&mut driver.status, status);
        if previous != status {
            debug!(%id, from = %previous, to = %status, "driver status changed");
        }
        Ok(previous)
    }

    pub fn record_trip(&mut self, id: DriverId) -> Result<u32> {
        let driver = self.get_mut(id)?;
        driver.total_trips += 1;
        Ok(driver.total_trips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::line_graph;

    #[test]
    fn registration_derives_nearest_node() {
        let graph = line_graph();
        let mut registry = DriverRegistry::new();
        let id = registry
            .register(&graph, DriverProfile::new("d-1", "Asha", Coordinate::new(0.0, 0.9)))
            .expect("register");
        let driver = registry.get(id).expect("driver");
        assert_eq!(graph.node(driver.nearest_node).expect("node").id, "B");
        assert_eq!(registry.find_by_external_id("d-1").expect("lookup").id, id);
    }

    #[test]
    fn duplicate_external_ids_are_rejected() {
        let graph = line_graph();
        let mut registry = DriverRegistry::new();
        let profile = DriverProfile::new("d-1", "Asha", Coordinate::new(0.0, 0.0));
        registry.register(&graph, profile.clone()).expect("first");
        assert!(matches!(
            registry.register(&graph, profile),
            Err(DispatchError::InvalidArgument(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn location_update_moves_nearest_node() {
        let graph = line_graph();
        let mut registry = DriverRegistry::new();
        let id = registry
            .register(&graph, DriverProfile::new("d-1", "Asha", Coordinate::new(0.0, 0.0)))
            .expect("register");
        let driver = registry
            .update_location(&graph, id, Coordinate::new(0.0, 1.9))
            .expect("move");
        assert_eq!(graph.node(driver.nearest_node).expect("node").id, "C");
        assert!(registry
            .update_location(&graph, id, Coordinate::new(91.0, 0.0))
            .is_err());
    }

    #[test]
    fn availability_filters_by_status_and_vehicle() {
        let graph = line_graph();
        let mut registry = DriverRegistry::new();
        let here = Coordinate::new(0.0, 0.0);
        let a = registry
            .register(&graph, DriverProfile::new("a", "A", here).with_vehicle_type(VehicleType::Suv))
            .expect("a");
        registry
            .register(&graph, DriverProfile::new("b", "B", here))
            .expect("b");
        registry.update_status(a, DriverStatus::OnBreak).expect("status");

        assert_eq!(registry.available(None).count(), 1);
        assert_eq!(registry.available(Some(VehicleType::Suv)).count(), 0);
        assert_eq!(registry.available(Some(VehicleType::Sedan)).count(), 1);
    }

    #[test]
    fn unknown_driver_is_not_found() {
        let registry = DriverRegistry::new();
        assert!(registry.get(DriverId(3)).is_err_and(|e| e.is_not_found()));
        assert!(registry.find_by_external_id("ghost").is_err_and(|e| e.is_not_found()));
    }
}
