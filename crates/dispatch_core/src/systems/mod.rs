pub mod movement;
pub mod trip_completed;
pub mod trip_started;
