//! hos-planner core
//!
//! Hours-of-service aware route planning and incremental replanning for
//! long-haul trucks: sequence the stops, simulate the trip through the HOS
//! and fuel trackers, and version every replan.

pub mod traits;
pub mod model;
pub mod config;
pub mod error;
pub mod hos;
pub mod fuel;
pub mod matrix;
pub mod haversine;
pub mod osrm;
pub mod sequencer;
pub mod segment;
pub mod builder;
pub mod compliance;
pub mod cost;
pub mod assembler;
pub mod trigger;
pub mod replan;
pub mod store;
pub mod planner;

pub use assembler::{PlanId, PlanStatus, RoutePlan};
pub use config::PlanningConfig;
pub use error::PlanningError;
pub use planner::{RoutePlanner, plan_route};
pub use replan::SimulationResult;
pub use trigger::{Trigger, TriggerKind};
