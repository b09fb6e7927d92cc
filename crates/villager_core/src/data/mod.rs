//! Data-driven definitions: the stat catalog and engine constants.
//!
//! Both types load from RON text. This module performs no file IO; callers
//! read the text and hand it over.

pub mod catalog;
pub mod config;

pub use catalog::{BuildingKind, BuildingStats, Catalog, Civilization, Cost, UnitKind, UnitStats};
pub use config::EngineConfig;
