pub mod config;
pub mod driver;

pub use driver::{ScenarioDriver, ScenarioReport};
