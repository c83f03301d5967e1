mod model;

pub use model::{Scenario, ScenarioRelation, ScenarioRow};
