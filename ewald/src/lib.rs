pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use simulation::states::{Body, Cell, NVec3, NVec4};
pub use simulation::params::{Parameters, DEFAULT_SIGMA};
pub use simulation::ewald::{Ewald, potential_energy};
pub use simulation::timer::{Timer, LogTimer};
pub use simulation::tree::Octree;
pub use simulation::waves::{Wave, init_waves};
pub use simulation::scenario::{Scenario, rock_salt, random_cube};

pub use configuration::config::{ConfigError, EwaldConfig, TreeConfig, BodyConfig, GeneratorConfig, ScenarioConfig};

pub use benchmark::benchmark::bench_ewald;
