pub mod states;
pub mod params;
pub mod timer;
pub mod tree;
pub mod waves;
pub mod real_space;
pub mod ewald;
pub mod scenario;
