mod reservoir;

pub use reservoir::{Reservoir, ReservoirSampler, Sample};
