pub mod gateway;

pub use gateway::{generate_reference, SimulatedGateway};
