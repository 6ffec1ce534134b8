//! Persona catalog - the synthetic participants run through the workshop.

pub mod registry;
pub mod types;

pub use registry::PersonaRegistry;
pub use types::{DigitalMaturity, Persona, PersonaRef};
