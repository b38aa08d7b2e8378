//! Core rust implementation of rbmrs, a crate for rule-based kinetic modeling.
//!
//! A model of typed molecules and pattern rules is frozen with a
//! [`ModelBuilder`](model::model::ModelBuilder), expanded into a concrete reaction network,
//! assembled into a mass action ODE system and integrated with a stiff Rosenbrock solver.
//! [`Simulator`](simulator::Simulator) chains these steps for batches of initial conditions.
//!
//! ```rust
//! use indexmap::IndexMap;
//! use rbmrs_core::prelude::*;
//!
//! let mut builder = ModelBuilder::new();
//! builder
//!     .molecule_type("A(b)").unwrap()
//!     .molecule_type("B(a)").unwrap()
//!     .parameter("kf", 1.0)
//!     .parameter("kr", 0.1)
//!     .rule("bind", "A(b) + B(a) <-> A(b!1).B(a!1), kf, kr").unwrap()
//!     .observable("Complexes", "A(b!1).B(a!1)").unwrap()
//!     .initial("A(b)", 100.0).unwrap()
//!     .initial("B(a)", 100.0).unwrap();
//! let simulator = Simulator::new(
//!     builder.freeze().unwrap(),
//!     NetworkConfiguration::default(),
//!     IntegratorConfiguration::default(),
//! )
//! .unwrap();
//! assert_eq!(simulator.network().species.len(), 3);
//! let results = simulator.run(&linspace(0.0, 10.0, 11), &IndexMap::new()).unwrap();
//! assert_eq!(results.len(), 1);
//! ```

pub mod configuration;
pub mod integrate;
pub mod io;
pub mod model;
pub mod network;
pub mod observe;
pub mod ode;
pub mod simulator;
mod utils;

/// Commonly used types
pub mod prelude {
    pub use crate::configuration::{
        IntegratorConfiguration, IntegratorConfigurationBuilder, NetworkConfiguration,
        NetworkConfigurationBuilder,
    };
    pub use crate::integrate::{IntegrationError, Integrator, Trajectory};
    pub use crate::model::model::{Model, ModelBuilder, ModelDefinitionError, Quantity};
    pub use crate::network::{NetworkError, NetworkGenerator, ReactionNetwork};
    pub use crate::observe::{ObservableEvaluator, ObservableTable};
    pub use crate::ode::{AssemblyError, OdeAssembler, OdeSystem};
    pub use crate::simulator::{linspace, NetworkCache, SimulationError, SimulationResult, Simulator};
}
