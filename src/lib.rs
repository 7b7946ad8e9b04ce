//! Blocking REST client for Nimbus machine-learning clusters.
//!
//! The cluster does the computing. This crate validates parameters locally,
//! submits model builds, polls the resulting jobs, and reshapes the returned
//! payloads into client-side structs. Everything hangs off one [`Cluster`]
//! handle; there is no global state.
//!
//! ```no_run
//! use nimbus_client::{Cluster, Family, GlmBuilder};
//!
//! fn main() -> nimbus_client::Result<()> {
//!     let cluster = Cluster::connect("localhost", 54321)?;
//!     let train = cluster.frame("train.hex")?;
//!     let model = GlmBuilder::new(train, "species")
//!         .family(Family::Binomial)
//!         .alpha([0.5])
//!         .fit(&cluster)?;
//!     println!("intercept: {:?}", model.coefficient("Intercept"));
//!     Ok(())
//! }
//! ```

mod cluster;
mod connection;
mod error;
mod frames;
mod gbm;
mod glm;
mod jobs;
mod logs;
mod models;
mod params;
#[cfg(test)]
mod testing;
mod transport;

pub use cluster::{Cluster, ClusterBuilder};
pub use connection::Connection;
pub use error::{NimbusError, Result};
pub use gbm::GbmBuilder;
pub use glm::GlmBuilder;
pub use jobs::{PollConfig, DEFAULT_POLL_INTERVAL_MS};
pub use models::{
    BetaConstraints, Cell, Coefficient, ColumnSelector, ColumnSpec, Distribution, Family, Frame,
    GlmModel, JobHandle, JobStatus, JobView, Link, LocalTable, ModelInfo, Solver,
};
pub use params::{ParamSet, ParamValue};
pub use transport::{Attachment, HttpTransport, Method, Transport};
