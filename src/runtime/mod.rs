//! Controller runtime hosted by each built job.
//!
//! ```text
//!   Job::build ──► Manager ─┬─ probes   (/healthz, /readyz)
//!                           ├─ metrics  (/metrics)
//!                           ├─ leader election (optional)
//!                           └─ controllers (via ControllerFactory)
//! ```
//!
//! The reconciliation logic behind each controller is external; it plugs in
//! through [`ControllerFactory`].

pub mod controller;
pub mod fault;
pub mod leader;
pub mod manager;
pub mod namespaces;
pub mod probes;
pub mod scheme;

pub use controller::{
    Connection, ControllerContext, ControllerFactory, ControllerKind, IdleController,
    ReconcileState, Runnable, StandaloneFactory,
};
pub use fault::{FaultInjector, FaultKind};
pub use leader::{InMemoryLeaseElector, LeaderElector, LeaseTimings};
pub use manager::{Manager, ManagerOptions};
pub use namespaces::WatchNamespaces;
pub use scheme::{GroupVersion, GroupVersionKind, Scheme};
