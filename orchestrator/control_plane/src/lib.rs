//! Control-plane implementations.
//!
//! - [`KubeControlPlane`] talks to a real Kubernetes API server through `kube`.
//! - [`MockControlPlane`] keeps objects in memory with the same 404/409
//!   semantics, for tests and local development.

pub mod kube_client;
pub mod mock;

pub use kube_client::{ConnectOptions, KubeControlPlane};
pub use mock::{MockControlPlane, MockOperation, DEFAULT_CONTAINER_ANNOTATION};
