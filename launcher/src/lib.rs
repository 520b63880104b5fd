//! cheup library
//!
//! Deploys a Che server onto a minikube or minishift cluster and waits until it
//! answers its health endpoint. Re-running against an already deployed server
//! only reports its URL; a server scaled to zero is scaled back up.

pub mod app;
pub mod cluster;
pub mod deploy;
pub mod errors;
pub mod exec;
pub mod install;
pub mod logs;
pub mod pipeline;
pub mod platform;
pub mod probe;
#[cfg(any(test, feature = "test"))]
pub mod testing;
pub mod utils;
