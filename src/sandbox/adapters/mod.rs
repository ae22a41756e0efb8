//! Executor backends.

mod container;
mod direct;
mod factory;
mod process;

pub use container::{CONTAINER_WORKSPACE, ContainerExecutor, ContainerSpec, container_args};
pub use direct::{DirectExecutor, NOBODY_ID};
pub use factory::{ExecutorSelection, select_executor};
