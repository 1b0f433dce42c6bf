//! A vision-driven browser agent: screenshot, ask the model for one action on
//! a 0-999 grid, run it, repeat until the model says it is done.

pub mod agent;
pub mod artifacts;
pub mod brain;
pub mod config;
pub mod decode;
pub mod error;
pub mod executor;
pub mod grid;
pub mod hands;
pub mod prompts;
pub mod report;
pub mod types;
pub mod workflow;

pub use agent::{Agent, AgentEvent, AgentOptions, Task, TaskRun, Termination};
pub use error::AgentError;
pub use types::{Action, Continuation, GridPoint, PixelPoint, Viewport};
