//! Agent loop for autonomous task execution
//!
//! The agent follows a perceive → think → act → observe cycle:
//! 1. Perceive: the provider sees the conversation so far
//! 2. Think: it answers or requests a batch of tool calls
//! 3. Act: each call is validated and executed, in order
//! 4. Observe: every result is appended before the next turn

pub mod agent_loop;
pub mod observer;
pub mod state;

pub use agent_loop::AgentLoop;
pub use observer::{AgentObserver, NoopObserver};
pub use state::{AgentConfig, AgentRun};
