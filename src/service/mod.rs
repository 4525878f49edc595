//! Agent service surface: the [`Agent`] facade, its builder and the unary responses.

mod agent;
mod builder;
mod options;
mod ping;
mod state;

pub use agent::Agent;
pub use builder::{AgentBuilder, AgentDeps};
pub use options::{OptionResult, EVENTS_KEY};
pub use ping::Pong;
pub use state::AgentState;
