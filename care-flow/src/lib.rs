pub mod context;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod session;
pub mod stage;

pub use context::Context;
pub use error::{FlowError, Result};
pub use pipeline::{Pipeline, PipelineBuilder, RunStatus, StepResult};
pub use runner::PipelineRunner;
pub use session::{InMemorySessionStorage, Session, SessionStorage};
pub use stage::{Advance, Stage, StageOutcome};
