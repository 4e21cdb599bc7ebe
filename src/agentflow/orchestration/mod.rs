// src/agentflow/orchestration/mod.rs

pub mod base;
pub mod sub;
pub mod top_level;

pub use base::{BaseOrchestrator, OrchestratorResult, OrchestratorState};
pub use sub::{DecompositionStrategy, DecompositionTask, SubOrchestrator, SubtaskDefinition};
pub use top_level::{
    ComplexityLevel, ResourceEstimate, TopLevelOrchestrator, WorkflowComplexity, WorkflowInput, WorkflowInputType, WorkflowStrategy,
};
