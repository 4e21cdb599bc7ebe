// src/agentflow/persistence/mod.rs

pub mod schema;
pub mod store;

pub use store::{
    AgentRecord, LlmInteractionRecord, MemoryEntryRecord, MotivationalStateRecord, MotivationalTaskRecord,
    OrchestratorRecord, Store, ThoughtTreeRecord, ToolExecutionRecord,
};
