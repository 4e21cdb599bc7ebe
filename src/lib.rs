// src/lib.rs

//! `agentflow` drives workflow requests to completion by spawning, coordinating, and
//! retiring a hierarchy of specialized agents, each backed by a cached LLM call path,
//! plus a motivational scheduler that can generate its own workflow requests.

pub mod agentflow;

pub use agentflow::error::{CoreError, ErrorKind};
pub use agentflow::runtime::Runtime;
