//! Nurture orchestration.

pub mod orchestrator;

pub use orchestrator::{
    NurtureOrchestrator, OrchestratorDeps, PlanOutcome, PlanState, StepOutcome, spawn_ticker,
};
