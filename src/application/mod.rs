//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Scene registry (validated scene table)
//! - Rate limiter and idempotency guard (governance state)
//! - Send orchestrator (the guarded send pipeline)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod idempotency;
pub mod keys;
pub mod limiter;
pub mod metrics;
pub mod orchestrator;
pub mod ports;
pub mod registry;
