//! Mock implementations for testing.
//!
//! This module provides test doubles for infrastructure adapters,
//! enabling controlled testing of application logic.

pub mod clock;
pub mod dispatcher;
pub mod layer;
pub mod store;

pub use clock::MockClock;
pub use dispatcher::{MockDispatcher, RecordedDispatch};
pub use layer::{CapturedEvent, MockCaptureLayer};
pub use store::LatencyStore;
