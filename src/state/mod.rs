//! Change lifecycle
//!
//! Tracks every proposed edit from submission through asynchronous evaluation
//! to its terminal resolution:
//! - High-risk reviews that block until the user acts
//! - Draft changes, annotated with analysis as it arrives
//! - Workaround templates and the apply-all processing window

mod manager;
pub mod workaround;

pub use manager::{
    ApplyBatch, ChangeLifecycleManager, Initiated, LifecycleError, SettleOutcome, Settled,
};
