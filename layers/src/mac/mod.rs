//! Medium Access Control (MAC) Scheduling
//!
//! Per-subframe MBSFN scheduling of MCCH and MCH (3GPP TS 36.321 5.12)

pub mod scheduler;

pub use scheduler::{schedule_for_tti, MbsfnDecision, MbsfnScheduler};
