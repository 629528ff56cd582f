//! Radio Resource Control (RRC) Configuration
//!
//! Consumes already-decoded SIB13 and MCCH messages and turns them into the
//! scheduling state of the MBSFN area.

pub mod ingest;
pub mod mcch_table;

pub use ingest::{
    AreaScheduling, ChannelWindow, ConfigIngest, MchInfo, MtchInfo, SchedulingSnapshot,
};
pub use mcch_table::McchTable;
