//! Receive Loop
//!
//! Drives the acquisition state machine one step at a time and decides when
//! a tracked cell is considered lost.

use common::types::CellDescriptor;
use interfaces::toolkit::PhyToolkit;
use layers::phy::{CellAcquisition, TtiDecision};
use layers::status::ModemStatus;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one receive loop step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// No cell found in this attempt
    Searching,
    /// A cell was found and applied to the toolkit
    Acquired(Arc<CellDescriptor>),
    /// A subframe was received
    Subframe(TtiDecision),
    /// The subframe could not be received or its MIB not decoded
    SyncFailed { consecutive: u32 },
    /// Too many failures in a row, back to searching
    Lost,
}

pub struct ReceiveLoop<T: PhyToolkit> {
    acquisition: CellAcquisition<T>,
    max_sync_failures: u32,
    consecutive_failures: u32,
}

impl<T: PhyToolkit> ReceiveLoop<T> {
    pub fn new(acquisition: CellAcquisition<T>, max_sync_failures: u32) -> Self {
        Self {
            acquisition,
            max_sync_failures: max_sync_failures.max(1),
            consecutive_failures: 0,
        }
    }

    pub fn acquisition(&self) -> &CellAcquisition<T> {
        &self.acquisition
    }

    pub fn status(&self) -> ModemStatus {
        self.acquisition.status()
    }

    /// Search while no cell is tracked, otherwise receive one subframe
    pub fn step(&mut self) -> StepOutcome {
        if !self.acquisition.state().is_tracking() {
            return match self.acquisition.acquire() {
                Ok(cell) => {
                    self.consecutive_failures = 0;
                    StepOutcome::Acquired(cell)
                }
                Err(e) => {
                    debug!("Cell acquisition attempt failed: {}", e);
                    StepOutcome::Searching
                }
            };
        }

        if let Err(e) = self.acquisition.apply_scheduling_updates() {
            warn!("Cannot apply MBSFN configuration: {}", e);
        }

        let result = self
            .acquisition
            .resynchronize_subframe()
            .and_then(|_| self.acquisition.current_decision());

        match result {
            Ok(decision) => {
                self.consecutive_failures = 0;
                StepOutcome::Subframe(decision)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                debug!("Subframe lost ({} in a row): {}", self.consecutive_failures, e);
                if self.consecutive_failures >= self.max_sync_failures {
                    info!("Lost synchronisation after {} failures", self.consecutive_failures);
                    self.consecutive_failures = 0;
                    self.acquisition.restart_search();
                    StepOutcome::Lost
                } else {
                    StepOutcome::SyncFailed { consecutive: self.consecutive_failures }
                }
            }
        }
    }
}
