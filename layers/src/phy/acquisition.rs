//! Cell Acquisition
//!
//! Search, synchronisation and tracking of an eMBMS cell. The state machine
//! owns the current [`CellDescriptor`] and the TTI counter, and combines the
//! subframe classification with the MBSFN scheduler into one decision per
//! subframe.

use super::mib::{decode_sfn, derive_sfn, unpack_mib};
use super::subframe::{classify, is_cas_subframe, SubframeKind};
use super::AcquisitionConfig;
use crate::mac::{MbsfnDecision, MbsfnScheduler};
use crate::status::ModemStatus;
use crate::LayerError;
use common::types::{CarrierMode, CellDescriptor, Pci};
use common::utils::time::{next_tti, split_tti, tti, SUBFRAMES_PER_FRAME};
use interfaces::toolkit::{CellSearchHit, PhyToolkit, SearchParams};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle of the receiver
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionState {
    /// No cell
    Searching,
    /// Cell found, not yet applied to the toolkit
    Synchronizing {
        cell: Arc<CellDescriptor>,
        /// SFN decoded during the search
        sfn: u32,
    },
    /// Receiving subframes of a confirmed cell
    Tracking {
        cell: Arc<CellDescriptor>,
        /// TTI of the last received subframe
        tti: u32,
    },
}

impl AcquisitionState {
    /// Name reported to telemetry consumers
    pub fn name(&self) -> &'static str {
        match self {
            AcquisitionState::Searching => "searching",
            AcquisitionState::Synchronizing { .. } => "syncing",
            AcquisitionState::Tracking { .. } => "synchronized",
        }
    }

    /// The current cell, if any
    pub fn cell(&self) -> Option<&Arc<CellDescriptor>> {
        match self {
            AcquisitionState::Searching => None,
            AcquisitionState::Synchronizing { cell, .. } | AcquisitionState::Tracking { cell, .. } => Some(cell),
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self, AcquisitionState::Tracking { .. })
    }
}

/// What the PHY pipeline has to do with one subframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TtiDecision {
    pub tti: u32,
    pub sfn: u32,
    pub subframe: u32,
    /// Role of the subframe on the carrier
    pub kind: SubframeKind,
    /// MBSFN scheduling, disabled outside MBSFN subframes
    pub mbsfn: MbsfnDecision,
}

/// Cell acquisition state machine
pub struct CellAcquisition<T: PhyToolkit> {
    toolkit: T,
    config: AcquisitionConfig,
    scheduler: MbsfnScheduler,
    state: AcquisitionState,
    /// Carrier frequency offset in Hz
    cfo: f32,
    /// Last scheduling snapshot whose cell overrides were applied
    applied_generation: u64,
}

impl<T: PhyToolkit> CellAcquisition<T> {
    /// Create a new state machine in `Searching`
    pub fn new(toolkit: T, config: AcquisitionConfig, scheduler: MbsfnScheduler) -> Self {
        Self {
            toolkit,
            config,
            scheduler,
            state: AcquisitionState::Searching,
            cfo: 0.0,
            applied_generation: 0,
        }
    }

    pub fn state(&self) -> &AcquisitionState {
        &self.state
    }

    /// The current cell, if any
    pub fn cell(&self) -> Option<Arc<CellDescriptor>> {
        self.state.cell().cloned()
    }

    /// TTI of the last received subframe while tracking
    pub fn tti(&self) -> Option<u32> {
        match self.state {
            AcquisitionState::Tracking { tti, .. } => Some(tti),
            _ => None,
        }
    }

    /// Carrier frequency offset in Hz
    pub fn cfo(&self) -> f32 {
        self.cfo
    }

    /// Refine the carrier frequency offset from channel estimation
    pub fn set_cfo_from_channel_estimation(&mut self, cfo: f32) {
        debug!("CFO updated from channel estimation: {} Hz", cfo);
        self.cfo = cfo;
    }

    pub fn scheduler(&self) -> &MbsfnScheduler {
        &self.scheduler
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    /// Drop the current cell and return to `Searching`
    pub fn restart_search(&mut self) {
        if !matches!(self.state, AcquisitionState::Searching) {
            info!("Phy: dropping cell, restarting search from {}", self.state.name());
        }
        self.state = AcquisitionState::Searching;
    }

    fn search(&mut self, mode: CarrierMode, params: &SearchParams) -> Result<Option<CellSearchHit>, LayerError> {
        self.toolkit.search_cell(mode, params).map_err(|e| {
            error!("Phy: Error searching cell: {}", e);
            LayerError::AcquisitionFailure(format!("cell search failed: {}", e))
        })
    }

    /// Search for a cell and decode its MIB.
    ///
    /// The MBMS-dedicated MIB is tried first, then the regular MIB. On
    /// success the state is `Synchronizing`, on failure `Searching`.
    pub fn search_cell(&mut self) -> Result<Arc<CellDescriptor>, LayerError> {
        self.restart_search();
        let params = self.config.search_params();

        let (mode, hit) = match self.search(CarrierMode::Dedicated, &params)? {
            Some(hit) => (CarrierMode::Dedicated, hit),
            None => {
                debug!("Phy: no MIB-MBMS, trying regular MIB");
                self.toolkit.reset_search().map_err(|e| {
                    error!("Phy: cannot reset cell search: {}", e);
                    LayerError::AcquisitionFailure(format!("search reset failed: {}", e))
                })?;
                match self.search(CarrierMode::Mixed, &params)? {
                    Some(hit) => (CarrierMode::Mixed, hit),
                    None => {
                        error!("Phy: failed to receive MIB");
                        return Err(LayerError::AcquisitionFailure("no cell found".to_string()));
                    }
                }
            }
        };

        info!(
            "Phy: PSS/SSS detected: Mode {:?}, PCI {}, CFO {} KHz, CP {:?}",
            hit.duplex_mode,
            hit.pci,
            hit.frequency_offset_hz / 1000.0,
            hit.cyclic_prefix
        );

        let mib = unpack_mib(&hit.mib.payload, mode)
            .map_err(|e| LayerError::AcquisitionFailure(e.to_string()))?;

        let nof_prb = match (mode, self.config.override_nof_prb) {
            (CarrierMode::Dedicated, Some(prb)) => prb,
            _ => mib.nof_prb().ok_or_else(|| {
                error!("SYNC: undefined bandwidth index {}", mib.bandwidth_index);
                LayerError::AcquisitionFailure(format!("undefined bandwidth index {}", mib.bandwidth_index))
            })?,
        };
        let sfn = derive_sfn(mib.raw_sfn, hit.mib.frame_offset, mode);

        let cell = CellDescriptor {
            pci: Pci(hit.pci),
            duplex_mode: hit.duplex_mode,
            cyclic_prefix: hit.cyclic_prefix,
            nof_prb,
            nof_ports: hit.nof_ports,
            carrier_mode: mode,
            mbsfn_prb: nof_prb,
        };

        info!(
            "Phy: MIB Decoded. {} cell, Mode {:?}, PCI {}, PRB {}, Ports {}, CFO {} KHz, SFN {}, sfn_offset {}",
            mode.describe(),
            cell.duplex_mode,
            cell.pci.0,
            cell.nof_prb,
            cell.nof_ports,
            hit.frequency_offset_hz / 1000.0,
            sfn,
            hit.mib.frame_offset
        );

        cell.validate().map_err(|e| {
            error!("SYNC: Detected invalid cell: {}", e);
            LayerError::AcquisitionFailure(e.to_string())
        })?;

        let cell = Arc::new(cell);
        self.cfo = hit.frequency_offset_hz;
        self.state = AcquisitionState::Synchronizing { cell: cell.clone(), sfn };
        Ok(cell)
    }

    /// Apply the found cell to the toolkit and start tracking
    pub fn confirm(&mut self) -> Result<(), LayerError> {
        let (cell, sfn) = match &self.state {
            AcquisitionState::Synchronizing { cell, sfn } => (cell.clone(), *sfn),
            other => {
                return Err(LayerError::InvalidState(format!("cannot confirm while {}", other.name())));
            }
        };

        if let Err(e) = self.toolkit.configure(&cell) {
            error!("Phy: failed to set cell: {}", e);
            self.state = AcquisitionState::Searching;
            return Err(LayerError::ToolkitConfigFailure(e.to_string()));
        }

        info!("Phy: tracking PCI {} from SFN {}", cell.pci.0, sfn);
        self.applied_generation = 0;
        self.state = AcquisitionState::Tracking { cell, tti: tti(sfn, 0) };
        Ok(())
    }

    /// Search and confirm in one step
    pub fn acquire(&mut self) -> Result<Arc<CellDescriptor>, LayerError> {
        let cell = self.search_cell()?;
        self.confirm()?;
        Ok(cell)
    }

    /// Receive one subframe and advance the TTI.
    ///
    /// The SFN is refreshed from the MIB in every subframe 0 that carries
    /// PBCH. On a dedicated carrier only every 4th frame starts with a CAS
    /// subframe; the other frame starts advance without a MIB check.
    ///
    /// If the MIB decode fails the TTI is left unchanged and `DecodeFailure`
    /// is returned; giving up is the caller's decision.
    pub fn resynchronize_subframe(&mut self) -> Result<u32, LayerError> {
        let (cell, current) = match &self.state {
            AcquisitionState::Tracking { cell, tti } => (cell.clone(), *tti),
            other => {
                return Err(LayerError::InvalidState(format!("cannot receive while {}", other.name())));
            }
        };

        let samples = match self.toolkit.pull_subframe() {
            Ok(Some(samples)) => samples,
            Ok(None) => return Err(LayerError::DecodeFailure("synchroniser has no lock".to_string())),
            Err(e) => {
                error!("SYNC: Error receiving subframe: {}", e);
                return Err(e.into());
            }
        };

        let sf = u32::from(samples.subframe_index);
        if sf >= SUBFRAMES_PER_FRAME {
            return Err(LayerError::DecodeFailure(format!("subframe index {}", sf)));
        }

        let mut next = next_tti(current);
        let (next_sfn, expected_sf) = split_tti(next);
        if sf != expected_sf {
            warn!("SYNC: subframe {} received after TTI {}, realigning", sf, current);
            next = if sf > expected_sf { tti(next_sfn, sf) } else { tti(next_sfn + 1, sf) };
        }

        let mode = cell.carrier_mode;
        if sf == 0 && is_cas_subframe(next, mode) {
            let mib = self
                .toolkit
                .decode_mib(&samples.buffer, mode)
                .ok_or_else(|| LayerError::DecodeFailure(format!("no MIB in TTI {}", next)))?;
            let sfn = decode_sfn(&mib, mode)?;
            let decoded = tti(sfn, 0);
            if decoded != next {
                warn!("SYNC: SFN corrected from {} to {}", next / SUBFRAMES_PER_FRAME, sfn);
            }
            next = decoded;
        }

        self.state = AcquisitionState::Tracking { cell, tti: next };
        Ok(next)
    }

    /// Decision for subframe `tti` of a carrier in `mode`
    pub fn decision_for(&self, tti: u32, mode: CarrierMode) -> TtiDecision {
        let (sfn, subframe) = split_tti(tti);
        let kind = classify(tti, mode);
        let mbsfn = match kind {
            SubframeKind::Mbsfn => self.scheduler.decide(tti, mode),
            SubframeKind::Cas | SubframeKind::Unicast => MbsfnDecision::Disabled,
        };
        TtiDecision { tti, sfn, subframe, kind, mbsfn }
    }

    /// Decision for the subframe received last
    pub fn current_decision(&self) -> Result<TtiDecision, LayerError> {
        match &self.state {
            AcquisitionState::Tracking { cell, tti } => Ok(self.decision_for(*tti, cell.carrier_mode)),
            other => Err(LayerError::InvalidState(format!("no TTI while {}", other.name()))),
        }
    }

    /// Change the PMCH bandwidth of the tracked cell
    pub fn set_nof_mbsfn_prb(&mut self, mbsfn_prb: u8) -> Result<(), LayerError> {
        let cell = match &self.state {
            AcquisitionState::Tracking { cell, .. } => cell.clone(),
            other => {
                return Err(LayerError::InvalidState(format!("no tracked cell while {}", other.name())));
            }
        };
        if cell.mbsfn_prb == mbsfn_prb {
            return Ok(());
        }

        let updated = cell.with_mbsfn_prb(mbsfn_prb);
        updated
            .validate()
            .map_err(|e| LayerError::ConfigInconsistency(e.to_string()))?;
        self.toolkit.configure(&updated).map_err(|e| {
            error!("Phy: failed to set cell: {}", e);
            LayerError::ToolkitConfigFailure(e.to_string())
        })?;

        info!("Phy: PMCH bandwidth {} PRB", mbsfn_prb);
        if let AcquisitionState::Tracking { cell, .. } = &mut self.state {
            *cell = Arc::new(updated);
        }
        Ok(())
    }

    /// Apply cell overrides of a newly published scheduling snapshot.
    ///
    /// Returns whether the tracked cell changed.
    pub fn apply_scheduling_updates(&mut self) -> Result<bool, LayerError> {
        if !self.state.is_tracking() {
            return Ok(false);
        }
        let snapshot = self.scheduler.snapshot();
        if snapshot.generation == self.applied_generation {
            return Ok(false);
        }

        // The generation stays pending until the toolkit accepted the cell
        let current = self.state.cell().map(|cell| cell.mbsfn_prb);
        let changed = match snapshot.mbsfn_prb_override {
            Some(prb) if current != Some(prb) => {
                self.set_nof_mbsfn_prb(prb)?;
                true
            }
            _ => false,
        };
        self.applied_generation = snapshot.generation;
        Ok(changed)
    }

    /// Telemetry view of the receiver
    pub fn status(&self) -> ModemStatus {
        ModemStatus::new(&self.state, self.cfo, &self.scheduler.snapshot())
    }
}
