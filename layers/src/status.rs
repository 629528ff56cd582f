//! Receiver Status
//!
//! Snapshot of the receiver state as reported to telemetry consumers.

use crate::phy::AcquisitionState;
use crate::rrc::ingest::{MchInfo, SchedulingSnapshot, DEFAULT_SUBCARRIER_SPACING_KHZ};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModemStatus {
    /// "searching", "syncing" or "synchronized"
    pub state: &'static str,
    /// PMCH bandwidth if it differs from the unicast one
    pub nof_prb: Option<u8>,
    pub cell_id: Option<u16>,
    /// Carrier frequency offset in Hz
    pub cfo: f32,
    /// MBSFN subcarrier spacing in kHz
    pub subcarrier_spacing: f32,
    pub mch_info: Vec<MchInfo>,
}

impl ModemStatus {
    pub fn new(state: &AcquisitionState, cfo: f32, snapshot: &SchedulingSnapshot) -> Self {
        let cell = state.cell();
        Self {
            state: state.name(),
            nof_prb: cell.map(|c| c.reported_nof_prb()),
            cell_id: cell.map(|c| c.pci.0),
            cfo,
            subcarrier_spacing: cell
                .map(|c| snapshot.mbsfn_subcarrier_spacing_khz(c.carrier_mode))
                .unwrap_or(DEFAULT_SUBCARRIER_SPACING_KHZ),
            mch_info: snapshot.mch_info.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrc::ingest::tests::{area, pmch};
    use crate::rrc::ConfigIngest;
    use common::mbsfn::{
        McchAllocation, McchMessage, McchRepetitionPeriod, MbsfnSubcarrierSpacing, MchSchedulingPeriod, Sib13,
    };
    use common::types::{CarrierMode, CellDescriptor, CyclicPrefix, DuplexMode, Pci};
    use std::sync::Arc;

    fn cell(carrier_mode: CarrierMode) -> Arc<CellDescriptor> {
        Arc::new(CellDescriptor {
            pci: Pci(7),
            duplex_mode: DuplexMode::Fdd,
            cyclic_prefix: CyclicPrefix::Extended,
            nof_prb: 25,
            nof_ports: 1,
            carrier_mode,
            mbsfn_prb: 15,
        })
    }

    #[test]
    fn test_searching_status() {
        let status = ModemStatus::new(&AcquisitionState::Searching, 0.0, &SchedulingSnapshot::default());
        assert_eq!(status.state, "searching");
        assert_eq!(status.nof_prb, None);
        assert_eq!(status.subcarrier_spacing, 15.0);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "searching");
        assert!(json["cell_id"].is_null());
    }

    #[test]
    fn test_synchronized_status() {
        let mut ingest = ConfigIngest::new();
        let mut info = area(McchRepetitionPeriod::Rf2, 0, McchAllocation::Legacy(1));
        info.subcarrier_spacing = Some(MbsfnSubcarrierSpacing::Khz2dot5);
        ingest.ingest_sib13(&Sib13 { area_info_list: vec![info] }).unwrap();
        ingest
            .ingest_mcch(&McchMessage { pmch_info_list: vec![pmch(5, 9, MchSchedulingPeriod::Rf16)] })
            .unwrap();
        let snapshot = ingest.snapshot();

        let state = AcquisitionState::Tracking { cell: cell(CarrierMode::Dedicated), tti: 0 };
        let status = ModemStatus::new(&state, 120.0, &snapshot);
        assert_eq!(status.state, "synchronized");
        assert_eq!(status.nof_prb, Some(15));
        assert_eq!(status.cell_id, Some(7));
        assert_eq!(status.subcarrier_spacing, 2.5);
        assert_eq!(status.mch_info.len(), 1);

        let state = AcquisitionState::Synchronizing { cell: cell(CarrierMode::Mixed), sfn: 0 };
        let status = ModemStatus::new(&state, 0.0, &snapshot);
        assert_eq!(status.state, "syncing");
        assert_eq!(status.subcarrier_spacing, 15.0);
    }
}
