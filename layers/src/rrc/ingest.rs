//! MBSFN Configuration Ingest
//!
//! Absorbs decoded SIB13 and MCCH messages, derives the scheduling state the
//! per-TTI decision needs and publishes it as an immutable snapshot. The
//! ingest is the only writer; readers hold a `watch::Receiver` and always
//! observe a whole snapshot.

use super::mcch_table::McchTable;
use crate::LayerError;
use common::mbsfn::{McchMessage, MbsfnSubcarrierSpacing, Sib13};
use common::types::{CarrierMode, MIN_PRB, MAX_PRB};
use interfaces::message_types::ControlMessage;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Highest PMCH data MCS (TS 36.213 table 7.1.7.1-1)
pub const MAX_DATA_MCS: u8 = 28;

/// Highest sf-AllocEnd value
pub const MAX_SF_ALLOC_END: u16 = 1535;

/// Subcarrier spacing of regular LTE subframes in kHz
pub const DEFAULT_SUBCARRIER_SPACING_KHZ: f32 = 15.0;

/// Scheduling parameters of the MBSFN area
#[derive(Debug, Clone, PartialEq)]
pub struct AreaScheduling {
    /// mbsfn-AreaId
    pub area_id: u8,
    /// MCCH repetition period in radio frames
    pub mcch_repetition_period: u32,
    /// MCCH offset in radio frames
    pub mcch_offset: u32,
    /// Length of the non-MBSFN region in OFDM symbols
    pub non_mbsfn_region_length: u8,
    /// MCS of MCCH and of MCH scheduling information
    pub signalling_mcs: u8,
    /// Subframes eligible for MCCH
    pub mcch_table: McchTable,
    /// MBSFN subcarrier spacing, absent for 15 kHz
    pub subcarrier_spacing: Option<MbsfnSubcarrierSpacing>,
}

/// Allocation window of one MCH within its scheduling period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelWindow {
    /// dataMCS
    pub data_mcs: u8,
    /// Scheduling period in radio frames
    pub scheduling_period: u32,
    /// Last MBSFN subframe of the period allocated to this MCH
    pub sf_alloc_end: u16,
}

/// An MTCH carried on an MCH
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MtchInfo {
    /// TMGI as 12 lowercase hex characters
    pub tmgi: String,
    /// Registered destination, empty if none
    pub dest: String,
    /// Logical channel id
    pub lcid: u8,
}

/// Published metadata of an MCH
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MchInfo {
    /// Data MCS
    pub mcs: u8,
    /// Services on this MCH
    pub mtchs: Vec<MtchInfo>,
}

/// Immutable view of the scheduling configuration
#[derive(Debug, Clone, Default)]
pub struct SchedulingSnapshot {
    /// Incremented on every publication
    pub generation: u64,
    /// Area from SIB13, `None` until MCCH is configured
    pub area: Option<AreaScheduling>,
    /// MCH windows in declaration order
    pub channels: Vec<ChannelWindow>,
    /// Per MCH service metadata, same order as `channels`
    pub mch_info: Vec<MchInfo>,
    /// PMCH bandwidth signalled in SIB13
    pub mbsfn_prb_override: Option<u8>,
}

impl SchedulingSnapshot {
    /// Whether SIB13 has been ingested
    pub fn is_mcch_configured(&self) -> bool {
        self.area.is_some()
    }

    /// Whether an MCCH message has been ingested
    pub fn is_mch_configured(&self) -> bool {
        !self.channels.is_empty()
    }

    /// Metadata of MCH `mch_index`
    pub fn mch(&self, mch_index: usize) -> Result<&MchInfo, LayerError> {
        self.mch_info.get(mch_index).ok_or(LayerError::IndexOutOfRange {
            what: "MCH",
            index: mch_index,
            len: self.mch_info.len(),
        })
    }

    /// The MTCH with logical channel `lcid` on MCH `mch_index`
    pub fn mtch(&self, mch_index: usize, lcid: u8) -> Result<&MtchInfo, LayerError> {
        let mch = self.mch(mch_index)?;
        mch.mtchs
            .iter()
            .find(|m| m.lcid == lcid)
            .ok_or(LayerError::IndexOutOfRange {
                what: "LCID",
                index: usize::from(lcid),
                len: mch.mtchs.len(),
            })
    }

    /// MBSFN subcarrier spacing in kHz. Only a dedicated carrier uses the
    /// reduced spacings.
    pub fn mbsfn_subcarrier_spacing_khz(&self, mode: CarrierMode) -> f32 {
        match (mode, self.area.as_ref().and_then(|a| a.subcarrier_spacing)) {
            (CarrierMode::Dedicated, Some(scs)) => scs.khz(),
            _ => DEFAULT_SUBCARRIER_SPACING_KHZ,
        }
    }
}

/// Single writer of the scheduling configuration
pub struct ConfigIngest {
    tx: watch::Sender<Arc<SchedulingSnapshot>>,
    generation: u64,
    area: Option<AreaScheduling>,
    mbsfn_prb_override: Option<u8>,
    mcch: Option<McchMessage>,
    destinations: BTreeMap<(usize, u8), String>,
}

impl Default for ConfigIngest {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigIngest {
    /// Create an ingest publishing an empty configuration
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(SchedulingSnapshot::default()));
        Self {
            tx,
            generation: 0,
            area: None,
            mbsfn_prb_override: None,
            mcch: None,
            destinations: BTreeMap::new(),
        }
    }

    /// A reader of the published snapshots
    pub fn subscribe(&self) -> watch::Receiver<Arc<SchedulingSnapshot>> {
        self.tx.subscribe()
    }

    /// The snapshot published last
    pub fn snapshot(&self) -> Arc<SchedulingSnapshot> {
        self.tx.borrow().clone()
    }

    /// Per MCH metadata of the current configuration
    pub fn mch_info(&self) -> Vec<MchInfo> {
        self.snapshot().mch_info.clone()
    }

    /// Dispatch a control feed message
    pub fn apply(&mut self, message: &ControlMessage) -> Result<(), LayerError> {
        match message {
            ControlMessage::Sib13(sib13) => self.ingest_sib13(sib13),
            ControlMessage::Mcch(mcch) => self.ingest_mcch(mcch),
            ControlMessage::Destination { mch_index, lcid, dest } => {
                self.set_destination(*mch_index, *lcid, dest.clone());
                Ok(())
            }
        }
    }

    /// Absorb SystemInformationBlockType13.
    ///
    /// Only the first MBSFN area is used.
    pub fn ingest_sib13(&mut self, sib13: &Sib13) -> Result<(), LayerError> {
        let info = sib13.area_info_list.first().ok_or_else(|| {
            LayerError::ConfigInconsistency("SIB13 carries no MBSFN area".to_string())
        })?;

        if sib13.area_info_list.len() > 1 {
            warn!(
                "SIB13 has {} MBSFN area info elements - only 1 supported",
                sib13.area_info_list.len()
            );
        }

        let mbsfn_prb_override = match info.pmch_bandwidth {
            Some(0) | None => None,
            Some(prb) if (MIN_PRB..=MAX_PRB).contains(&prb) => Some(prb),
            Some(prb) => {
                warn!("Ignoring PMCH bandwidth of {} PRB", prb);
                None
            }
        };

        let mcch_table = McchTable::from_allocation(info.mcch.allocation);
        debug!("MCCH table: {}", mcch_table);

        let area = AreaScheduling {
            area_id: info.area_id,
            mcch_repetition_period: info.mcch.repetition_period.frames(),
            mcch_offset: u32::from(info.mcch.offset),
            non_mbsfn_region_length: info.non_mbsfn_region_length.symbols(),
            signalling_mcs: info.mcch.signalling_mcs.value(),
            mcch_table,
            subcarrier_spacing: info.subcarrier_spacing,
        };

        if area.mcch_offset >= area.mcch_repetition_period {
            warn!(
                "MCCH offset {} not below repetition period {}, MCCH is never scheduled",
                area.mcch_offset, area.mcch_repetition_period
            );
        }

        info!(
            "SIB13: MBSFN area {}, MCCH every {} frames at offset {}, signalling MCS {}",
            area.area_id, area.mcch_repetition_period, area.mcch_offset, area.signalling_mcs
        );

        self.area = Some(area);
        if mbsfn_prb_override.is_some() {
            self.mbsfn_prb_override = mbsfn_prb_override;
        }
        self.publish();
        Ok(())
    }

    /// Absorb an MBSFNAreaConfiguration. The previous channel schedule is
    /// discarded.
    pub fn ingest_mcch(&mut self, mcch: &McchMessage) -> Result<(), LayerError> {
        // Out-of-range fields are clamped so channel indices stay aligned
        // with the sessions and destinations of the message
        let mut mcch = mcch.clone();
        for (i, pmch) in mcch.pmch_info_list.iter_mut().enumerate() {
            if pmch.data_mcs > MAX_DATA_MCS {
                warn!("PMCH {} data MCS {} out of range, using {}", i, pmch.data_mcs, MAX_DATA_MCS);
                pmch.data_mcs = MAX_DATA_MCS;
            }
            if pmch.sf_alloc_end > MAX_SF_ALLOC_END {
                warn!(
                    "PMCH {} sf-AllocEnd {} out of range, using {}",
                    i, pmch.sf_alloc_end, MAX_SF_ALLOC_END
                );
                pmch.sf_alloc_end = MAX_SF_ALLOC_END;
            }
        }

        if self.area.is_none() {
            warn!("MCCH received before SIB13, MCH decisions wait for the area configuration");
        }

        info!("MCCH: {} PMCH configured", mcch.pmch_info_list.len());
        for (i, pmch) in mcch.pmch_info_list.iter().enumerate() {
            debug!(
                "PMCH {}: MCS {}, period {} frames, sf-AllocEnd {}, {} sessions",
                i,
                pmch.data_mcs,
                pmch.scheduling_period.frames(),
                pmch.sf_alloc_end,
                pmch.sessions.len()
            );
        }

        self.mcch = Some(mcch);
        self.publish();
        Ok(())
    }

    /// Register the destination of the MTCH on (`mch_index`, `lcid`). May
    /// precede or follow the MCCH announcing the service.
    pub fn set_destination(&mut self, mch_index: usize, lcid: u8, dest: String) {
        info!("Destination for MCH {} LCID {}: {}", mch_index, lcid, dest);
        self.destinations.insert((mch_index, lcid), dest);
        self.publish();
    }

    /// Forget the area and channel configuration. Destinations are kept.
    pub fn reset(&mut self) {
        info!("Resetting MBSFN scheduling configuration");
        self.area = None;
        self.mcch = None;
        self.mbsfn_prb_override = None;
        self.publish();
    }

    fn publish(&mut self) {
        self.generation += 1;

        let (channels, mch_info) = match &self.mcch {
            Some(mcch) => mcch
                .pmch_info_list
                .iter()
                .enumerate()
                .map(|(i, pmch)| {
                    let window = ChannelWindow {
                        data_mcs: pmch.data_mcs,
                        scheduling_period: pmch.scheduling_period.frames(),
                        sf_alloc_end: pmch.sf_alloc_end,
                    };
                    let mtchs = pmch
                        .sessions
                        .iter()
                        .map(|s| MtchInfo {
                            tmgi: s.tmgi.to_hex(),
                            dest: self.destinations.get(&(i, s.lcid)).cloned().unwrap_or_default(),
                            lcid: s.lcid,
                        })
                        .collect();
                    (window, MchInfo { mcs: pmch.data_mcs, mtchs })
                })
                .unzip(),
            None => (Vec::new(), Vec::new()),
        };

        let snapshot = SchedulingSnapshot {
            generation: self.generation,
            area: self.area.clone(),
            channels,
            mch_info,
            mbsfn_prb_override: self.mbsfn_prb_override,
        };
        self.tx.send_replace(Arc::new(snapshot));
    }
}
