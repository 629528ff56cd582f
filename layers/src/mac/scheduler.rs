//! MBSFN Scheduler Implementation
//!
//! Decides per subframe whether MCCH or an MCH is transmitted and with which
//! MCS (3GPP TS 36.331 5.8, TS 36.321 5.12).

use crate::rrc::ingest::SchedulingSnapshot;
use common::types::CarrierMode;
use common::utils::time::split_tti;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Scheduling decision for one MBSFN subframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MbsfnDecision {
    /// Nothing to decode
    Disabled,
    /// MCCH opportunity
    Mcch {
        /// MBSFN area
        area_id: u8,
        /// Signalling MCS
        mcs: u8,
        /// Non-MBSFN region in OFDM symbols
        non_mbsfn_region_length: u8,
    },
    /// MCH transport block
    Mch {
        /// MBSFN area
        area_id: u8,
        /// Index of the MCH in declaration order
        channel_index: usize,
        /// Signalling MCS on the first subframe of the channel, data MCS otherwise
        mcs: u8,
        /// Non-MBSFN region in OFDM symbols
        non_mbsfn_region_length: u8,
    },
}

impl MbsfnDecision {
    /// Whether the PMCH of this subframe should be decoded
    pub fn is_enabled(&self) -> bool {
        !matches!(self, MbsfnDecision::Disabled)
    }

    /// Whether this is an MCCH subframe
    pub fn is_mcch(&self) -> bool {
        matches!(self, MbsfnDecision::Mcch { .. })
    }

    /// MCS to decode with
    pub fn mcs(&self) -> Option<u8> {
        match self {
            MbsfnDecision::Disabled => None,
            MbsfnDecision::Mcch { mcs, .. } | MbsfnDecision::Mch { mcs, .. } => Some(*mcs),
        }
    }

    /// Selected MCH
    pub fn channel_index(&self) -> Option<usize> {
        match self {
            MbsfnDecision::Mch { channel_index, .. } => Some(*channel_index),
            _ => None,
        }
    }
}

/// Position of subframe `sf` of frame `fn_in_period` among the MBSFN
/// subframes of a scheduling period. Negative for subframes ahead of the
/// first MBSFN subframe.
fn subframe_in_period(fn_in_period: u32, sf: u32, mode: CarrierMode) -> i64 {
    let fn_in_period = i64::from(fn_in_period);
    let sf = i64::from(sf);
    match mode {
        // Subframe 0 of every 4th frame is CAS
        CarrierMode::Dedicated => fn_in_period * 10 + sf - fn_in_period / 4 - 1,
        // Subframes 0, 4, 5 and 9 are not MBSFN
        CarrierMode::Mixed => fn_in_period * 6 + if sf < 6 { sf - 1 } else { sf - 3 },
    }
}

/// Decide what subframe `tti` carries under `snapshot`.
///
/// Pure and linear in the number of channels. Channels are tried in
/// declaration order and the first whose allocation reaches the subframe
/// wins.
pub fn schedule_for_tti(
    snapshot: &SchedulingSnapshot,
    mode: CarrierMode,
    tti: u32,
    decode_mcch: bool,
) -> MbsfnDecision {
    let Some(area) = snapshot.area.as_ref() else {
        return MbsfnDecision::Disabled;
    };

    let (sfn, sf) = split_tti(tti);

    if sfn % area.mcch_repetition_period == area.mcch_offset && area.mcch_table.contains(sf) {
        if !decode_mcch {
            trace!("TTI {}: MCCH decoding suppressed", tti);
            return MbsfnDecision::Disabled;
        }
        return MbsfnDecision::Mcch {
            area_id: area.area_id,
            mcs: area.signalling_mcs,
            non_mbsfn_region_length: area.non_mbsfn_region_length,
        };
    }

    for (i, channel) in snapshot.channels.iter().enumerate() {
        let fn_in_period = sfn % channel.scheduling_period;
        let sf_idx = subframe_in_period(fn_in_period, sf, mode);
        if sf_idx < 0 || sf_idx > i64::from(channel.sf_alloc_end) {
            continue;
        }

        let first_of_channel = if i == 0 {
            fn_in_period == 0 && sf == 1
        } else {
            i64::from(snapshot.channels[i - 1].sf_alloc_end) + 1 == sf_idx
        };

        let mcs = if first_of_channel {
            debug!("assigning sig_mcs {}, mch_idx is {}", area.signalling_mcs, i);
            area.signalling_mcs
        } else {
            debug!("assigning pmch_mcs {}, mch_idx is {}", channel.data_mcs, i);
            channel.data_mcs
        };

        return MbsfnDecision::Mch {
            area_id: area.area_id,
            channel_index: i,
            mcs,
            non_mbsfn_region_length: area.non_mbsfn_region_length,
        };
    }

    MbsfnDecision::Disabled
}

/// MBSFN scheduler reading the snapshots published by the configuration
/// ingest
pub struct MbsfnScheduler {
    rx: watch::Receiver<Arc<SchedulingSnapshot>>,
    decode_mcch: bool,
}

impl MbsfnScheduler {
    /// Create a new scheduler
    pub fn new(rx: watch::Receiver<Arc<SchedulingSnapshot>>, decode_mcch: bool) -> Self {
        Self { rx, decode_mcch }
    }

    /// Enable or suppress MCCH decoding
    pub fn set_decode_mcch(&mut self, decode_mcch: bool) {
        debug!("MCCH decoding {}", if decode_mcch { "enabled" } else { "disabled" });
        self.decode_mcch = decode_mcch;
    }

    /// Whether MCCH opportunities are reported
    pub fn decode_mcch(&self) -> bool {
        self.decode_mcch
    }

    /// The configuration currently in force
    pub fn snapshot(&self) -> Arc<SchedulingSnapshot> {
        self.rx.borrow().clone()
    }

    /// Decision for subframe `tti`
    pub fn decide(&self, tti: u32, mode: CarrierMode) -> MbsfnDecision {
        let snapshot = self.snapshot();
        schedule_for_tti(&snapshot, mode, tti, self.decode_mcch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrc::ingest::tests::{area, pmch};
    use crate::rrc::ingest::{ChannelWindow, ConfigIngest};
    use crate::rrc::McchTable;
    use common::mbsfn::{McchAllocation, McchMessage, McchRepetitionPeriod, MchSchedulingPeriod, Sib13};
    use common::utils::time::{tti, MAX_TTI};

    fn configured(period: McchRepetitionPeriod, offset: u8, allocation: McchAllocation) -> ConfigIngest {
        let mut ingest = ConfigIngest::new();
        ingest
            .ingest_sib13(&Sib13 { area_info_list: vec![area(period, offset, allocation)] })
            .unwrap();
        ingest
    }

    #[test]
    fn test_disabled_without_configuration() {
        let ingest = ConfigIngest::new();
        let scheduler = MbsfnScheduler::new(ingest.subscribe(), true);
        for t in 0..MAX_TTI {
            assert_eq!(scheduler.decide(t, CarrierMode::Dedicated), MbsfnDecision::Disabled);
            assert_eq!(scheduler.decide(t, CarrierMode::Mixed), MbsfnDecision::Disabled);
        }
    }

    #[test]
    fn test_mcch_repetition_and_offset() {
        let ingest = configured(McchRepetitionPeriod::Rf2, 0, McchAllocation::Legacy(0));
        let mut snapshot = (*ingest.snapshot()).clone();
        let mut entries = [false; 10];
        entries[0] = true;
        if let Some(area) = snapshot.area.as_mut() {
            area.mcch_table = McchTable::from_entries(entries);
        }

        let decision = schedule_for_tti(&snapshot, CarrierMode::Dedicated, tti(0, 0), true);
        assert_eq!(decision, MbsfnDecision::Mcch { area_id: 1, mcs: 2, non_mbsfn_region_length: 2 });
        assert!(decision.is_mcch());

        let decision = schedule_for_tti(&snapshot, CarrierMode::Dedicated, tti(1, 0), true);
        assert_eq!(decision, MbsfnDecision::Disabled);

        let decision = schedule_for_tti(&snapshot, CarrierMode::Dedicated, tti(2, 0), true);
        assert!(decision.is_mcch());
        assert!(!schedule_for_tti(&snapshot, CarrierMode::Dedicated, tti(2, 1), true).is_enabled());
    }

    #[test]
    fn test_mcch_decoding_policy() {
        let ingest = configured(McchRepetitionPeriod::Rf4, 1, McchAllocation::Legacy(0b100000));
        let mut scheduler = MbsfnScheduler::new(ingest.subscribe(), false);

        // sfn 5 % 4 == 1, subframe 1 is marked
        assert_eq!(scheduler.decide(tti(5, 1), CarrierMode::Mixed), MbsfnDecision::Disabled);
        scheduler.set_decode_mcch(true);
        assert_eq!(
            scheduler.decide(tti(5, 1), CarrierMode::Mixed),
            MbsfnDecision::Mcch { area_id: 1, mcs: 2, non_mbsfn_region_length: 2 }
        );
        assert_eq!(scheduler.decide(tti(6, 1), CarrierMode::Mixed), MbsfnDecision::Disabled);
        assert_eq!(scheduler.decide(tti(5, 2), CarrierMode::Mixed), MbsfnDecision::Disabled);
    }

    fn with_channels(windows: &[(u16, u8, MchSchedulingPeriod)]) -> ConfigIngest {
        let mut ingest = configured(McchRepetitionPeriod::Rf256, 255, McchAllocation::Legacy(0));
        let pmch_info_list = windows.iter().map(|&(end, mcs, period)| pmch(end, mcs, period)).collect();
        ingest.ingest_mcch(&McchMessage { pmch_info_list }).unwrap();
        ingest
    }

    #[test]
    fn test_dedicated_channel_windows() {
        let ingest = with_channels(&[(5, 10, MchSchedulingPeriod::Rf16), (12, 20, MchSchedulingPeriod::Rf16)]);
        let scheduler = MbsfnScheduler::new(ingest.subscribe(), true);
        let mode = CarrierMode::Dedicated;

        // Frame 0: subframe 1 is MBSFN subframe 0 of the period
        assert_eq!(
            scheduler.decide(tti(0, 1), mode),
            MbsfnDecision::Mch { area_id: 1, channel_index: 0, mcs: 2, non_mbsfn_region_length: 2 }
        );
        assert_eq!(scheduler.decide(tti(0, 2), mode).mcs(), Some(10));
        assert_eq!(scheduler.decide(tti(0, 6), mode).channel_index(), Some(0));

        // sf_idx 6 directly follows channel 0 and carries signalling
        let first = scheduler.decide(tti(0, 7), mode);
        assert_eq!(first.channel_index(), Some(1));
        assert_eq!(first.mcs(), Some(2));
        assert_eq!(scheduler.decide(tti(0, 8), mode).mcs(), Some(20));

        // Frame 1 starts at sf_idx 9: 10 + 0 - 0 - 1
        assert_eq!(scheduler.decide(tti(1, 3), mode).channel_index(), Some(1));
        assert_eq!(scheduler.decide(tti(1, 4), mode), MbsfnDecision::Disabled);

        // Frame 4 skips its CAS subframe: 40 + 1 - 1 - 1
        assert_eq!(subframe_in_period(4, 1, mode), 39);

        // A new scheduling period restarts the windows
        assert_eq!(scheduler.decide(tti(16, 1), mode).mcs(), Some(2));
        assert_eq!(scheduler.decide(tti(16, 2), mode).mcs(), Some(10));
    }

    #[test]
    fn test_mixed_channel_windows() {
        let ingest = with_channels(&[(2, 10, MchSchedulingPeriod::Rf8), (8, 20, MchSchedulingPeriod::Rf8)]);
        let scheduler = MbsfnScheduler::new(ingest.subscribe(), true);
        let mode = CarrierMode::Mixed;

        assert_eq!(subframe_in_period(0, 1, mode), 0);
        assert_eq!(subframe_in_period(0, 6, mode), 3);
        assert_eq!(subframe_in_period(1, 8, mode), 11);

        assert_eq!(scheduler.decide(tti(0, 1), mode).mcs(), Some(2));
        assert_eq!(scheduler.decide(tti(0, 3), mode).mcs(), Some(10));
        assert_eq!(scheduler.decide(tti(0, 6), mode).mcs(), Some(2));
        assert_eq!(scheduler.decide(tti(0, 6), mode).channel_index(), Some(1));
        assert_eq!(scheduler.decide(tti(1, 3), mode).mcs(), Some(20));
        assert_eq!(scheduler.decide(tti(1, 6), mode), MbsfnDecision::Disabled);
    }

    #[test]
    fn test_first_declared_channel_wins() {
        // Both windows cover sf_idx 0..=4
        let ingest = with_channels(&[(4, 7, MchSchedulingPeriod::Rf8), (9, 9, MchSchedulingPeriod::Rf8)]);
        let snapshot = ingest.snapshot();
        for sf in [2, 3] {
            let decision = schedule_for_tti(&snapshot, CarrierMode::Mixed, tti(0, sf), true);
            assert_eq!(decision.channel_index(), Some(0));
        }

        // Reversed declaration order flips the choice
        let ingest = with_channels(&[(9, 9, MchSchedulingPeriod::Rf8), (4, 7, MchSchedulingPeriod::Rf8)]);
        let decision = schedule_for_tti(&ingest.snapshot(), CarrierMode::Mixed, tti(0, 2), true);
        assert_eq!(decision.channel_index(), Some(0));
        assert_eq!(decision.mcs(), Some(9));
    }

    #[test]
    fn test_signalling_mcs_boundaries() {
        let snapshot = SchedulingSnapshot {
            channels: vec![
                ChannelWindow { data_mcs: 10, scheduling_period: 32, sf_alloc_end: 3 },
                ChannelWindow { data_mcs: 20, scheduling_period: 8, sf_alloc_end: 30 },
            ],
            ..(*with_channels(&[]).snapshot()).clone()
        };

        // Channel 0 uses signalling MCS only on subframe 1 of the first frame
        let decision = schedule_for_tti(&snapshot, CarrierMode::Dedicated, tti(0, 1), true);
        assert_eq!(decision.mcs(), Some(2));
        let decision = schedule_for_tti(&snapshot, CarrierMode::Dedicated, tti(0, 2), true);
        assert_eq!(decision.mcs(), Some(10));

        // Channel 1 starts right after sf_alloc_end 3 of channel 0
        let decision = schedule_for_tti(&snapshot, CarrierMode::Dedicated, tti(0, 5), true);
        assert_eq!((decision.channel_index(), decision.mcs()), (Some(1), Some(2)));
        let decision = schedule_for_tti(&snapshot, CarrierMode::Dedicated, tti(0, 6), true);
        assert_eq!(decision.mcs(), Some(20));

        // Channel 1 periods restart every 8 frames, channel 0 only every 32:
        // the start of channel 1's period is not a boundary
        let decision = schedule_for_tti(&snapshot, CarrierMode::Dedicated, tti(8, 1), true);
        assert_eq!((decision.channel_index(), decision.mcs()), (Some(1), Some(20)));
    }

    #[test]
    fn test_subframes_ahead_of_the_period() {
        let ingest = with_channels(&[(1535, 5, MchSchedulingPeriod::Rf1024)]);
        let snapshot = ingest.snapshot();
        // Dedicated subframe 0 of frame 0 is CAS and maps before the period
        assert_eq!(subframe_in_period(0, 0, CarrierMode::Dedicated), -1);
        assert_eq!(schedule_for_tti(&snapshot, CarrierMode::Dedicated, 0, true), MbsfnDecision::Disabled);
        // Mixed subframe 0 of a later frame maps onto the last MBSFN subframe
        // of the previous frame
        assert_eq!(subframe_in_period(3, 0, CarrierMode::Mixed), 17);
    }

    #[test]
    fn test_decision_is_idempotent() {
        let ingest = with_channels(&[(5, 10, MchSchedulingPeriod::Rf16), (12, 20, MchSchedulingPeriod::Rf16)]);
        let scheduler = MbsfnScheduler::new(ingest.subscribe(), true);
        for t in 0..2000 {
            let first = scheduler.decide(t, CarrierMode::Dedicated);
            let second = scheduler.decide(t, CarrierMode::Dedicated);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_scheduler_follows_new_snapshots() {
        let mut ingest = with_channels(&[(5, 10, MchSchedulingPeriod::Rf16)]);
        let scheduler = MbsfnScheduler::new(ingest.subscribe(), true);
        assert_eq!(scheduler.decide(tti(0, 3), CarrierMode::Dedicated).mcs(), Some(10));

        ingest
            .ingest_mcch(&McchMessage { pmch_info_list: vec![pmch(5, 17, MchSchedulingPeriod::Rf16)] })
            .unwrap();
        assert_eq!(scheduler.decide(tti(0, 3), CarrierMode::Dedicated).mcs(), Some(17));

        ingest.reset();
        assert_eq!(scheduler.decide(tti(0, 3), CarrierMode::Dedicated), MbsfnDecision::Disabled);
    }

    #[test]
    fn test_decision_json() {
        let decision = MbsfnDecision::Mch { area_id: 1, channel_index: 0, mcs: 9, non_mbsfn_region_length: 2 };
        let json = serde_json::to_value(decision).unwrap();
        assert_eq!(json["kind"], "mch");
        assert_eq!(json["mcs"], 9);
        assert_eq!(serde_json::to_value(MbsfnDecision::Disabled).unwrap()["kind"], "disabled");
    }
}
