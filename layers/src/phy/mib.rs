//! BCH Payload Unpacking
//!
//! Unpacks the 24 bit BCH transport block of the regular LTE MIB (mixed
//! carriers) and of MasterInformationBlock-MBMS-r14 (dedicated carriers),
//! and derives the system frame number from it.

use crate::LayerError;
use common::types::{CarrierMode, DlBandwidth};
use common::utils::time::MAX_SFN;
use interfaces::toolkit::{MibDecode, BCH_PAYLOAD_LEN};
use nom::bits::complete::take;
use nom::sequence::tuple;
use nom::IResult;

type BitInput<'a> = (&'a [u8], usize);

/// Variant specific MIB fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MibFields {
    /// MasterInformationBlock
    Lte {
        /// phich-Duration is extended
        phich_extended: bool,
        /// phich-Resource index (oneSixth, half, one, two)
        phich_resource: u8,
    },
    /// MasterInformationBlock-MBMS-r14
    Mbms {
        /// additionalNonMBSFNSubframes-r14
        additional_non_mbsfn_subframes: u8,
        /// schedulingInfoSIB1-MBMS-r14
        sib1_scheduling_info: u8,
        /// systemInfoValueTag-r14
        system_info_value_tag: u8,
    },
}

/// Unpacked MIB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MibInfo {
    /// dl-Bandwidth index as transmitted
    pub bandwidth_index: u8,
    /// SFN with the bits not carried in the MIB set to zero
    pub raw_sfn: u32,
    /// Remaining fields
    pub fields: MibFields,
}

impl MibInfo {
    /// Bandwidth in resource blocks, `None` for an undefined index
    pub fn nof_prb(&self) -> Option<u8> {
        DlBandwidth::from_index(self.bandwidth_index).map(|bw| bw.nof_prb())
    }
}

// dl-Bandwidth(3) phich-Duration(1) phich-Resource(2) systemFrameNumber(8)
fn lte_mib(input: BitInput<'_>) -> IResult<BitInput<'_>, (u8, u8, u8, u16)> {
    tuple((take(3usize), take(1usize), take(2usize), take(8usize)))(input)
}

// dl-Bandwidth-MBMS(3) systemFrameNumber(6) additionalNonMBSFNSubframes(2)
// schedulingInfoSIB1-MBMS(4) systemInfoValueTag(5)
fn mbms_mib(input: BitInput<'_>) -> IResult<BitInput<'_>, (u8, u16, u8, u8, u8)> {
    tuple((take(3usize), take(6usize), take(2usize), take(4usize), take(5usize)))(input)
}

/// Unpack a BCH payload according to the carrier mode
pub fn unpack_mib(payload: &[u8; BCH_PAYLOAD_LEN], mode: CarrierMode) -> Result<MibInfo, LayerError> {
    let input: BitInput<'_> = (&payload[..], 0);
    let decode_err = |e: nom::Err<nom::error::Error<BitInput<'_>>>| {
        LayerError::DecodeFailure(format!("short BCH payload: {:?}", e.map_input(|(_, bit)| bit)))
    };

    match mode {
        CarrierMode::Mixed => {
            let (_, (bw, duration, resource, sfn)) = lte_mib(input).map_err(decode_err)?;
            Ok(MibInfo {
                bandwidth_index: bw,
                raw_sfn: u32::from(sfn) << 2,
                fields: MibFields::Lte {
                    phich_extended: duration == 1,
                    phich_resource: resource,
                },
            })
        }
        CarrierMode::Dedicated => {
            let (_, (bw, sfn, additional, sib1, tag)) = mbms_mib(input).map_err(decode_err)?;
            Ok(MibInfo {
                bandwidth_index: bw,
                raw_sfn: u32::from(sfn) << 4,
                fields: MibFields::Mbms {
                    additional_non_mbsfn_subframes: additional,
                    sib1_scheduling_info: sib1,
                    system_info_value_tag: tag,
                },
            })
        }
    }
}

/// Apply the PBCH frame offset to the SFN carried in the MIB.
///
/// One offset unit is 4 frames on a dedicated carrier and 1 frame otherwise.
/// The result is reduced modulo 1024.
pub fn derive_sfn(raw_sfn: u32, frame_offset: i32, mode: CarrierMode) -> u32 {
    let sfn = i64::from(raw_sfn) + i64::from(frame_offset) * i64::from(mode.frame_offset_scale());
    sfn.rem_euclid(i64::from(MAX_SFN)) as u32
}

/// Unpack a decoded BCH and return the corrected system frame number
pub fn decode_sfn(mib: &MibDecode, mode: CarrierMode) -> Result<u32, LayerError> {
    let info = unpack_mib(&mib.payload, mode)?;
    Ok(derive_sfn(info.raw_sfn, mib.frame_offset, mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack (value, width) fields MSB first into a 24 bit payload
    fn payload(fields: &[(u32, u32)]) -> [u8; BCH_PAYLOAD_LEN] {
        let mut acc: u32 = 0;
        let mut used = 0;
        for &(value, width) in fields {
            acc = (acc << width) | (value & ((1 << width) - 1));
            used += width;
        }
        acc <<= 24 - used;
        [(acc >> 16) as u8, (acc >> 8) as u8, acc as u8]
    }

    #[test]
    fn test_unpack_lte_mib() {
        let bch = payload(&[(2, 3), (1, 1), (3, 2), (0xAB, 8)]);
        let mib = unpack_mib(&bch, CarrierMode::Mixed).unwrap();
        assert_eq!(mib.bandwidth_index, 2);
        assert_eq!(mib.nof_prb(), Some(25));
        assert_eq!(mib.raw_sfn, 0xAB << 2);
        assert_eq!(mib.fields, MibFields::Lte { phich_extended: true, phich_resource: 3 });
    }

    #[test]
    fn test_unpack_mbms_mib() {
        let bch = payload(&[(3, 3), (0b101101, 6), (2, 2), (5, 4), (17, 5)]);
        let mib = unpack_mib(&bch, CarrierMode::Dedicated).unwrap();
        assert_eq!(mib.nof_prb(), Some(50));
        assert_eq!(mib.raw_sfn, 45 << 4);
        assert_eq!(
            mib.fields,
            MibFields::Mbms {
                additional_non_mbsfn_subframes: 2,
                sib1_scheduling_info: 5,
                system_info_value_tag: 17,
            }
        );
    }

    #[test]
    fn test_undefined_bandwidth_index() {
        let bch = payload(&[(7, 3), (0, 6)]);
        let mib = unpack_mib(&bch, CarrierMode::Dedicated).unwrap();
        assert_eq!(mib.nof_prb(), None);
    }

    fn reference_sfn(raw: u32, offset: i32, k: i32) -> u32 {
        let mut sfn = raw as i32 + offset * k;
        while sfn < 0 {
            sfn += 1024;
        }
        (sfn % 1024) as u32
    }

    #[test]
    fn test_sfn_derivation_dedicated() {
        for raw in 0..1024 {
            for offset in -3..=3 {
                assert_eq!(
                    derive_sfn(raw, offset, CarrierMode::Dedicated),
                    reference_sfn(raw, offset, 4),
                    "raw {} offset {}",
                    raw,
                    offset
                );
            }
        }
    }

    #[test]
    fn test_sfn_derivation_mixed() {
        for raw in 0..1024 {
            for offset in 0..=1 {
                assert_eq!(derive_sfn(raw, offset, CarrierMode::Mixed), reference_sfn(raw, offset, 1));
            }
        }
        assert_eq!(derive_sfn(1023, 1, CarrierMode::Mixed), 0);
        assert_eq!(derive_sfn(1020, 3, CarrierMode::Dedicated), 8);
    }

    #[test]
    fn test_decode_sfn() {
        let bch = payload(&[(5, 3), (0, 1), (0, 2), (0xFF, 8)]);
        let mib = MibDecode { payload: bch, frame_offset: 2 };
        assert_eq!(decode_sfn(&mib, CarrierMode::Mixed).unwrap(), 1022);

        let bch = payload(&[(5, 3), (0b111111, 6)]);
        let mib = MibDecode { payload: bch, frame_offset: 3 };
        assert_eq!(decode_sfn(&mib, CarrierMode::Dedicated).unwrap(), (1008 + 12) % 1024);
    }
}
