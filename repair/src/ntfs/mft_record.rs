// MFT FILE record header codec

use crate::ntfs::structures::*;
use byteorder::{ByteOrder, LittleEndian};
use ntfsmend_core::MendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MftRecordHeader {
    pub signature: u32,
    pub usa_offset: u16,
    pub usa_count: u16,
    pub lsn: u64,
    pub sequence_number: u16,
    pub hard_link_count: u16,
    pub first_attribute_offset: u16,
    pub flags: u16,
    pub used_size: u32,
    pub allocated_size: u32,
    pub base_record: u64,
    pub next_attribute_id: u16,
    pub record_number: u32,
}

impl MftRecordHeader {
    /// Signature check only; whether the record is in use is a separate question.
    pub fn is_valid(&self) -> bool {
        self.signature == MFT_RECORD_SIGNATURE
    }

    pub fn is_in_use(&self) -> bool {
        self.flags & MFT_RECORD_IN_USE != 0
    }

    pub fn is_directory(&self) -> bool {
        self.flags & MFT_RECORD_IS_DIRECTORY != 0
    }

    /// Signature bytes in on-disk order, e.g. `46494c45` for "FILE"
    pub fn signature_hex(&self) -> String {
        hex::encode(self.signature.to_le_bytes())
    }
}

pub fn decode_mft_record_header(bytes: &[u8]) -> Result<MftRecordHeader, MendError> {
    if bytes.len() < MFT_RECORD_HEADER_SIZE {
        return Err(MendError::Decode {
            structure: "MFT record header",
            needed: MFT_RECORD_HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    Ok(MftRecordHeader {
        signature: LittleEndian::read_u32(&bytes[MR_SIGNATURE..]),
        usa_offset: LittleEndian::read_u16(&bytes[MR_USA_OFFSET..]),
        usa_count: LittleEndian::read_u16(&bytes[MR_USA_COUNT..]),
        lsn: LittleEndian::read_u64(&bytes[MR_LSN..]),
        sequence_number: LittleEndian::read_u16(&bytes[MR_SEQUENCE_NUMBER..]),
        hard_link_count: LittleEndian::read_u16(&bytes[MR_HARD_LINK_COUNT..]),
        first_attribute_offset: LittleEndian::read_u16(&bytes[MR_FIRST_ATTRIBUTE..]),
        flags: LittleEndian::read_u16(&bytes[MR_FLAGS..]),
        used_size: LittleEndian::read_u32(&bytes[MR_USED_SIZE..]),
        allocated_size: LittleEndian::read_u32(&bytes[MR_ALLOCATED_SIZE..]),
        base_record: LittleEndian::read_u64(&bytes[MR_BASE_RECORD..]),
        next_attribute_id: LittleEndian::read_u16(&bytes[MR_NEXT_ATTRIBUTE_ID..]),
        record_number: LittleEndian::read_u32(&bytes[MR_RECORD_NUMBER..]),
    })
}

pub fn encode_mft_record_header(header: &MftRecordHeader, record: &mut [u8]) -> Result<(), MendError> {
    if record.len() < MFT_RECORD_HEADER_SIZE {
        return Err(MendError::Decode {
            structure: "MFT record header",
            needed: MFT_RECORD_HEADER_SIZE,
            actual: record.len(),
        });
    }

    LittleEndian::write_u32(&mut record[MR_SIGNATURE..], header.signature);
    LittleEndian::write_u16(&mut record[MR_USA_OFFSET..], header.usa_offset);
    LittleEndian::write_u16(&mut record[MR_USA_COUNT..], header.usa_count);
    LittleEndian::write_u64(&mut record[MR_LSN..], header.lsn);
    LittleEndian::write_u16(&mut record[MR_SEQUENCE_NUMBER..], header.sequence_number);
    LittleEndian::write_u16(&mut record[MR_HARD_LINK_COUNT..], header.hard_link_count);
    LittleEndian::write_u16(&mut record[MR_FIRST_ATTRIBUTE..], header.first_attribute_offset);
    LittleEndian::write_u16(&mut record[MR_FLAGS..], header.flags);
    LittleEndian::write_u32(&mut record[MR_USED_SIZE..], header.used_size);
    LittleEndian::write_u32(&mut record[MR_ALLOCATED_SIZE..], header.allocated_size);
    LittleEndian::write_u64(&mut record[MR_BASE_RECORD..], header.base_record);
    LittleEndian::write_u16(&mut record[MR_NEXT_ATTRIBUTE_ID..], header.next_attribute_id);
    LittleEndian::write_u32(&mut record[MR_RECORD_NUMBER..], header.record_number);
    Ok(())
}

pub fn mft_record_is_valid(header: &MftRecordHeader) -> bool {
    header.is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_signature_is_valid() {
        let mut data = vec![0u8; 48];
        data[0..4].copy_from_slice(&[0x46, 0x49, 0x4C, 0x45]);
        let header = decode_mft_record_header(&data).unwrap();

        assert_eq!(header.signature, 0x454C4946);
        assert!(mft_record_is_valid(&header));
        assert_eq!(header.signature_hex(), "46494c45");
    }

    #[test]
    fn test_other_signatures_are_invalid() {
        for sig in [b"BAAD", b"FILF", b"\0\0\0\0", b"ELIF"] {
            let mut data = vec![0u8; 48];
            data[0..4].copy_from_slice(sig);
            let header = decode_mft_record_header(&data).unwrap();
            assert!(!mft_record_is_valid(&header), "{:?} accepted", sig);
        }
    }

    #[test]
    fn test_decode_fields_and_flags() {
        let mut data = vec![0u8; 1024];
        data[0..4].copy_from_slice(b"FILE");
        data[0x04..0x06].copy_from_slice(&0x30u16.to_le_bytes());
        data[0x06..0x08].copy_from_slice(&3u16.to_le_bytes());
        data[0x08..0x10].copy_from_slice(&0x1122u64.to_le_bytes());
        data[0x10..0x12].copy_from_slice(&5u16.to_le_bytes());
        data[0x12..0x14].copy_from_slice(&1u16.to_le_bytes());
        data[0x14..0x16].copy_from_slice(&0x38u16.to_le_bytes());
        data[0x16..0x18].copy_from_slice(&0x0003u16.to_le_bytes());
        data[0x18..0x1C].copy_from_slice(&0x1A0u32.to_le_bytes());
        data[0x1C..0x20].copy_from_slice(&1024u32.to_le_bytes());
        data[0x20..0x28].copy_from_slice(&0u64.to_le_bytes());
        data[0x28..0x2A].copy_from_slice(&6u16.to_le_bytes());
        data[0x2C..0x30].copy_from_slice(&5u32.to_le_bytes());

        let header = decode_mft_record_header(&data).unwrap();
        assert_eq!(header.usa_offset, 0x30);
        assert_eq!(header.usa_count, 3);
        assert_eq!(header.lsn, 0x1122);
        assert_eq!(header.sequence_number, 5);
        assert_eq!(header.hard_link_count, 1);
        assert_eq!(header.first_attribute_offset, 0x38);
        assert_eq!(header.used_size, 0x1A0);
        assert_eq!(header.allocated_size, 1024);
        assert_eq!(header.base_record, 0);
        assert_eq!(header.next_attribute_id, 6);
        assert_eq!(header.record_number, 5);
        assert!(header.is_in_use());
        assert!(header.is_directory());

        let mut encoded = vec![0u8; 48];
        encode_mft_record_header(&header, &mut encoded).unwrap();
        assert_eq!(&encoded[..], &data[..48]);
    }

    #[test]
    fn test_in_use_is_independent_of_signature() {
        let mut data = vec![0u8; 48];
        data[0..4].copy_from_slice(b"FILE");
        let header = decode_mft_record_header(&data).unwrap();
        assert!(header.is_valid());
        assert!(!header.is_in_use());
        assert!(!header.is_directory());
    }

    #[test]
    fn test_too_short() {
        let err = decode_mft_record_header(&[0x46, 0x49, 0x4C, 0x45]).unwrap_err();
        assert!(matches!(err, MendError::Decode { needed: 48, actual: 4, .. }));
        assert!(encode_mft_record_header(&MftRecordHeader::default(), &mut [0u8; 47]).is_err());
    }
}
