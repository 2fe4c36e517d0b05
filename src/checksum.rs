//! Checksum algorithms used on the wire.
//!
//! Every transfer chunk carries a CRC-16/Modbus over the direction that
//! generated the bytes; file metadata reports a whole-file CRC-32 (the
//! standard reflected polynomial).

use crc::CRC_16_MODBUS;
use crc::CRC_32_ISO_HDLC;
use crc::Crc;

pub(crate) const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);
pub(crate) const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-16/Modbus over one chunk frame.
pub(crate) fn crc16_modbus(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
