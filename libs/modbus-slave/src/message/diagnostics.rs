use bytes::{BufMut, BytesMut};
use errors::ModbusResult;

use super::PduCodec;

/// Return Query Data sub-function; the slave echoes the data word
pub const RETURN_QUERY_DATA: u16 = 0x0000;

/// Diagnostics (FC08): sub-function + one data word, same layout both ways
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    pub sub_function: u16,
    pub data: u16,
}

impl Diagnostics {
    pub fn new(sub_function: u16, data: u16) -> Self {
        Self { sub_function, data }
    }
}

impl PduCodec for Diagnostics {
    const MINIMUM_FRAME_SIZE: usize = 6;

    fn decode(frame: &[u8]) -> ModbusResult<Self> {
        Ok(Self {
            sub_function: u16::from_be_bytes([frame[2], frame[3]]),
            data: u16::from_be_bytes([frame[4], frame[5]]),
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.sub_function);
        buf.put_u16(self.data);
    }
}
