//! Read/Write Multiple Registers (FC23)
//!
//! The request owns two sub-messages cut from disjoint ranges of one frame:
//!
//! ```text
//! [slave][0x17][read start][read qty][write start][write qty][count][data..]
//!   0      1     2..4        4..6      6..8         8..10      10     11..
//! ```
//!
//! Each range gets the `[slave, fc]` header prepended and goes through the
//! generic decoder for its own type, so the size checks of both sub-messages
//! apply unchanged.

use bytes::BytesMut;
use errors::{ModbusError, ModbusResult};

use super::{create_message, PduCodec, ReadRequest, WriteMultipleRegistersRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWriteMultipleRegistersRequest {
    pub read: ReadRequest,
    pub write: WriteMultipleRegistersRequest,
}

impl ReadWriteMultipleRegistersRequest {
    pub fn new(read: ReadRequest, write: WriteMultipleRegistersRequest) -> Self {
        Self { read, write }
    }

    fn sub_frame(header: &[u8], body: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(header.len() + body.len());
        frame.extend_from_slice(header);
        frame.extend_from_slice(body);
        frame
    }
}

impl PduCodec for ReadWriteMultipleRegistersRequest {
    const MINIMUM_FRAME_SIZE: usize = 11;

    fn decode(frame: &[u8]) -> ModbusResult<Self> {
        let expected = Self::MINIMUM_FRAME_SIZE + frame[10] as usize;
        if frame.len() < expected {
            return Err(ModbusError::too_short(expected, frame.len()));
        }

        let header = &frame[..2];
        let read = create_message::<ReadRequest>(&Self::sub_frame(header, &frame[2..6]))?;
        let write = create_message::<WriteMultipleRegistersRequest>(&Self::sub_frame(
            header,
            &frame[6..expected],
        ))?;

        Ok(Self { read, write })
    }

    fn encode(&self, buf: &mut BytesMut) {
        // Sub-messages encode without their function code, so the fields
        // splice directly after the composite's own header.
        self.read.encode(buf);
        self.write.encode(buf);
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    const FRAME: [u8; 15] = [
        0x01, 0x17, // header
        0x00, 0x03, 0x00, 0x06, // read 6 from 3
        0x00, 0x0E, 0x00, 0x02, 0x04, // write 2 at 14, 4 bytes
        0x00, 0xFF, 0x01, 0x00,
    ];

    #[test]
    fn test_decode_splits_ranges() {
        let request: ReadWriteMultipleRegistersRequest = create_message(&FRAME).unwrap();
        assert_eq!(request.read, ReadRequest::new(3, 6));
        assert_eq!(request.write.start_address, 14);
        assert_eq!(request.write.registers, vec![0x00FF, 0x0100]);
    }

    #[test]
    fn test_encode_read_fields_first() {
        // Write address below read address must not change the order
        let request = ReadWriteMultipleRegistersRequest::new(
            ReadRequest::new(0x0100, 1),
            WriteMultipleRegistersRequest::new(0x0001, vec![0xABCD]),
        );
        let mut buf = BytesMut::new();
        request.encode(&mut buf);
        assert_eq!(
            &buf[..],
            &[0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x02, 0xAB, 0xCD]
        );
    }

    #[test]
    fn test_decode_missing_write_data() {
        let err = create_message::<ReadWriteMultipleRegistersRequest>(&FRAME[..13]).unwrap_err();
        assert_eq!(err, ModbusError::too_short(15, 13));
    }

    #[test]
    fn test_decode_below_minimum() {
        let err = create_message::<ReadWriteMultipleRegistersRequest>(&FRAME[..10]).unwrap_err();
        assert_eq!(err, ModbusError::too_short(11, 10));
    }
}
