//! Shared fixtures for the slave integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use modbus_slave::message::{ReadRegistersResponse, WriteMultipleResponse, WriteSingleRegister};
use modbus_slave::{
    calculate_crc, ExceptionCode, Request, RequestHandler, RequestPdu, Response, ResponsePdu,
};
use tokio::sync::Mutex;

/// Holding-register bank that counts every request it executes
pub struct RegisterBank {
    registers: Mutex<Vec<u16>>,
    calls: AtomicUsize,
}

impl RegisterBank {
    pub fn new(registers: Vec<u16>) -> Arc<Self> {
        Arc::new(Self {
            registers: Mutex::new(registers),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn registers(&self) -> Vec<u16> {
        self.registers.lock().await.clone()
    }

    fn read(bank: &[u16], start: u16, count: u16) -> Result<Vec<u16>, ExceptionCode> {
        let start = start as usize;
        let end = start + count as usize;
        bank.get(start..end)
            .map(<[u16]>::to_vec)
            .ok_or(ExceptionCode::IllegalDataAddress)
    }

    fn write(bank: &mut [u16], start: u16, values: &[u16]) -> Result<(), ExceptionCode> {
        let start = start as usize;
        let target = bank
            .get_mut(start..start + values.len())
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        target.copy_from_slice(values);
        Ok(())
    }
}

#[async_trait]
impl RequestHandler for RegisterBank {
    async fn execute(&self, request: &Request) -> Result<Response, ExceptionCode> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut bank = self.registers.lock().await;

        let pdu = match &request.pdu {
            RequestPdu::ReadHoldingRegisters(read) => {
                ResponsePdu::ReadHoldingRegisters(ReadRegistersResponse::new(Self::read(
                    &bank,
                    read.start_address,
                    read.number_of_points,
                )?))
            },
            RequestPdu::WriteSingleRegister(write) => {
                Self::write(&mut bank, write.address, &[write.value])?;
                ResponsePdu::WriteSingleRegister(WriteSingleRegister::new(
                    write.address,
                    write.value,
                ))
            },
            RequestPdu::WriteMultipleRegisters(write) => {
                Self::write(&mut bank, write.start_address, &write.registers)?;
                ResponsePdu::WriteMultipleRegisters(WriteMultipleResponse::new(
                    write.start_address,
                    write.number_of_points(),
                ))
            },
            // Write half lands before the read half is sampled
            RequestPdu::ReadWriteMultipleRegisters(composite) => {
                Self::write(&mut bank, composite.write.start_address, &composite.write.registers)?;
                ResponsePdu::ReadWriteMultipleRegisters(ReadRegistersResponse::new(Self::read(
                    &bank,
                    composite.read.start_address,
                    composite.read.number_of_points,
                )?))
            },
            _ => return Err(ExceptionCode::IllegalFunction),
        };
        Ok(Response::for_request(request, pdu))
    }
}

/// Message bytes followed by their little-endian CRC
pub fn rtu_frame(message: &[u8]) -> Vec<u8> {
    let mut frame = message.to_vec();
    frame.extend_from_slice(&calculate_crc(message).to_le_bytes());
    frame
}

/// MBAP header (protocol 0) followed by the message bytes
pub fn mbap_frame(transaction_id: u16, message: &[u8]) -> Vec<u8> {
    let mut frame = transaction_id.to_be_bytes().to_vec();
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&(message.len() as u16).to_be_bytes());
    frame.extend_from_slice(message);
    frame
}
