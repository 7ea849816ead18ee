// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! S7 communication over ISO-on-TCP (RFC 1006)
//!
//! Only the subset needed to read a data block is implemented:
//!
//! 1. COTP connection request, with the remote TSAP derived from rack and slot
//! 2. S7 "setup communication" to negotiate the PDU size
//! 3. S7 "read var" jobs on the DB area, split to fit the negotiated PDU
//!
//! Every message is wrapped in a TPKT header (`03 00 len_hi len_lo`) and, once
//! the COTP session exists, a 3-byte COTP data header (`02 F0 80`).

use async_trait::async_trait;
use log::{debug, info};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::error::{ConnectError, PlcError, ReadError};
use super::PlcTransport;
use crate::config::PlcConfig;

/// ISO-on-TCP port
pub const ISO_TCP_PORT: u16 = 102;

const TPKT_VERSION: u8 = 0x03;
const TPKT_HEADER_LEN: usize = 4;
const COTP_CONNECT_REQUEST: u8 = 0xE0;
const COTP_CONNECT_CONFIRM: u8 = 0xD0;
const COTP_DATA: u8 = 0xF0;
const S7_PROTOCOL_ID: u8 = 0x32;
const ROSCTR_JOB: u8 = 0x01;
const ROSCTR_ACK_DATA: u8 = 0x03;
const FUNCTION_SETUP: u8 = 0xF0;
const FUNCTION_READ_VAR: u8 = 0x04;
const AREA_DB: u8 = 0x84;
const TRANSPORT_SIZE_BYTE: u8 = 0x02;
const ITEM_SUCCESS: u8 = 0xFF;

/// Offset of the first parameter byte in an ack-data frame
const ACK_PARAMS: usize = 19;
/// Offset of the first payload byte of the first item in a read-var response
const READ_DATA: usize = 25;

/// PDU size requested during setup
pub const REQUESTED_PDU_LENGTH: u16 = 480;

/// Header and parameter bytes of a read-var response around the payload
const READ_RESPONSE_OVERHEAD: usize = 18;

/// COTP connection request for the given rack and slot (22 bytes)
pub fn connection_request(rack: u8, slot: u8) -> Vec<u8> {
    let remote_tsap = (rack << 5) | (slot & 0x1F);
    tpkt(&[
        0x11, // length indicator
        COTP_CONNECT_REQUEST,
        0x00,
        0x00, // destination reference
        0x00,
        0x01, // source reference
        0x00, // class 0
        0xC0,
        0x01,
        0x0A, // TPDU size 1024
        0xC1,
        0x02,
        0x01,
        0x00, // local TSAP
        0xC2,
        0x02,
        0x01, // PG connection
        remote_tsap,
    ])
}

/// S7 setup communication job (25 bytes)
pub fn setup_communication(pdu_ref: u16, pdu_length: u16) -> Vec<u8> {
    let [len_hi, len_lo] = pdu_length.to_be_bytes();
    s7_job(
        pdu_ref,
        &[FUNCTION_SETUP, 0x00, 0x00, 0x01, 0x00, 0x01, len_hi, len_lo],
    )
}

/// S7 read var job for one byte range of a data block (31 bytes)
pub fn read_var_request(pdu_ref: u16, db_number: u16, start: usize, length: u16) -> Vec<u8> {
    let bit_address = (start as u32) * 8;
    let [len_hi, len_lo] = length.to_be_bytes();
    let [db_hi, db_lo] = db_number.to_be_bytes();
    s7_job(
        pdu_ref,
        &[
            FUNCTION_READ_VAR,
            0x01, // item count
            0x12, // variable specification
            0x0A, // remaining item length
            0x10, // S7ANY syntax
            TRANSPORT_SIZE_BYTE,
            len_hi,
            len_lo,
            db_hi,
            db_lo,
            AREA_DB,
            (bit_address >> 16) as u8,
            (bit_address >> 8) as u8,
            bit_address as u8,
        ],
    )
}

fn tpkt(payload: &[u8]) -> Vec<u8> {
    let length = (payload.len() + TPKT_HEADER_LEN) as u16;
    let mut frame = Vec::with_capacity(length as usize);
    frame.extend_from_slice(&[TPKT_VERSION, 0x00]);
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn s7_job(pdu_ref: u16, params: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x02, COTP_DATA, 0x80, S7_PROTOCOL_ID, ROSCTR_JOB, 0x00, 0x00];
    payload.extend_from_slice(&pdu_ref.to_be_bytes());
    payload.extend_from_slice(&(params.len() as u16).to_be_bytes());
    payload.extend_from_slice(&[0x00, 0x00]); // no data part
    payload.extend_from_slice(params);
    tpkt(&payload)
}

/// Read one complete TPKT frame, header included
pub async fn read_tpkt<S: AsyncRead + Unpin>(stream: &mut S) -> std::io::Result<Vec<u8>> {
    let mut header = [0u8; TPKT_HEADER_LEN];
    stream.read_exact(&mut header).await?;
    if header[0] != TPKT_VERSION {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unexpected TPKT version 0x{:02X}", header[0]),
        ));
    }
    let length = u16::from_be_bytes([header[2], header[3]]) as usize;
    if length < TPKT_HEADER_LEN + 3 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("TPKT length {} too small", length),
        ));
    }
    let mut frame = vec![0u8; length];
    frame[..TPKT_HEADER_LEN].copy_from_slice(&header);
    stream.read_exact(&mut frame[TPKT_HEADER_LEN..]).await?;
    Ok(frame)
}

fn check_ack_data(frame: &[u8]) -> Result<(), ReadError> {
    if frame.len() < ACK_PARAMS + 2 || frame[7] != S7_PROTOCOL_ID {
        return Err(ReadError::Protocol("not an S7 frame".to_string()));
    }
    if frame[8] != ROSCTR_ACK_DATA {
        return Err(ReadError::Protocol(format!(
            "unexpected ROSCTR 0x{:02X}",
            frame[8]
        )));
    }
    let (class, code) = (frame[17], frame[18]);
    if class != 0 || code != 0 {
        return Err(ReadError::Device {
            code: u16::from_be_bytes([class, code]),
            reason: "S7 header error",
        });
    }
    Ok(())
}

/// Negotiated PDU length from a setup communication acknowledgement
pub fn parse_setup_ack(frame: &[u8]) -> Result<u16, ReadError> {
    check_ack_data(frame)?;
    if frame.len() < ACK_PARAMS + 8 || frame[ACK_PARAMS] != FUNCTION_SETUP {
        return Err(ReadError::Protocol(
            "setup communication not acknowledged".to_string(),
        ));
    }
    Ok(u16::from_be_bytes([
        frame[ACK_PARAMS + 6],
        frame[ACK_PARAMS + 7],
    ]))
}

/// Payload of a single-item read var response, checked against `expected` bytes
pub fn parse_read_response(frame: &[u8], expected: usize) -> Result<Vec<u8>, ReadError> {
    check_ack_data(frame)?;
    if frame.len() < READ_DATA || frame[ACK_PARAMS] != FUNCTION_READ_VAR {
        return Err(ReadError::Protocol("read var not acknowledged".to_string()));
    }

    let return_code = frame[21];
    if return_code != ITEM_SUCCESS {
        return Err(ReadError::Device {
            code: return_code as u16,
            reason: item_error_reason(return_code),
        });
    }

    let raw_length = u16::from_be_bytes([frame[23], frame[24]]) as usize;
    // Bit, byte and integer transport sizes announce their length in bits
    let length = match frame[22] {
        0x03..=0x05 => raw_length / 8,
        _ => raw_length,
    };
    if length != expected {
        return Err(ReadError::Protocol(format!(
            "expected {} bytes, device sent {}",
            expected, length
        )));
    }
    frame
        .get(READ_DATA..READ_DATA + length)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| ReadError::Protocol("truncated read var response".to_string()))
}

fn item_error_reason(code: u8) -> &'static str {
    match code {
        0x01 => "hardware fault",
        0x03 => "access denied",
        0x05 => "address out of range",
        0x06 => "data type not supported",
        0x07 => "data type inconsistent",
        0x0A => "object does not exist",
        _ => "unknown item error",
    }
}

/// Data block reader speaking S7 over ISO-on-TCP
pub struct S7Transport {
    address: String,
    port: u16,
    rack: u8,
    slot: u8,
    stream: Option<TcpStream>,
    pdu_length: u16,
    pdu_ref: u16,
}

impl S7Transport {
    pub fn new(address: impl Into<String>, port: u16, rack: u8, slot: u8) -> Self {
        Self {
            address: address.into(),
            port,
            rack,
            slot,
            stream: None,
            pdu_length: REQUESTED_PDU_LENGTH,
            pdu_ref: 0,
        }
    }

    pub fn from_config(config: &PlcConfig) -> Self {
        Self::new(
            config.address.clone(),
            config.effective_port(),
            config.rack,
            config.slot,
        )
    }

    /// PDU length accepted by the device during the last setup
    pub fn pdu_length(&self) -> u16 {
        self.pdu_length
    }

    fn io_error(&self, source: std::io::Error) -> PlcError {
        ConnectError::Io {
            address: self.endpoint(),
            source,
        }
        .into()
    }
}

#[async_trait]
impl PlcTransport for S7Transport {
    async fn connect(&mut self) -> Result<(), PlcError> {
        self.disconnect().await;

        let endpoint = self.endpoint();
        let mut stream = TcpStream::connect(&endpoint)
            .await
            .map_err(|e| self.io_error(e))?;
        stream.set_nodelay(true).map_err(|e| self.io_error(e))?;

        stream
            .write_all(&connection_request(self.rack, self.slot))
            .await
            .map_err(|e| self.io_error(e))?;
        let confirm = read_tpkt(&mut stream).await.map_err(|e| self.io_error(e))?;
        if confirm.get(5) != Some(&COTP_CONNECT_CONFIRM) {
            return Err(ConnectError::Rejected(format!(
                "COTP connection refused for rack {} slot {}",
                self.rack, self.slot
            ))
            .into());
        }

        stream
            .write_all(&setup_communication(0, REQUESTED_PDU_LENGTH))
            .await
            .map_err(|e| self.io_error(e))?;
        let ack = read_tpkt(&mut stream).await.map_err(|e| self.io_error(e))?;
        let pdu_length = parse_setup_ack(&ack)
            .map_err(|e| ConnectError::Rejected(format!("setup communication failed: {}", e)))?;
        if (pdu_length as usize) <= READ_RESPONSE_OVERHEAD {
            return Err(ConnectError::Rejected(format!(
                "negotiated PDU length {} is unusable",
                pdu_length
            ))
            .into());
        }

        info!(
            "S7 session open with {} (rack {}, slot {}, PDU {} bytes)",
            endpoint, self.rack, self.slot, pdu_length
        );
        self.pdu_length = pdu_length;
        self.pdu_ref = 0;
        self.stream = Some(stream);
        Ok(())
    }

    async fn read_area(
        &mut self,
        db_number: u16,
        start: u16,
        length: u16,
    ) -> Result<Vec<u8>, PlcError> {
        let max_chunk = self.pdu_length as usize - READ_RESPONSE_OVERHEAD;
        let stream = self.stream.as_mut().ok_or(ReadError::NotConnected)?;

        let total = length as usize;
        let mut data = Vec::with_capacity(total);
        while data.len() < total {
            let chunk = max_chunk.min(total - data.len());
            let offset = start as usize + data.len();
            self.pdu_ref = self.pdu_ref.wrapping_add(1);
            debug!(
                "S7 read DB{}.DBB{} length {} (ref {})",
                db_number, offset, chunk, self.pdu_ref
            );

            stream
                .write_all(&read_var_request(
                    self.pdu_ref,
                    db_number,
                    offset,
                    chunk as u16,
                ))
                .await
                .map_err(ReadError::Io)?;
            let frame = read_tpkt(stream).await.map_err(ReadError::Io)?;
            data.extend_from_slice(&parse_read_response(&frame, chunk)?);
        }
        Ok(data)
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("S7 socket shutdown for {}: {}", self.endpoint(), e);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
