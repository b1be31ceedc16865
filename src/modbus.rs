//! Modbus TCP register link
//!
//! Hand-rolled client for the register-addressed TCP protocol the robot
//! controller speaks: MBAP-framed transactions carrying read-holding-register
//! and write-register PDUs against a configured unit id.
//!
//! Every transport error, malformed frame or device-reported exception
//! closes the session on the spot and surfaces as a [`RobotError`]; the next
//! operation reconnects lazily. No raw IO error escapes this module.

use crate::config::Config;
use crate::{Result, RobotError};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, error, info};

const MBAP_HEADER_LEN: usize = 7;
const PROTOCOL_ID: u16 = 0;

const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
const EXCEPTION_FLAG: u8 = 0x80;

/// Protocol limit on registers in one read transaction.
pub const MAX_READ_REGISTERS: u16 = 125;
/// Protocol limit on registers in one multi-register write.
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// Uniform register bus contract.
///
/// All device-library response shapes collapse into `Result` here; the
/// controller never sees a transport error in any other form.
pub trait RegisterLink: Send {
    /// Open the session if it is not already open. Idempotent.
    fn connect(&mut self) -> Result<()>;

    /// Read `count` consecutive holding registers starting at `address`.
    fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Write one holding register.
    fn write_register(&mut self, address: u16, value: u16) -> Result<()>;

    /// Write consecutive holding registers in a single transaction.
    fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()>;
}

/// Modbus TCP implementation of [`RegisterLink`].
pub struct ModbusLink {
    host: String,
    port: u16,
    unit_id: u8,
    connect_timeout: Duration,
    io_timeout: Duration,
    stream: Option<TcpStream>,
    transaction_id: u16,
}

impl ModbusLink {
    pub fn new(
        host: &str,
        port: u16,
        unit_id: u8,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Self {
        Self {
            host: host.to_string(),
            port,
            unit_id,
            connect_timeout,
            io_timeout,
            stream: None,
            transaction_id: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.robot.host,
            config.robot.port(),
            config.robot.unit_id(),
            config.connection.connect_timeout(),
            config.connection.io_timeout(),
        )
    }

    fn open_stream(&self) -> Result<TcpStream> {
        let address = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| {
                RobotError::Connection(format!(
                    "Failed to resolve {}:{}: {}",
                    self.host, self.port, e
                ))
            })?
            .next()
            .ok_or_else(|| {
                RobotError::Connection(format!("No address for {}:{}", self.host, self.port))
            })?;

        let stream = TcpStream::connect_timeout(&address, self.connect_timeout).map_err(|e| {
            RobotError::Connection(format!(
                "Failed to connect to {}:{}: {}",
                self.host, self.port, e
            ))
        })?;

        stream
            .set_read_timeout(Some(self.io_timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.io_timeout)))
            .and_then(|_| stream.set_nodelay(true))
            .map_err(|e| RobotError::Connection(format!("Failed to configure socket: {}", e)))?;

        Ok(stream)
    }

    /// Run one request/response exchange. Any failure closes the session.
    fn transaction(&mut self, request_pdu: &[u8]) -> Result<Vec<u8>> {
        match self.try_transaction(request_pdu) {
            Ok(pdu) => Ok(pdu),
            Err(e) => {
                error!("Register transaction failed, closing session: {}", e);
                self.stream = None;
                Err(e)
            }
        }
    }

    fn try_transaction(&mut self, request_pdu: &[u8]) -> Result<Vec<u8>> {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        let tid = self.transaction_id;
        let unit_id = self.unit_id;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| RobotError::Connection("Not connected".to_string()))?;

        let mut frame = Vec::with_capacity(MBAP_HEADER_LEN + request_pdu.len());
        frame.extend_from_slice(&tid.to_be_bytes());
        frame.extend_from_slice(&PROTOCOL_ID.to_be_bytes());
        frame.extend_from_slice(&((request_pdu.len() as u16 + 1).to_be_bytes()));
        frame.push(unit_id);
        frame.extend_from_slice(request_pdu);

        stream
            .write_all(&frame)
            .map_err(|e| RobotError::Connection(format!("Failed to send request: {}", e)))?;

        let mut header = [0u8; MBAP_HEADER_LEN];
        stream
            .read_exact(&mut header)
            .map_err(|e| RobotError::Connection(format!("Failed to read response header: {}", e)))?;

        let response_tid = u16::from_be_bytes([header[0], header[1]]);
        let protocol = u16::from_be_bytes([header[2], header[3]]);
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;

        if response_tid != tid {
            return Err(RobotError::Protocol(format!(
                "Transaction id mismatch: sent {}, got {}",
                tid, response_tid
            )));
        }
        if protocol != PROTOCOL_ID {
            return Err(RobotError::Protocol(format!(
                "Unexpected protocol id {}",
                protocol
            )));
        }
        if header[6] != unit_id {
            return Err(RobotError::Protocol(format!(
                "Unexpected unit id {} (configured {})",
                header[6], unit_id
            )));
        }
        if !(2..=254).contains(&length) {
            return Err(RobotError::Protocol(format!(
                "Invalid response length {}",
                length
            )));
        }

        let mut pdu = vec![0u8; length - 1];
        stream
            .read_exact(&mut pdu)
            .map_err(|e| RobotError::Connection(format!("Failed to read response body: {}", e)))?;

        if pdu[0] & EXCEPTION_FLAG != 0 {
            let code = pdu.get(1).copied().unwrap_or(0);
            return Err(RobotError::Protocol(format!(
                "Device exception {:#04x} ({}) for function {:#04x}",
                code,
                exception_name(code),
                pdu[0] & !EXCEPTION_FLAG
            )));
        }

        Ok(pdu)
    }

    /// Validate the echoed function code, closing the session on mismatch.
    fn expect_function(&mut self, pdu: &[u8], function: u8) -> Result<()> {
        if pdu.first() == Some(&function) {
            Ok(())
        } else {
            self.stream = None;
            Err(RobotError::Protocol(format!(
                "Response does not echo function {:#04x}",
                function
            )))
        }
    }
}

impl RegisterLink for ModbusLink {
    fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        info!(
            "Connecting to robot register server {}:{} (unit {})",
            self.host, self.port, self.unit_id
        );
        let stream = self.open_stream().map_err(|e| {
            error!("{}", e);
            e
        })?;
        self.stream = Some(stream);
        info!("Connected to robot register server");
        Ok(())
    }

    fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        if count == 0 || count > MAX_READ_REGISTERS {
            return Err(RobotError::Validation(format!(
                "Register read count {} out of range",
                count
            )));
        }
        self.connect()?;
        let pdu = self.transaction(&read_request(address, count))?;
        match parse_read_response(&pdu, count) {
            Ok(registers) => {
                debug!("Read {} registers at {}", count, address);
                Ok(registers)
            }
            Err(e) => {
                error!("Malformed read response, closing session: {}", e);
                self.stream = None;
                Err(e)
            }
        }
    }

    fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        self.connect()?;
        let pdu = self.transaction(&write_single_request(address, value))?;
        self.expect_function(&pdu, FC_WRITE_SINGLE_REGISTER)?;
        debug!("Wrote register {} = {:#06x}", address, value);
        Ok(())
    }

    fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        if values.is_empty() || values.len() > MAX_WRITE_REGISTERS as usize {
            return Err(RobotError::Validation(format!(
                "Register write count {} out of range",
                values.len()
            )));
        }
        self.connect()?;
        let pdu = self.transaction(&write_multiple_request(address, values))?;
        self.expect_function(&pdu, FC_WRITE_MULTIPLE_REGISTERS)?;
        debug!("Wrote {} registers at {}", values.len(), address);
        Ok(())
    }
}

fn read_request(address: u16, count: u16) -> Vec<u8> {
    let mut pdu = vec![FC_READ_HOLDING_REGISTERS];
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&count.to_be_bytes());
    pdu
}

fn write_single_request(address: u16, value: u16) -> Vec<u8> {
    let mut pdu = vec![FC_WRITE_SINGLE_REGISTER];
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&value.to_be_bytes());
    pdu
}

fn write_multiple_request(address: u16, values: &[u16]) -> Vec<u8> {
    let mut pdu = vec![FC_WRITE_MULTIPLE_REGISTERS];
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&(values.len() as u16).to_be_bytes());
    pdu.push((values.len() * 2) as u8);
    for value in values {
        pdu.extend_from_slice(&value.to_be_bytes());
    }
    pdu
}

fn parse_read_response(pdu: &[u8], count: u16) -> Result<Vec<u16>> {
    if pdu.first() != Some(&FC_READ_HOLDING_REGISTERS) {
        return Err(RobotError::Protocol(format!(
            "Response does not echo function {:#04x}",
            FC_READ_HOLDING_REGISTERS
        )));
    }
    let expected_bytes = count as usize * 2;
    if pdu.len() != 2 + expected_bytes || pdu[1] as usize != expected_bytes {
        return Err(RobotError::Protocol(format!(
            "Read response carries {} data bytes, expected {}",
            pdu.len().saturating_sub(2),
            expected_bytes
        )));
    }
    Ok(pdu[2..]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

fn exception_name(code: u8) -> &'static str {
    match code {
        0x01 => "illegal function",
        0x02 => "illegal data address",
        0x03 => "illegal data value",
        0x04 => "server device failure",
        0x05 => "acknowledge",
        0x06 => "server device busy",
        _ => "unknown exception",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_read_request_layout() {
        assert_eq!(read_request(560, 3), vec![0x03, 0x02, 0x30, 0x00, 0x03]);
    }

    #[test]
    fn test_write_single_request_layout() {
        assert_eq!(
            write_single_request(444, 1),
            vec![0x06, 0x01, 0xBC, 0x00, 0x01]
        );
    }

    #[test]
    fn test_write_multiple_request_layout() {
        assert_eq!(
            write_multiple_request(400, &[0xE666, 0x42F6]),
            vec![0x10, 0x01, 0x90, 0x00, 0x02, 0x04, 0xE6, 0x66, 0x42, 0xF6]
        );
    }

    #[test]
    fn test_parse_read_response() {
        let pdu = [0x03, 0x04, 0xE6, 0x66, 0x42, 0xF6];
        assert_eq!(
            parse_read_response(&pdu, 2).unwrap(),
            vec![0xE666, 0x42F6]
        );
    }

    #[test]
    fn test_parse_read_response_rejects_short_body() {
        let pdu = [0x03, 0x04, 0xE6, 0x66];
        assert!(matches!(
            parse_read_response(&pdu, 2),
            Err(RobotError::Protocol(_))
        ));
    }

    /// One-shot server: answers each request with the next canned PDU,
    /// echoing the client's transaction id.
    fn spawn_server(unit_id: u8, response_pdus: Vec<Vec<u8>>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            for pdu in response_pdus {
                let mut header = [0u8; MBAP_HEADER_LEN];
                if stream.read_exact(&mut header).is_err() {
                    return;
                }
                let request_len = u16::from_be_bytes([header[4], header[5]]) as usize;
                let mut request = vec![0u8; request_len - 1];
                if stream.read_exact(&mut request).is_err() {
                    return;
                }

                let mut frame = Vec::new();
                frame.extend_from_slice(&header[0..2]); // echo transaction id
                frame.extend_from_slice(&PROTOCOL_ID.to_be_bytes());
                frame.extend_from_slice(&((pdu.len() as u16 + 1).to_be_bytes()));
                frame.push(unit_id);
                frame.extend_from_slice(&pdu);
                if stream.write_all(&frame).is_err() {
                    return;
                }
            }
        });
        port
    }

    fn test_link(port: u16) -> ModbusLink {
        ModbusLink::new(
            "127.0.0.1",
            port,
            1,
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_read_registers_over_loopback() {
        let port = spawn_server(1, vec![vec![0x03, 0x04, 0xE6, 0x66, 0x42, 0xF6]]);
        let mut link = test_link(port);
        let registers = link.read_registers(0, 2).unwrap();
        assert_eq!(registers, vec![0xE666, 0x42F6]);
        assert_eq!(crate::codec::decode_float(&registers).unwrap(), 123.45);
        assert!(link.stream.is_some());
    }

    #[test]
    fn test_write_register_over_loopback() {
        let port = spawn_server(1, vec![vec![0x06, 0x01, 0xBC, 0x00, 0x01]]);
        let mut link = test_link(port);
        link.write_register(444, 1).unwrap();
    }

    #[test]
    fn test_device_exception_closes_session() {
        // Exception 0x02 (illegal data address) in response to a read.
        let port = spawn_server(1, vec![vec![0x83, 0x02]]);
        let mut link = test_link(port);
        let result = link.read_registers(9999, 2);
        assert!(matches!(result, Err(RobotError::Protocol(_))));
        assert!(link.stream.is_none());
    }

    #[test]
    fn test_connect_is_idempotent() {
        let port = spawn_server(1, vec![vec![0x06, 0x01, 0xBC, 0x00, 0x01]]);
        let mut link = test_link(port);
        link.connect().unwrap();
        link.connect().unwrap();
        link.write_register(444, 1).unwrap();
    }

    #[test]
    fn test_connect_failure_is_a_connection_error() {
        // Port from a listener we immediately drop: nothing is listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut link = test_link(port);
        assert!(matches!(
            link.connect(),
            Err(RobotError::Connection(_))
        ));
    }

    #[test]
    fn test_oversized_write_rejected_before_wire() {
        let mut link = test_link(1);
        let values = vec![0u16; MAX_WRITE_REGISTERS as usize + 1];
        assert!(matches!(
            link.write_registers(0, &values),
            Err(RobotError::Validation(_))
        ));
    }
}
