//! Scripted register bus for tests
//!
//! Stands in for the Modbus link: reads pop scripted responses in order,
//! writes are recorded for inspection, and failures can be injected per
//! write address or per read.

use crate::codec;
use crate::modbus::RegisterLink;
use crate::{Result, RobotError};
use std::collections::VecDeque;

pub(crate) struct MockLink {
    pub connected: bool,
    pub fail_connect: bool,
    pub reads: VecDeque<Result<Vec<u16>>>,
    pub writes: Vec<(u16, Vec<u16>)>,
    pub fail_write_addresses: Vec<u16>,
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            connected: false,
            fail_connect: false,
            reads: VecDeque::new(),
            writes: Vec::new(),
            fail_write_addresses: Vec::new(),
        }
    }

    pub fn push_read(&mut self, registers: Vec<u16>) {
        self.reads.push_back(Ok(registers));
    }

    pub fn push_read_error(&mut self) {
        self.reads
            .push_back(Err(RobotError::Connection("scripted read failure".to_string())));
    }

    /// Script one full status poll: the three status registers followed by
    /// the GV0 test value pair.
    pub fn push_status(&mut self, mode: u16, run_status: u16, alarm_code: u16) {
        self.push_read(vec![mode, run_status, alarm_code]);
        self.push_read(codec::encode_float(0.0).to_vec());
    }
}

impl RegisterLink for MockLink {
    fn connect(&mut self) -> Result<()> {
        if self.fail_connect {
            return Err(RobotError::Connection("scripted connect failure".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    fn read_registers(&mut self, _address: u16, _count: u16) -> Result<Vec<u16>> {
        self.reads
            .pop_front()
            .unwrap_or_else(|| Err(RobotError::Connection("read script exhausted".to_string())))
    }

    fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        self.write_registers(address, &[value])
    }

    fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        if self.fail_write_addresses.contains(&address) {
            return Err(RobotError::Connection(format!(
                "scripted write failure at register {}",
                address
            )));
        }
        self.writes.push((address, values.to_vec()));
        Ok(())
    }
}
