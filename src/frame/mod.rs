// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

/// Vendor specific function code of the block write request.
///
/// Taken from the user defined function code range (`65` - `72`).
pub const WRITE_BLOCK_FN_CODE: u8 = 0x41;

/// Smallest possible PDU: the function code alone.
pub const MIN_PDU_LEN: usize = 1;

/// Largest possible Modbus PDU.
pub const MAX_PDU_LEN: usize = 253;

/// Function code + block address + byte count.
pub const WRITE_BLOCK_HEADER_LEN: usize = 7;

/// Length of the data following the function code in a block write response.
pub const WRITE_BLOCK_RESPONSE_DATA_LEN: usize = 2;

/// A Modbus function code.
///
/// It is represented by an unsigned 8 bit integer.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    /// Vendor specific block write: `65` (`0x41`).
    WriteBlock,

    /// Custom Modbus Function Code.
    Custom(u8),
}

impl FunctionCode {
    /// Create a new [`FunctionCode`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            WRITE_BLOCK_FN_CODE => Self::WriteBlock,
            code => Self::Custom(code),
        }
    }

    /// Get the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::WriteBlock => WRITE_BLOCK_FN_CODE,
            Self::Custom(code) => code,
        }
    }

    /// The function code a slave answers with when it rejects this function.
    #[must_use]
    pub const fn exception_value(self) -> u8 {
        self.value() | 0x80
    }
}

impl From<u8> for FunctionCode {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<FunctionCode> for u8 {
    fn from(code: FunctionCode) -> Self {
        code.value()
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// Slave ID
pub type SlaveId = u8;

/// Address in the memory space of the slave (e.g. a flash offset).
pub type BlockAddress = u32;

/// Number of bytes to write or written (`0` - `65535`).
pub type ByteCount = u16;

/// A block write request: `data` is written to the slave memory at `address`.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBlock<'d> {
    pub address: BlockAddress,
    pub data: &'d [u8],
}

impl WriteBlock<'_> {
    /// Number of bytes following the function code.
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        WRITE_BLOCK_HEADER_LEN - 1 + self.data.len()
    }

    /// Number of bytes required for a serialized PDU frame.
    #[must_use]
    pub const fn pdu_len(&self) -> usize {
        WRITE_BLOCK_HEADER_LEN + self.data.len()
    }
}

/// The acknowledgement of a block write.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBlockResponse {
    /// Number of bytes the slave has written.
    pub written: ByteCount,
}

impl WriteBlockResponse {
    /// Number of bytes required for a serialized PDU frame.
    #[must_use]
    pub const fn pdu_len(&self) -> usize {
        MIN_PDU_LEN + WRITE_BLOCK_RESPONSE_DATA_LEN
    }
}

/// A server (slave) exception response.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: FunctionCode,
    pub exception: Exception,
}

/// A server (slave) exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDevice = 0x0B,
}

impl Exception {
    const fn get_name(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal function",
            Self::IllegalDataAddress => "Illegal data address",
            Self::IllegalDataValue => "Illegal data value",
            Self::ServerDeviceFailure => "Server device failure",
            Self::Acknowledge => "Acknowledge",
            Self::ServerDeviceBusy => "Server device busy",
            Self::MemoryParityError => "Memory parity error",
            Self::GatewayPathUnavailable => "Gateway path unavailable",
            Self::GatewayTargetDevice => "Gateway target device failed to respond",
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.get_name())
    }
}

#[cfg(all(feature = "defmt", target_os = "none"))]
impl defmt::Format for Exception {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.get_name())
    }
}
