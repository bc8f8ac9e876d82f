// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

use crate::frame::Exception;

/// modbus-block codec Error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Invalid buffer size
    BufferSize,
    /// Invalid function code
    FnCode(u8),
    /// Invalid exception code
    ExceptionCode(u8),
    /// Invalid exception function code
    ExceptionFnCode(u8),
    /// Data does not fit into the 16 bit byte count field
    ByteCount(usize),
    /// Length Mismatch
    LengthMismatch(usize, usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            BufferSize => write!(f, "Invalid buffer size"),
            FnCode(fn_code) => write!(f, "Invalid function code: 0x{fn_code:0>2X}"),
            ExceptionCode(code) => write!(f, "Invalid exception code: 0x{code:0>2X}"),
            ExceptionFnCode(code) => write!(f, "Invalid exception function code: 0x{code:0>2X}"),
            ByteCount(cnt) => write!(f, "Invalid byte count: {cnt}"),
            LengthMismatch(byte_count, data_len) => write!(
                f,
                "Length Mismatch: Byte Count Field: {byte_count}, Data Len: {data_len}"
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// The outcome of a failed master request.
///
/// A successful request is `Ok(())`.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// Slave address out of range or data too large.
    IllegalArgument,
    /// The request slot could not be acquired in time.
    MasterBusy,
    /// The slave did not respond in time.
    Timeout,
    /// The transport received a corrupted frame.
    ReceiveData,
    /// The transport stopped listening for events.
    Disconnected,
    /// The slave answered with an exception or the response was rejected.
    Protocol(Exception),
}

impl From<Exception> for RequestError {
    fn from(ex: Exception) -> Self {
        Self::Protocol(ex)
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use RequestError::*;

        match self {
            IllegalArgument => write!(f, "Illegal request argument"),
            MasterBusy => write!(f, "Master is busy"),
            Timeout => write!(f, "Response timed out"),
            ReceiveData => write!(f, "Received corrupted data"),
            Disconnected => write!(f, "Transport is disconnected"),
            Protocol(ex) => write!(f, "Protocol exception: {ex}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RequestError {}
