// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{error::*, frame::*};
use byteorder::{BigEndian, ByteOrder};
use core::convert::TryFrom;

type Result<T> = core::result::Result<T, Error>;

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return Err(Error::ExceptionCode(code));
            }
        };
        Ok(ex)
    }
}

impl From<ExceptionResponse> for [u8; 2] {
    fn from(ex: ExceptionResponse) -> [u8; 2] {
        let fn_code = ex.function.value();
        debug_assert!(fn_code < 0x80);
        [ex.function.exception_value(), ex.exception as u8]
    }
}

impl TryFrom<&[u8]> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::BufferSize);
        }
        let fn_err_code = bytes[0];
        if fn_err_code < 0x80 {
            return Err(Error::ExceptionFnCode(fn_err_code));
        }
        let function = (fn_err_code - 0x80).into();
        let exception = Exception::try_from(bytes[1])?;
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

impl WriteBlock<'_> {
    /// Serialize the request PDU into `buf`.
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let byte_count =
            ByteCount::try_from(self.data.len()).map_err(|_| Error::ByteCount(self.data.len()))?;
        let len = self.pdu_len();
        if buf.len() < len {
            return Err(Error::BufferSize);
        }
        buf[0] = FunctionCode::WriteBlock.value();
        BigEndian::write_u32(&mut buf[1..5], self.address);
        BigEndian::write_u16(&mut buf[5..7], byte_count);
        buf[WRITE_BLOCK_HEADER_LEN..len].copy_from_slice(self.data);
        Ok(len)
    }
}

impl<'r> TryFrom<&'r [u8]> for WriteBlock<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        if bytes.len() < WRITE_BLOCK_HEADER_LEN {
            return Err(Error::BufferSize);
        }
        let fn_code = bytes[0];
        if FunctionCode::new(fn_code) != FunctionCode::WriteBlock {
            return Err(Error::FnCode(fn_code));
        }
        let address = BigEndian::read_u32(&bytes[1..5]);
        let byte_count = BigEndian::read_u16(&bytes[5..7]) as usize;
        let data = &bytes[WRITE_BLOCK_HEADER_LEN..];
        if data.len() != byte_count {
            return Err(Error::LengthMismatch(byte_count, data.len()));
        }
        Ok(WriteBlock { address, data })
    }
}

impl WriteBlockResponse {
    /// Serialize the response PDU into `buf`.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.pdu_len();
        if buf.len() < len {
            return Err(Error::BufferSize);
        }
        buf[0] = FunctionCode::WriteBlock.value();
        BigEndian::write_u16(&mut buf[1..3], self.written);
        Ok(len)
    }
}

impl TryFrom<&[u8]> for WriteBlockResponse {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != MIN_PDU_LEN + WRITE_BLOCK_RESPONSE_DATA_LEN {
            return Err(Error::BufferSize);
        }
        let fn_code = bytes[0];
        if FunctionCode::new(fn_code) != FunctionCode::WriteBlock {
            return Err(Error::FnCode(fn_code));
        }
        Ok(WriteBlockResponse {
            written: BigEndian::read_u16(&bytes[1..3]),
        })
    }
}

/// Check the acknowledgement of a block write against the requested byte count.
///
/// A response is only accepted if it has exactly the size of a block write
/// response and the slave reports to have written exactly `requested` bytes.
/// Everything else is answered with [`Exception::IllegalDataValue`].
pub fn validate_write_block_response(
    pdu: &[u8],
    requested: ByteCount,
) -> core::result::Result<WriteBlockResponse, Exception> {
    let rsp = WriteBlockResponse::try_from(pdu).map_err(|_err| {
        #[cfg(feature = "log")]
        log::error!("Invalid block write response (len = {}): {_err}", pdu.len());
        Exception::IllegalDataValue
    })?;
    #[cfg(feature = "log")]
    log::debug!("Slave has written {} byte(s)", rsp.written);
    if rsp.written != requested {
        #[cfg(feature = "log")]
        log::error!(
            "Block write length mismatch: requested = {requested}, written = {}",
            rsp.written
        );
        return Err(Exception::IllegalDataValue);
    }
    Ok(rsp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_response_into_bytes() {
        let bytes: [u8; 2] = ExceptionResponse {
            function: FunctionCode::WriteBlock,
            exception: Exception::IllegalDataAddress,
        }
        .into();
        assert_eq!(bytes[0], 0xC1);
        assert_eq!(bytes[1], 0x02);
    }

    #[test]
    fn exception_response_from_bytes() {
        let data: &[u8] = &[0x79, 0x02];
        assert!(ExceptionResponse::try_from(data).is_err());

        let data: &[u8] = &[0xC1];
        assert_eq!(ExceptionResponse::try_from(data), Err(Error::BufferSize));

        let data: &[u8] = &[0xC1, 0x07];
        assert_eq!(
            ExceptionResponse::try_from(data),
            Err(Error::ExceptionCode(0x07))
        );

        let bytes: &[u8] = &[0xC1, 0x02];
        let rsp = ExceptionResponse::try_from(bytes).unwrap();
        assert_eq!(
            rsp,
            ExceptionResponse {
                function: FunctionCode::WriteBlock,
                exception: Exception::IllegalDataAddress,
            }
        );
    }

    mod serialize_requests {
        use super::*;

        #[test]
        fn write_block() {
            let data = [0xAA; 16];
            let req = WriteBlock {
                address: 0x0000_1000,
                data: &data,
            };
            let buf = &mut [0; MAX_PDU_LEN];
            let len = req.encode(buf).unwrap();
            assert_eq!(len, 23);
            assert_eq!(len - 1, 22);
            assert_eq!(&buf[..7], &[0x41, 0x00, 0x00, 0x10, 0x00, 0x00, 0x10]);
            assert_eq!(&buf[7..len], &data);
        }

        #[test]
        fn block_address_is_big_endian() {
            let data = [0; 0xFF];
            let req = WriteBlock {
                address: 0x1234_5678,
                data: &data,
            };
            let buf = &mut [0; 300];
            let len = req.encode(buf).unwrap();
            assert_eq!(len, 7 + 0xFF);
            assert_eq!(&buf[1..5], &[0x12, 0x34, 0x56, 0x78]);
            assert_eq!(&buf[5..7], &[0x00, 0xFF]);
        }

        #[test]
        fn fields_decode_to_inputs() {
            let data = [1, 2, 3, 4, 5];
            for address in [0, 1, 0xFF, 0x0001_0000, 0xDEAD_BEEF, u32::MAX] {
                for len in 0..=data.len() {
                    let req = WriteBlock {
                        address,
                        data: &data[..len],
                    };
                    let buf = &mut [0; 16];
                    let pdu_len = req.encode(buf).unwrap();
                    assert_eq!(pdu_len - 1, 6 + len);
                    assert_eq!(BigEndian::read_u32(&buf[1..5]), address);
                    assert_eq!(BigEndian::read_u16(&buf[5..7]) as usize, len);
                }
            }
        }

        #[test]
        fn buffer_too_small() {
            let req = WriteBlock {
                address: 0,
                data: &[1, 2, 3],
            };
            let buf = &mut [0; 9];
            assert_eq!(req.encode(buf), Err(Error::BufferSize));
            assert_eq!(buf, &[0; 9]);
        }

        #[test]
        fn data_exceeds_byte_count_field() {
            let data = [0; 0x1_0000];
            let req = WriteBlock {
                address: 0,
                data: &data,
            };
            let buf = &mut [0; 8];
            assert_eq!(req.encode(buf), Err(Error::ByteCount(0x1_0000)));
        }
    }

    mod deserialize_requests {
        use super::*;

        #[test]
        fn empty_request() {
            let data: &[u8] = &[];
            assert!(WriteBlock::try_from(data).is_err());
        }

        #[test]
        fn write_block() {
            let bytes: &[u8] = &[0x41, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0xAB, 0xCD];
            let req = WriteBlock::try_from(bytes).unwrap();
            assert_eq!(
                req,
                WriteBlock {
                    address: 0x0001_0000,
                    data: &[0xAB, 0xCD]
                }
            );
        }

        #[test]
        fn write_block_with_invalid_byte_count() {
            let bytes: &[u8] = &[0x41, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xAB, 0xCD];
            assert_eq!(
                WriteBlock::try_from(bytes),
                Err(Error::LengthMismatch(3, 2))
            );
        }

        #[test]
        fn other_function_code() {
            let bytes: &[u8] = &[0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
            assert_eq!(WriteBlock::try_from(bytes), Err(Error::FnCode(0x10)));
        }
    }

    mod deserialize_responses {
        use super::*;

        #[test]
        fn write_block() {
            let bytes: &[u8] = &[0x41, 0x00, 0x10];
            let rsp = WriteBlockResponse::try_from(bytes).unwrap();
            assert_eq!(rsp, WriteBlockResponse { written: 16 });

            let broken_bytes: &[u8] = &[0x41, 0x00];
            assert!(WriteBlockResponse::try_from(broken_bytes).is_err());
            let broken_bytes: &[u8] = &[0x41, 0x00, 0x10, 0x00];
            assert!(WriteBlockResponse::try_from(broken_bytes).is_err());
        }

        #[test]
        fn serialize_write_block() {
            let buf = &mut [0; 3];
            assert_eq!(WriteBlockResponse { written: 0x1234 }.encode(buf), Ok(3));
            assert_eq!(buf, &[0x41, 0x12, 0x34]);
            assert_eq!(
                WriteBlockResponse { written: 1 }.encode(&mut [0; 2]),
                Err(Error::BufferSize)
            );
        }
    }

    mod validate_responses {
        use super::*;

        #[test]
        fn matching_byte_count() {
            let rsp = validate_write_block_response(&[0x41, 0x00, 0x10], 16);
            assert_eq!(rsp, Ok(WriteBlockResponse { written: 16 }));
        }

        #[test]
        fn mismatching_byte_count() {
            assert_eq!(
                validate_write_block_response(&[0x41, 0x00, 0x08], 16),
                Err(Exception::IllegalDataValue)
            );
            assert_eq!(
                validate_write_block_response(&[0x41, 0x01, 0x10], 16),
                Err(Exception::IllegalDataValue)
            );
        }

        #[test]
        fn wrong_length() {
            assert_eq!(
                validate_write_block_response(&[0x41, 0x00], 0),
                Err(Exception::IllegalDataValue)
            );
            assert_eq!(
                validate_write_block_response(&[0x41, 0x00, 0x10, 0x00], 16),
                Err(Exception::IllegalDataValue)
            );
            assert_eq!(
                validate_write_block_response(&[], 0),
                Err(Exception::IllegalDataValue)
            );
        }

        #[test]
        fn full_byte_count_range() {
            for requested in [0, 1, 0xFF, 0x100, 0xFFFF] {
                let pdu = &mut [0; 3];
                WriteBlockResponse { written: requested }
                    .encode(pdu)
                    .unwrap();
                assert!(validate_write_block_response(pdu, requested).is_ok());
                assert!(validate_write_block_response(pdu, requested.wrapping_add(1)).is_err());
            }
        }
    }
}
