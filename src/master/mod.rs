// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blocking Modbus master issuing block writes.
//!
//! A [`Master`] owns the transmit buffer and a single request slot. The
//! transport side is not part of this module: it gets notified through
//! [`PostEvent`], fetches the frame with [`Master::read_send_buffer`] and
//! reports back with [`Master::dispatch_response`], [`Master::report_timeout`]
//! or [`Master::report_receive_error`].

mod completion;
mod lock;

pub use self::lock::Wait;

use self::{completion::Completion, lock::RequestLock};
use crate::{
    BlockAddress, ByteCount, Exception, ExceptionResponse, FunctionCode, MAX_PDU_LEN,
    RequestError, SlaveId, WRITE_BLOCK_HEADER_LEN, WriteBlock, validate_write_block_response,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};

/// Highest unicast slave address.
pub const DEFAULT_MAX_SLAVES: SlaveId = 247;

/// Limits of a master instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterConfig {
    max_slaves: SlaveId,
    max_pdu_len: usize,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            max_slaves: DEFAULT_MAX_SLAVES,
            max_pdu_len: MAX_PDU_LEN,
        }
    }
}

impl MasterConfig {
    /// Highest slave address requests may be sent to.
    #[must_use]
    pub const fn max_slaves(&self) -> SlaveId {
        self.max_slaves
    }

    /// Largest PDU the transport is able to carry.
    #[must_use]
    pub const fn max_pdu_len(&self) -> usize {
        self.max_pdu_len
    }

    #[must_use]
    pub const fn with_max_slaves(mut self, max_slaves: SlaveId) -> Self {
        self.max_slaves = max_slaves;
        self
    }

    /// The length is clamped to `WRITE_BLOCK_HEADER_LEN..=MAX_PDU_LEN`.
    #[must_use]
    pub fn with_max_pdu_len(mut self, max_pdu_len: usize) -> Self {
        self.max_pdu_len = max_pdu_len.clamp(WRITE_BLOCK_HEADER_LEN, MAX_PDU_LEN);
        self
    }

    /// Maximum number of data bytes of a single block write.
    #[must_use]
    pub const fn payload_capacity(&self) -> usize {
        self.max_pdu_len.saturating_sub(WRITE_BLOCK_HEADER_LEN)
    }
}

/// Events a master posts to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterEvent {
    /// The transmit buffer holds a frame that is ready to be sent.
    FrameTransmit,
}

/// Notifies the transport layer, must not block.
pub trait PostEvent {
    /// Hands the event back if nobody is listening anymore.
    fn post(&self, event: MasterEvent) -> Result<(), MasterEvent>;
}

impl PostEvent for mpsc::Sender<MasterEvent> {
    fn post(&self, event: MasterEvent) -> Result<(), MasterEvent> {
        self.send(event).map_err(|err| {
            #[cfg(feature = "log")]
            log::warn!("Dropped {:?}: event receiver is gone", err.0);
            err.0
        })
    }
}

#[derive(Debug)]
struct SendBuffer {
    dest: SlaveId,
    pdu: [u8; MAX_PDU_LEN],
    len: usize,
}

impl Default for SendBuffer {
    fn default() -> Self {
        Self {
            dest: 0,
            pdu: [0; MAX_PDU_LEN],
            len: 0,
        }
    }
}

/// The request currently awaiting its response.
#[derive(Debug)]
struct Pending {
    slave: SlaveId,
    function: FunctionCode,
    /// Byte count of the original request
    byte_count: ByteCount,
    completion: Arc<Completion>,
}

/// Modbus master with at most one outstanding request.
#[derive(Debug)]
pub struct Master<E> {
    config: MasterConfig,
    events: E,
    lock: RequestLock,
    send_buf: Mutex<SendBuffer>,
    pending: Mutex<Option<Pending>>,
}

impl<E: PostEvent> Master<E> {
    pub fn new(config: MasterConfig, events: E) -> Self {
        Self {
            config,
            events,
            lock: RequestLock::default(),
            send_buf: Mutex::default(),
            pending: Mutex::default(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &MasterConfig {
        &self.config
    }

    /// Whether a request is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock.is_held()
    }

    /// Write `data` to the memory of `slave` at `address` and wait for the
    /// acknowledgement.
    ///
    /// `wait` limits how long to wait for a concurrent request to finish.
    /// Once the frame is handed to the transport this call blocks until the
    /// response path reports an outcome. If the transport does not accept
    /// the event the request fails with [`RequestError::Disconnected`].
    pub fn write_block(
        &self,
        slave: SlaveId,
        address: BlockAddress,
        data: &[u8],
        wait: Wait,
    ) -> Result<(), RequestError> {
        let request = WriteBlock { address, data };
        let byte_count = self.check_write_block(slave, &request)?;
        if !self.lock.acquire(wait) {
            #[cfg(feature = "log")]
            log::warn!("Cannot write block to slave {slave}: master is busy");
            return Err(RequestError::MasterBusy);
        }
        if let Err(err) = self.build_write_block_request(slave, &request) {
            self.lock.release();
            return Err(err);
        }
        let completion = Arc::new(Completion::default());
        *lock_unpoisoned(&self.pending) = Some(Pending {
            slave,
            function: FunctionCode::WriteBlock,
            byte_count,
            completion: Arc::clone(&completion),
        });
        #[cfg(feature = "log")]
        log::debug!("Writing {byte_count} byte(s) to block 0x{address:08X} of slave {slave}");
        if self.events.post(MasterEvent::FrameTransmit).is_err() {
            self.complete(Err(RequestError::Disconnected));
        }
        completion.wait()
    }

    fn check_write_block(
        &self,
        slave: SlaveId,
        request: &WriteBlock<'_>,
    ) -> Result<ByteCount, RequestError> {
        if slave == 0 || slave > self.config.max_slaves {
            #[cfg(feature = "log")]
            log::error!("Invalid slave address: {slave}");
            return Err(RequestError::IllegalArgument);
        }
        if request.data.len() > self.config.payload_capacity() {
            #[cfg(feature = "log")]
            log::error!(
                "Block of {} byte(s) exceeds capacity of {} byte(s)",
                request.data.len(),
                self.config.payload_capacity()
            );
            return Err(RequestError::IllegalArgument);
        }
        ByteCount::try_from(request.data.len()).map_err(|_| RequestError::IllegalArgument)
    }

    /// Encode the request into the transmit buffer.
    ///
    /// Must only be called while holding the request slot.
    fn build_write_block_request(
        &self,
        slave: SlaveId,
        request: &WriteBlock<'_>,
    ) -> Result<usize, RequestError> {
        self.check_write_block(slave, request)?;
        let mut buf = lock_unpoisoned(&self.send_buf);
        let len = request
            .encode(&mut buf.pdu[..self.config.max_pdu_len])
            .map_err(|_err| {
                #[cfg(feature = "log")]
                log::error!("Failed to encode block write request: {_err}");
                RequestError::IllegalArgument
            })?;
        buf.dest = slave;
        buf.len = len;
        Ok(len)
    }
}

impl<E> Master<E> {
    /// Access the destination address and PDU of the last built request.
    pub fn read_send_buffer<R>(&self, f: impl FnOnce(SlaveId, &[u8]) -> R) -> R {
        let buf = lock_unpoisoned(&self.send_buf);
        f(buf.dest, &buf.pdu[..buf.len])
    }

    /// Deliver a received response PDU.
    ///
    /// Returns `false` if the response was ignored because no request is
    /// pending or it comes from another slave.
    pub fn dispatch_response(&self, slave: SlaveId, pdu: &[u8]) -> bool {
        let mut pending = lock_unpoisoned(&self.pending);
        let Some(request) = pending.as_ref() else {
            #[cfg(feature = "log")]
            log::warn!("Ignoring response of slave {slave}: no request pending");
            return false;
        };
        if request.slave != slave {
            #[cfg(feature = "log")]
            log::warn!(
                "Ignoring response of slave {slave}: waiting for slave {}",
                request.slave
            );
            return false;
        }
        let outcome = match pdu.first().copied() {
            Some(fn_code) if fn_code == request.function.value() => {
                validate_write_block_response(pdu, request.byte_count)
                    .map(|_| ())
                    .map_err(RequestError::from)
            }
            Some(fn_code) if fn_code == request.function.exception_value() => {
                let exception = ExceptionResponse::try_from(pdu)
                    .map_or(Exception::IllegalDataValue, |rsp| rsp.exception);
                Err(exception.into())
            }
            Some(_) => Err(Exception::IllegalFunction.into()),
            None => Err(Exception::IllegalDataValue.into()),
        };
        let Some(request) = pending.take() else {
            return false;
        };
        drop(pending);
        self.finish(request, outcome);
        true
    }

    /// The slave did not answer in time.
    pub fn report_timeout(&self) -> bool {
        self.complete(Err(RequestError::Timeout))
    }

    /// The transport received a corrupted frame.
    pub fn report_receive_error(&self) -> bool {
        self.complete(Err(RequestError::ReceiveData))
    }

    fn complete(&self, outcome: Result<(), RequestError>) -> bool {
        let Some(request) = lock_unpoisoned(&self.pending).take() else {
            return false;
        };
        self.finish(request, outcome);
        true
    }

    fn finish(&self, request: Pending, outcome: Result<(), RequestError>) {
        #[cfg(feature = "log")]
        match outcome {
            Ok(()) => log::debug!(
                "Slave {} acknowledged {} byte(s)",
                request.slave,
                request.byte_count
            ),
            Err(err) => log::debug!("Request to slave {} failed: {err}", request.slave),
        }
        self.lock.release();
        request.completion.signal(outcome);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
