// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    sync::{Condvar, Mutex, PoisonError},
    time::Duration,
};

use super::lock_unpoisoned;

/// How long a caller is willing to wait for the request slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Block until the slot becomes free.
    Forever,
    /// Give up after the given duration.
    Timeout(Duration),
}

impl From<Duration> for Wait {
    fn from(timeout: Duration) -> Self {
        Self::Timeout(timeout)
    }
}

/// The single in-flight request slot of a master.
///
/// Acquired by the caller issuing a request and released by whoever
/// completes it, so it is not tied to a guard.
#[derive(Debug, Default)]
pub(crate) struct RequestLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl RequestLock {
    /// Try to take the slot, waiting as long as `wait` allows.
    ///
    /// Returns `false` if the slot is still taken when the wait is over.
    pub(crate) fn acquire(&self, wait: Wait) -> bool {
        let held = lock_unpoisoned(&self.held);
        let mut held = match wait {
            Wait::Forever => self
                .released
                .wait_while(held, |held| *held)
                .unwrap_or_else(PoisonError::into_inner),
            Wait::Timeout(timeout) => {
                let (held, _) = self
                    .released
                    .wait_timeout_while(held, timeout, |held| *held)
                    .unwrap_or_else(PoisonError::into_inner);
                held
            }
        };
        if *held {
            return false;
        }
        *held = true;
        true
    }

    /// Free the slot and wake up one waiting caller.
    pub(crate) fn release(&self) {
        *lock_unpoisoned(&self.held) = false;
        self.released.notify_one();
    }

    /// Whether a request currently owns the slot.
    #[must_use]
    pub(crate) fn is_held(&self) -> bool {
        *lock_unpoisoned(&self.held)
    }
}
