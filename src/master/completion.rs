// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::{Condvar, Mutex, PoisonError};

use super::lock_unpoisoned;
use crate::RequestError;

/// Hands the outcome of one request from the response path to the caller.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    outcome: Mutex<Option<Result<(), RequestError>>>,
    done: Condvar,
}

impl Completion {
    pub(crate) fn signal(&self, outcome: Result<(), RequestError>) {
        *lock_unpoisoned(&self.outcome) = Some(outcome);
        self.done.notify_all();
    }

    /// Block until [`Completion::signal`] has been called.
    pub(crate) fn wait(&self) -> Result<(), RequestError> {
        let mut outcome = lock_unpoisoned(&self.outcome);
        loop {
            if let Some(outcome) = outcome.take() {
                return outcome;
            }
            outcome = self
                .done
                .wait(outcome)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread, time::Duration};

    #[test]
    fn signal_before_wait() {
        let completion = Completion::default();
        completion.signal(Err(RequestError::Timeout));
        assert_eq!(completion.wait(), Err(RequestError::Timeout));
    }

    #[test]
    fn signal_from_other_thread() {
        let completion = Arc::new(Completion::default());
        let signaller = {
            let completion = Arc::clone(&completion);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                completion.signal(Ok(()));
            })
        };
        assert_eq!(completion.wait(), Ok(()));
        signaller.join().unwrap();
    }
}
