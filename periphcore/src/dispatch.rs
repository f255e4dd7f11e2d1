// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::binding::{HardwareBinding, InterruptPort};
use crate::errors::Error;
use crate::registry::Registry;

use crate::trace;

/// What an interrupt turned into
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Service {
    /// The instance was not enabled, only the flag was cleared
    Spurious,
    /// The bound callback ran
    Callback,
    /// Default buffering: words moved to the transmitter, word received
    Transfer { sent: usize, received: bool },
}

/// Interrupt side of a [Registry]
///
/// Each family's interrupt vectors call [Dispatcher::on_interrupt] with the
/// instance index. Being the only interrupt-side accessor, it is the single
/// consumer of every outbound buffer and the single producer of every
/// inbound one.
pub struct Dispatcher<'r, 'a, B: HardwareBinding, const N: usize, const CAP: usize> {
    registry: &'r Registry<'a, B, N, CAP>,
}

impl<'r, 'a, B: HardwareBinding, const N: usize, const CAP: usize> Dispatcher<'r, 'a, B, N, CAP> {
    pub(crate) fn new(registry: &'r Registry<'a, B, N, CAP>) -> Self {
        Self { registry }
    }

    /// Handles one interrupt of instance `index`.
    ///
    /// The pending flag is cleared first. Then the bound callback runs, or
    /// without one, outbound words are fed to the port while it has room and
    /// a received word is queued. A received word that does not fit is dropped
    /// and counted.
    pub fn on_interrupt(
        &mut self,
        index: u8,
        port: &mut impl InterruptPort,
    ) -> Result<Service, Error> {
        let index = index as usize;
        if index >= N {
            return Err(Error::InvalidHandle);
        }
        port.clear_pending();

        let Some(callback) = self.registry.begin_service(index) else {
            return Ok(Service::Spurious);
        };
        let service = match (callback, self.registry.buffers(index)) {
            (Some(callback), _) => {
                callback.invoke();
                Service::Callback
            }
            (None, Some(io)) => critical_section::with(|cs| {
                let mut io = io.borrow_ref_mut(cs);
                let mut sent = 0;
                while port.tx_ready() {
                    let Some(word) = io.tx_out.pop_one() else {
                        break;
                    };
                    port.write_tx(word);
                    sent += 1;
                }
                let received = match port.read_rx() {
                    Some(word) => {
                        if !io.rx_in.push_lossy(word) {
                            trace!("{} rx overflow, word dropped", index);
                        }
                        true
                    }
                    None => false,
                };
                Service::Transfer { sent, received }
            }),
            (None, None) => Service::Transfer {
                sent: 0,
                received: false,
            },
        };
        self.registry.end_service(index);
        Ok(service)
    }
}

impl<B: HardwareBinding, const N: usize, const CAP: usize> Drop for Dispatcher<'_, '_, B, N, CAP> {
    fn drop(&mut self) {
        self.registry.release_dispatcher();
    }
}
