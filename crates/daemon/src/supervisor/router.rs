// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Envelope routing between managed processes.

use hv_wire::{kinds, Envelope, Peer, ProcessName, Target};

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Write the envelope to a process's stdin.
    Forward { to: ProcessName, envelope: Envelope },
    /// The sender finished starting up.
    Ready(ProcessName),
    /// Addressed to the supervisor but not a type it handles.
    Unhandled { from: ProcessName, kind: String },
}

/// Decide where an envelope read from `from`'s stdout goes.
pub fn route(from: ProcessName, envelope: Envelope) -> Vec<Route> {
    match envelope.target {
        Target::Supervisor => {
            if envelope.is(kinds::READY) {
                vec![Route::Ready(from)]
            } else if envelope.is(kinds::PING) {
                let pong =
                    Envelope::new(Peer::Supervisor, Target::from(from), kinds::PONG, envelope.payload);
                vec![Route::Forward { to: from, envelope: pong }]
            } else {
                vec![Route::Unhandled { from, kind: envelope.kind }]
            }
        }
        Target::Broadcast => ProcessName::ALL
            .into_iter()
            .filter(|name| *name != from)
            .map(|to| Route::Forward { to, envelope: envelope.clone() })
            .collect(),
        Target::Crawler => vec![Route::Forward { to: ProcessName::Crawler, envelope }],
        Target::Backend => vec![Route::Forward { to: ProcessName::Backend, envelope }],
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
