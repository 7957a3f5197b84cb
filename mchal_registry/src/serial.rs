//! UART port claims.
//!
//! Single-owner, one reactor-facing port exposing byte-at-a-time
//! blocking/non-blocking access plus two edge-triggered readiness
//! signals mirroring the hardware's interrupt lines. There is no real
//! UART behind this (device internals are out of scope); a software
//! loopback buffer stands in for the physical line so that stream
//! devices (and scenario S1, echo via a loopbacked port) are testable.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Serial line format: data bits, stop bits, and parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialFormat {
    /// Data bits per frame (5-9 on real hardware; unconstrained here).
    pub data_bits: u8,
    /// Stop bits per frame (commonly 1 or 2).
    pub stop_bits: u8,
    /// Parity mode.
    pub parity: Parity,
}

impl Default for SerialFormat {
    fn default() -> Self {
        SerialFormat {
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
        }
    }
}

/// Parity mode for [`SerialFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

struct SerialState {
    baud: u32,
    format: SerialFormat,
    /// Bytes written by the owner, available to be "transmitted". In
    /// loopback mode these become readable immediately.
    tx: VecDeque<u8>,
    rx: VecDeque<u8>,
    loopback: bool,
}

/// A claimed UART port.
pub struct SerialPort {
    port: u32,
    state: Mutex<SerialState>,
    readable: Arc<Notify>,
    writable: Arc<Notify>,
}

impl SerialPort {
    pub(crate) fn new(port: u32, loopback: bool) -> Self {
        SerialPort {
            port,
            state: Mutex::new(SerialState {
                baud: 115_200,
                format: SerialFormat::default(),
                tx: VecDeque::new(),
                rx: VecDeque::new(),
                loopback,
            }),
            readable: Arc::new(Notify::new()),
            writable: Arc::new(Notify::new()),
        }
    }

    /// The port id.
    pub fn port(&self) -> u32 {
        self.port
    }

    /// Reconfigure the baud rate.
    pub fn set_baud(&self, baud: u32) {
        self.state.lock().baud = baud;
    }

    /// Reconfigure the frame format.
    pub fn set_format(&self, format: SerialFormat) {
        self.state.lock().format = format;
    }

    /// Non-blocking single-byte write; returns `false` if the internal
    /// transmit buffer is momentarily full (bounded to avoid unbounded
    /// growth from a wedged consumer).
    pub fn write_byte(&self, byte: u8) -> bool {
        const MAX_BUFFERED: usize = 4096;
        let mut state = self.state.lock();
        if state.tx.len() >= MAX_BUFFERED {
            return false;
        }
        state.tx.push_back(byte);
        if state.loopback {
            let was_empty = state.rx.is_empty();
            state.rx.push_back(byte);
            if was_empty {
                drop(state);
                self.readable.notify_one();
                return true;
            }
        }
        true
    }

    /// Non-blocking single-byte read.
    pub fn read_byte(&self) -> Option<u8> {
        self.state.lock().rx.pop_front()
    }

    /// Wait for the readable edge (data became available after the
    /// buffer was empty). Callers must re-check [`Self::read_byte`]
    /// after waking.
    pub async fn readable(&self) {
        self.readable.notified().await;
    }

    /// Wait for the writable edge.
    pub async fn writable(&self) {
        self.writable.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_echoes_bytes() {
        let port = SerialPort::new(0, true);
        for &b in b"hello-uart" {
            assert!(port.write_byte(b));
        }
        let mut out = Vec::new();
        while let Some(b) = port.read_byte() {
            out.push(b);
        }
        assert_eq!(out, b"hello-uart");
    }

    #[tokio::test]
    async fn readable_edge_fires_once_per_empty_to_nonempty_transition() {
        let port = SerialPort::new(0, true);
        port.write_byte(b'a');
        port.readable().await;
        assert_eq!(port.read_byte(), Some(b'a'));
    }
}
