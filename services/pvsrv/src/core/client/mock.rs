//! Mock register client for testing
//!
//! Serves holding registers from an in-memory map and records every
//! connect attempt. Clones share state, so a test can keep one handle
//! while the acquisition loop owns another.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::RegisterClient;
use crate::error::TransportError;

#[derive(Debug, Default)]
struct MockState {
    registers: HashMap<u16, u16>,
    connected: bool,
    /// Remaining connect attempts that will be refused
    connect_failures: u32,
    /// Remaining reads that will fail with a lost connection
    read_failures: u32,
    /// Addresses answered with one register fewer than requested
    short_reads: Vec<u16>,
    /// Reads starting at these addresses fail with the given error
    read_errors: HashMap<u16, TransportError>,
    connect_attempts: Vec<Instant>,
    disconnects: u32,
    reads: u32,
    /// Cancel the token once this many connects have been attempted
    cancel_after_connects: Option<(usize, CancellationToken)>,
}

/// In-memory register client
#[derive(Debug, Clone, Default)]
pub struct MockRegisterClient {
    state: Arc<Mutex<MockState>>,
}

impl MockRegisterClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single 16-bit register
    pub fn set_u16(&self, address: u16, value: u16) -> &Self {
        self.state.lock().registers.insert(address, value);
        self
    }

    /// Set a 16-bit register from a signed value
    pub fn set_i16(&self, address: u16, value: i16) -> &Self {
        self.set_u16(address, value as u16)
    }

    /// Set a 32-bit value across two registers, high word first
    pub fn set_u32(&self, address: u16, value: u32) -> &Self {
        let mut state = self.state.lock();
        state.registers.insert(address, (value >> 16) as u16);
        state.registers.insert(address + 1, value as u16);
        drop(state);
        self
    }

    /// Set a signed 32-bit value across two registers
    pub fn set_i32(&self, address: u16, value: i32) -> &Self {
        self.set_u32(address, value as u32)
    }

    /// Refuse the next `count` connect attempts
    pub fn fail_connects(&self, count: u32) {
        self.state.lock().connect_failures = count;
    }

    /// Fail the next `count` reads with a lost connection
    pub fn fail_reads(&self, count: u32) {
        self.state.lock().read_failures = count;
    }

    /// Answer reads at `address` with a truncated block
    pub fn short_read_at(&self, address: u16) {
        self.state.lock().short_reads.push(address);
    }

    /// Fail every read starting at `address` with `error`
    ///
    /// A lost link or timeout also drops the connection, as a real socket would.
    pub fn fail_read_at(&self, address: u16, error: TransportError) {
        self.state.lock().read_errors.insert(address, error);
    }

    /// Cancel `token` as soon as the `n`th connect attempt has been made
    pub fn cancel_after_connects(&self, n: usize, token: CancellationToken) {
        self.state.lock().cancel_after_connects = Some((n, token));
    }

    /// Instants of every connect attempt so far
    pub fn connect_attempts(&self) -> Vec<Instant> {
        self.state.lock().connect_attempts.clone()
    }

    pub fn disconnect_count(&self) -> u32 {
        self.state.lock().disconnects
    }

    pub fn read_count(&self) -> u32 {
        self.state.lock().reads
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }
}

#[async_trait]
impl RegisterClient for MockRegisterClient {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.connect_attempts.push(Instant::now());
        let attempts = state.connect_attempts.len();

        if let Some((n, token)) = &state.cancel_after_connects {
            if attempts >= *n {
                token.cancel();
            }
        }

        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            debug!("Mock connect attempt {} refused", attempts);
            return Err(TransportError::ConnectionFailed {
                endpoint: "mock".to_string(),
                reason: "connection refused".to_string(),
            });
        }

        state.connected = true;
        Ok(())
    }

    async fn read_block(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        state.reads += 1;

        if state.read_failures > 0 {
            state.read_failures -= 1;
            state.connected = false;
            return Err(TransportError::ConnectionLost(format!(
                "mock read at {} failed",
                address
            )));
        }

        if let Some(error) = state.read_errors.get(&address).cloned() {
            if matches!(
                error,
                TransportError::ConnectionLost(_) | TransportError::Timeout(_)
            ) {
                state.connected = false;
            }
            return Err(error);
        }

        let len = if state.short_reads.contains(&address) {
            count.saturating_sub(1)
        } else {
            count
        };
        Ok((0..len)
            .map(|offset| {
                state
                    .registers
                    .get(&(address + offset))
                    .copied()
                    .unwrap_or(0)
            })
            .collect())
    }

    async fn disconnect(&mut self) {
        let mut state = self.state.lock();
        state.connected = false;
        state.disconnects += 1;
    }

    fn endpoint(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_serves_registers() {
        let mock = MockRegisterClient::new();
        mock.set_u32(32080, 4200).set_u16(32085, 5000);

        let mut client = mock.clone();
        client.connect().await.unwrap();
        assert_eq!(client.read_block(32080, 2).await.unwrap(), vec![0, 4200]);
        assert_eq!(client.read_block(32085, 1).await.unwrap(), vec![5000]);
        // Unset registers read as zero
        assert_eq!(client.read_block(40000, 2).await.unwrap(), vec![0, 0]);
        assert_eq!(mock.read_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_scripted_failures() {
        let mock = MockRegisterClient::new();
        mock.fail_connects(2);
        let mut client = mock.clone();

        assert!(client.connect().await.is_err());
        assert!(client.connect().await.is_err());
        client.connect().await.unwrap();
        assert_eq!(mock.connect_attempts().len(), 3);

        mock.fail_reads(1);
        assert!(matches!(
            client.read_block(32000, 3).await,
            Err(TransportError::ConnectionLost(_))
        ));
        assert_eq!(
            client.read_block(32000, 3).await,
            Err(TransportError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_mock_fails_reads_at_address() {
        let mock = MockRegisterClient::new();
        mock.set_u16(37118, 4998);
        mock.fail_read_at(
            37113,
            TransportError::Exception {
                code: 0x02,
                message: "Illegal Data Address".into(),
            },
        );
        let mut client = mock.clone();
        client.connect().await.unwrap();

        let err = client.read_block(37113, 2).await.unwrap_err();
        assert!(err.is_exception());
        // An exception leaves the link up
        assert!(mock.is_connected());
        assert_eq!(client.read_block(37118, 1).await.unwrap(), vec![4998]);

        mock.fail_read_at(37118, TransportError::ConnectionLost("Broken pipe".into()));
        assert!(matches!(
            client.read_block(37118, 1).await,
            Err(TransportError::ConnectionLost(_))
        ));
        assert!(!mock.is_connected());
    }
}
