//! Register client abstraction
//!
//! The acquisition loop only needs three operations from the device link:
//! connect, read a block of holding registers, disconnect. [`RegisterClient`]
//! captures exactly that so the decoder and the loop can be driven by the
//! Modbus TCP client in production and by [`mock::MockRegisterClient`] in tests.

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use voltage_modbus::{ModbusClient, ModbusTcpClient};

use crate::error::TransportError;

/// Device register link
#[async_trait]
pub trait RegisterClient: Send {
    /// Open the connection
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Read `count` consecutive holding registers starting at `address`
    async fn read_block(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError>;

    /// Close the connection
    ///
    /// Idempotent: safe on a never-connected or already-closed client.
    async fn disconnect(&mut self);

    /// Human-readable endpoint for logs and status messages
    fn endpoint(&self) -> String;
}

/// Modbus TCP implementation backed by `voltage_modbus`
pub struct ModbusRegisterClient {
    address: String,
    unit_id: u8,
    timeout: Duration,
    client: Option<ModbusTcpClient>,
}

impl ModbusRegisterClient {
    pub fn new(host: &str, port: u16, unit_id: u8, timeout: Duration) -> Self {
        Self {
            address: format!("{}:{}", host, port),
            unit_id,
            timeout,
            client: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl RegisterClient for ModbusRegisterClient {
    async fn connect(&mut self) -> Result<(), TransportError> {
        // Drop any stale handle first
        self.disconnect().await;

        let client = ModbusTcpClient::from_address(&self.address, self.timeout)
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                endpoint: self.address.clone(),
                reason: e.to_string(),
            })?;
        debug!("Modbus TCP connected: {} (unit {})", self.address, self.unit_id);
        self.client = Some(client);
        Ok(())
    }

    async fn read_block(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        let values = client.read_03(self.unit_id, address, count).await?;
        Ok(values)
    }

    async fn disconnect(&mut self) {
        if let Some(mut client) = self.client.take() {
            if let Err(e) = client.close().await {
                warn!("Error closing Modbus connection {}: {}", self.address, e);
            }
            debug!("Modbus TCP disconnected: {}", self.address);
        }
    }

    fn endpoint(&self) -> String {
        self.address.clone()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_without_connection_is_not_connected() {
        let mut client = ModbusRegisterClient::new("127.0.0.1", 6607, 0, Duration::from_secs(1));
        assert!(!client.is_connected());
        assert_eq!(
            client.read_block(32080, 2).await,
            Err(TransportError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mut client = ModbusRegisterClient::new("127.0.0.1", 6607, 0, Duration::from_secs(1));
        client.disconnect().await;
        client.disconnect().await;
        assert_eq!(client.endpoint(), "127.0.0.1:6607");
    }
}
