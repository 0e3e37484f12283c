//! Device registry: wallet address → push token and preferred language.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;

use walletpush_common::error::AppError;
use walletpush_common::types::DeviceRegistration;

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Look up the device registered for a wallet address.
    async fn lookup(&self, address: &str) -> Result<Option<DeviceRegistration>, AppError>;
}

/// Registry backed by the `device_registrations` table.
#[derive(Clone)]
pub struct PgDeviceRegistry {
    pool: PgPool,
}

impl PgDeviceRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceRegistry for PgDeviceRegistry {
    async fn lookup(&self, address: &str) -> Result<Option<DeviceRegistration>, AppError> {
        let registration: Option<DeviceRegistration> = sqlx::query_as(
            "SELECT address, push_token, language FROM device_registrations WHERE address = $1",
        )
        .bind(address.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(registration)
    }
}

/// In-memory registry for tests and local runs.
#[derive(Default)]
pub struct InMemoryDeviceRegistry {
    devices: RwLock<HashMap<String, DeviceRegistration>>,
}

impl InMemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, address: &str, push_token: &str, language: Option<&str>) {
        let address = address.to_lowercase();
        self.devices.write().await.insert(
            address.clone(),
            DeviceRegistration {
                address,
                push_token: push_token.to_string(),
                language: language.map(str::to_string),
            },
        );
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn lookup(&self, address: &str) -> Result<Option<DeviceRegistration>, AppError> {
        Ok(self.devices.read().await.get(&address.to_lowercase()).cloned())
    }
}
