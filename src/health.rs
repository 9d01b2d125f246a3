//! Health check module
//! Provides health status for the application and its dependencies

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

use crate::chains::ChainClientPool;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Up,
    Down,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }
}

/// Health checker for the application
///
/// Probes the database and each registered chain client; the database is
/// load-bearing (Unhealthy when down), individual chain endpoints only
/// degrade the rollup since tasks on other chains keep running.
#[derive(Clone)]
pub struct HealthChecker {
    db_pool: sqlx::PgPool,
    chains: Arc<ChainClientPool>,
}

impl HealthChecker {
    pub fn new(db_pool: sqlx::PgPool, chains: Arc<ChainClientPool>) -> Self {
        Self { db_pool, chains }
    }

    /// Perform comprehensive health check
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();
        let mut database_up = true;
        let mut degraded = false;

        match timeout(Duration::from_secs(5), check_database_health(&self.db_pool)).await {
            Ok(Ok(response_time)) => {
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::up(Some(response_time)),
                );
                info!("Database health check: OK ({}ms)", response_time);
            }
            Ok(Err(e)) => {
                database_up = false;
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::down(Some(e.to_string())),
                );
                error!("Database health check failed: {}", e);
            }
            Err(_) => {
                database_up = false;
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::down(Some("timed out after 5s".to_string())),
                );
                error!("Database health check timed out");
            }
        }

        let chain_results = self.chains.health_check_all().await;
        for chain_id in self.chains.supported_chain_ids() {
            let client = match self.chains.get(chain_id) {
                Some(client) => client,
                None => continue,
            };
            let name = format!("chain:{}", client.chain_name());

            match chain_results.get(client.chain_name()) {
                Some(status) if status.is_healthy => {
                    health_status.checks.insert(
                        name,
                        ComponentHealth::up(Some(status.response_time_ms as u128)),
                    );
                }
                Some(status) => {
                    degraded = true;
                    health_status
                        .checks
                        .insert(name, ComponentHealth::down(status.error_message.clone()));
                }
                None => {
                    degraded = true;
                    health_status.checks.insert(
                        name,
                        ComponentHealth::down(Some("no health response".to_string())),
                    );
                }
            }
        }

        health_status.status = if !database_up {
            HealthState::Unhealthy
        } else if degraded {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        health_status
    }
}

async fn check_database_health(
    pool: &sqlx::PgPool,
) -> Result<u128, crate::database::error::DatabaseError> {
    let start = Instant::now();
    crate::database::health_check(pool).await?;
    Ok(start.elapsed().as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_starts_healthy() {
        let status = HealthStatus::new();
        assert!(status.is_healthy());
        assert!(status.checks.is_empty());
    }

    #[test]
    fn test_component_health_constructors() {
        let up = ComponentHealth::up(Some(12));
        assert_eq!(up.status, ComponentState::Up);
        assert_eq!(up.response_time_ms, Some(12));
        assert!(up.details.is_none());

        let down = ComponentHealth::down(Some("connection refused".to_string()));
        assert_eq!(down.status, ComponentState::Down);
        assert!(down.response_time_ms.is_none());
        assert_eq!(down.details.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_health_status_serializes() {
        let mut status = HealthStatus::new();
        status
            .checks
            .insert("database".to_string(), ComponentHealth::up(Some(3)));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "Healthy");
        assert_eq!(json["checks"]["database"]["status"], "Up");
    }
}
