//! Carga y gestión de configuración de la aplicación (almacén, recorrido y
//! servidor HTTP).

use std::env;

use anyhow::{anyhow, Result};

use crate::service::IntegrityMode;
use crate::traversal::TraversalStrategy;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Neo4j,
}

impl StoreBackend {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "neo4j" => Ok(Self::Neo4j),
            other => Err(anyhow!("Backend de almacén no soportado: {other}")),
        }
    }
}

/// Credenciales de Neo4j, sólo necesarias con `STORE_BACKEND=neo4j`.
#[derive(Clone, Debug)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub api_prefix: String,

    pub store_backend: StoreBackend,
    pub neo4j: Option<Neo4jConfig>,

    pub traversal: TraversalStrategy,
    pub integrity: IntegrityMode,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env`, pero leyendo de una función arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_addr = lookup("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:8000".to_string());
        let api_prefix = normalize_prefix(
            &lookup("API_PREFIX").unwrap_or_else(|| "/api/v1".to_string()),
        );

        let store_backend =
            StoreBackend::from_str(&lookup("STORE_BACKEND").unwrap_or_else(|| "memory".to_string()))?;

        let neo4j = match store_backend {
            StoreBackend::Memory => None,
            StoreBackend::Neo4j => {
                let require = |key: &str| {
                    lookup(key).ok_or_else(|| anyhow!("Falta {key} en el entorno"))
                };
                Some(Neo4jConfig {
                    uri: require("NEO4J_URI")?,
                    user: require("NEO4J_USER")?,
                    password: require("NEO4J_PASSWORD")?,
                })
            }
        };

        let traversal = lookup("TRAVERSAL_STRATEGY")
            .map(|s| s.parse::<TraversalStrategy>())
            .transpose()?
            .unwrap_or_default();
        let integrity = lookup("REFERENTIAL_INTEGRITY")
            .map(|s| s.parse::<IntegrityMode>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            server_addr,
            api_prefix,
            store_backend,
            neo4j,
            traversal,
            integrity,
        })
    }
}

/// `api/v1/` → `/api/v1`. Un prefijo vacío o "/" se queda en "".
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
