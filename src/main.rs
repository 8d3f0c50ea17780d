// Módulos de la aplicación
mod api;
mod app_state;
mod config;
mod error;
mod memory_store;
mod models;
mod neo4j_store;
mod service;
mod store;
mod traversal;

use std::sync::Arc;

use crate::app_state::AppState;
use crate::config::StoreBackend;
use crate::memory_store::MemoryStore;
use crate::neo4j_store::Neo4jStore;
use crate::service::NodeService;
use crate::store::NodeStore;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().expect("Error al cargar la configuración");
    info!(
        "Configuración: backend {:?}, recorrido {:?}, integridad {:?}",
        cfg.store_backend, cfg.traversal, cfg.integrity
    );

    // 3. Conectar al almacén y asegurar esquemas
    let store: Arc<dyn NodeStore> = match cfg.store_backend {
        StoreBackend::Memory => {
            warn!("Usando almacén en memoria: los nodos se pierden al cerrar el proceso.");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Neo4j => {
            let graph = neo4j_store::connect_from_config(&cfg)
                .await
                .expect("Error conectando a Neo4j");
            neo4j_store::ensure_schema(&graph)
                .await
                .expect("Error asegurando el esquema de Neo4j");
            Arc::new(Neo4jStore::new(graph))
        }
    };

    // 4. Sembrar el nodo raíz si hace falta
    let nodes = NodeService::new(store, cfg.integrity, cfg.traversal);
    nodes
        .bootstrap()
        .await
        .expect("Error inicializando el nodo raíz");

    // 5. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        nodes,
    };

    // 6. Configurar el router de la API
    let api_routes = api::create_router(app_state.clone());
    let routes = if app_state.config.api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(&app_state.config.api_prefix, api_routes)
    };
    let app = routes.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    // 7. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .expect("No se pudo abrir el puerto del servidor");
    info!(
        "🚀 Servidor escuchando en http://{}{}",
        server_addr, app_state.config.api_prefix
    );

    // Apagado ordenado con Ctrl-C.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .expect("Error en el servidor HTTP");

    info!("✅ Servidor cerrado correctamente.");
}
