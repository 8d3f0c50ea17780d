use crate::{config::AppConfig, service::NodeService};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub nodes: NodeService,
}
