use std::sync::Arc;

use crate::{config::AppConfig, db::OrmConn, payments::PaymentGateway};

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub fn new(orm: OrmConn, config: AppConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            orm,
            config: Arc::new(config),
            gateway,
        }
    }
}
