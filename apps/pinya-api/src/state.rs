use std::sync::Arc;

use pinya_service::PinyaService;
use pinya_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<PinyaService>,
}
impl AppState {
	pub async fn new(config: pinya_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.storage.postgres.vector_dim).await?;

		let service = PinyaService::new(config, db).await?;

		Ok(Self::from_service(service))
	}

	/// Wraps an already wired service, e.g. one built with stub providers.
	pub fn from_service(service: PinyaService) -> Self {
		Self { service: Arc::new(service) }
	}
}
