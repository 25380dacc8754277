use std::sync::Arc;

use quarry_service::{JobRunner, QuarryService};
use quarry_storage::cache::MemoryCache;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<QuarryService>,
	pub runner: Arc<JobRunner>,
}
impl AppState {
	/// Loads the topic indexes and starts the job runner. Must run inside a tokio runtime.
	pub fn new(config: quarry_config::Config) -> color_eyre::Result<Self> {
		let cache = Arc::new(MemoryCache::new(config.jobs.max_records));
		let service = QuarryService::new(config, cache)?;

		Ok(Self::from_service(Arc::new(service)))
	}

	pub fn from_service(service: Arc<QuarryService>) -> Self {
		let runner = JobRunner::start(service.clone());

		Self { service, runner: Arc::new(runner) }
	}
}
