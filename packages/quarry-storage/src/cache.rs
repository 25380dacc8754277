use std::{future, time::Duration};

use moka::{
	future::Cache,
	ops::compute::{CompResult, Op},
};

use crate::{BoxFuture, Result};

/// Lifetime of a job record, counted from its most recent write.
pub const JOB_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_RECORDS: u64 = 100_000;

/// A shared key-value cache whose entries expire a fixed time after their last write.
///
/// Expired entries read as absent.
pub trait JobCache
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

	/// Stores `value`, restarting the entry's lifetime.
	fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>>;

	/// Replaces the value only if the live entry is byte-equal to `expected`.
	///
	/// Returns `false` and leaves the entry untouched when it is absent, expired or different.
	fn compare_and_set<'a>(
		&'a self,
		key: &'a str,
		expected: &'a str,
		value: String,
	) -> BoxFuture<'a, Result<bool>>;
}

/// Process-local [`JobCache`] on top of a moka cache with a time-to-live policy.
#[derive(Clone)]
pub struct MemoryCache {
	entries: Cache<String, String>,
}
impl MemoryCache {
	/// Job records living for [`JOB_TTL`], at most `max_records` of them.
	pub fn new(max_records: u64) -> Self {
		Self::with_ttl(JOB_TTL, max_records)
	}

	pub fn with_ttl(ttl: Duration, max_records: u64) -> Self {
		Self { entries: Cache::builder().max_capacity(max_records).time_to_live(ttl).build() }
	}
}
impl Default for MemoryCache {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_RECORDS)
	}
}
impl JobCache for MemoryCache {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(async move { Ok(self.entries.get(key).await) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.entries.insert(key.to_string(), value).await;

			Ok(())
		})
	}

	fn compare_and_set<'a>(
		&'a self,
		key: &'a str,
		expected: &'a str,
		value: String,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let outcome = self
				.entries
				.entry(key.to_string())
				.and_compute_with(|current| {
					let op = match current {
						Some(entry) if entry.value() == expected => Op::Put(value),
						_ => Op::Nop,
					};

					future::ready(op)
				})
				.await;

			Ok(matches!(outcome, CompResult::ReplacedWith(_)))
		})
	}
}
