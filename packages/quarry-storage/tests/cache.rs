use std::time::Duration;

use quarry_storage::cache::{JOB_TTL, JobCache, MemoryCache};

const SHORT_TTL: Duration = Duration::from_millis(400);

fn short_lived() -> MemoryCache {
	MemoryCache::with_ttl(SHORT_TTL, 1_000)
}

#[test]
fn job_records_live_thirty_minutes() {
	assert_eq!(JOB_TTL, Duration::from_secs(30 * 60));
}

#[tokio::test]
async fn entries_expire_after_ttl() {
	let cache = short_lived();

	cache.set("factsjob:a", "one".to_string()).await.expect("Set failed.");

	assert_eq!(cache.get("factsjob:a").await.expect("Get failed."), Some("one".to_string()));

	tokio::time::sleep(SHORT_TTL + Duration::from_millis(200)).await;

	assert_eq!(cache.get("factsjob:a").await.expect("Get failed."), None);
}

#[tokio::test]
async fn every_write_resets_expiry() {
	let cache = short_lived();

	cache.set("k", "v1".to_string()).await.expect("Set failed.");
	tokio::time::sleep(Duration::from_millis(250)).await;
	cache.set("k", "v2".to_string()).await.expect("Set failed.");
	tokio::time::sleep(Duration::from_millis(250)).await;

	assert_eq!(cache.get("k").await.expect("Get failed."), Some("v2".to_string()));
}

#[tokio::test]
async fn compare_and_set_requires_matching_value() {
	let cache = MemoryCache::default();

	cache.set("k", "pending".to_string()).await.expect("Set failed.");

	let swapped =
		cache.compare_and_set("k", "pending", "done".to_string()).await.expect("CAS failed.");

	assert!(swapped);

	let swapped_again =
		cache.compare_and_set("k", "pending", "error".to_string()).await.expect("CAS failed.");

	assert!(!swapped_again);
	assert_eq!(cache.get("k").await.expect("Get failed."), Some("done".to_string()));
}

#[tokio::test]
async fn compare_and_set_on_missing_key_is_rejected() {
	let cache = MemoryCache::default();
	let swapped = cache.compare_and_set("nope", "", "x".to_string()).await.expect("CAS failed.");

	assert!(!swapped);
	assert_eq!(cache.get("nope").await.expect("Get failed."), None);
}

#[tokio::test]
async fn compare_and_set_resets_expiry() {
	let cache = short_lived();

	cache.set("k", "pending".to_string()).await.expect("Set failed.");
	tokio::time::sleep(Duration::from_millis(250)).await;

	assert!(cache.compare_and_set("k", "pending", "done".to_string()).await.expect("CAS failed."));

	tokio::time::sleep(Duration::from_millis(250)).await;

	assert_eq!(cache.get("k").await.expect("Get failed."), Some("done".to_string()));
}

#[tokio::test]
async fn expired_entries_cannot_be_swapped() {
	let cache = short_lived();

	cache.set("k", "pending".to_string()).await.expect("Set failed.");
	tokio::time::sleep(SHORT_TTL + Duration::from_millis(200)).await;

	assert!(!cache.compare_and_set("k", "pending", "done".to_string()).await.expect("CAS failed."));
	assert_eq!(cache.get("k").await.expect("Get failed."), None);
}
