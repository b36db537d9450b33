//! Read-through configuration cache.
//!
//! Reads are served from memory and never touch storage. Writes go to the backend first and only
//! reach the cache once the durable write succeeded, so a failed write leaves readers on the old
//! value and a completed write is visible to the next read.

use std::{
	collections::{BTreeMap, HashMap},
	sync::{Arc, RwLock},
};

use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::{BoxFuture, Result};

pub trait SettingsBackend
where
	Self: Send + Sync,
{
	fn load_all<'a>(&'a self) -> BoxFuture<'a, Result<Vec<(String, String)>>>;

	fn put<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<()>>;

	/// Returns `true` when a stored entry was removed.
	fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;
}

pub struct PgSettingsBackend {
	pool: PgPool,
}
impl PgSettingsBackend {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
impl SettingsBackend for PgSettingsBackend {
	fn load_all<'a>(&'a self) -> BoxFuture<'a, Result<Vec<(String, String)>>> {
		Box::pin(async move {
			let rows = pinya_storage::settings::load_all(&self.pool).await?;

			Ok(rows.into_iter().map(|row| (row.key, row.value)).collect())
		})
	}

	fn put<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(pinya_storage::settings::upsert(&self.pool, key, value).await?) })
	}

	fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(pinya_storage::settings::delete(&self.pool, key).await?) })
	}
}

/// What [`SettingsStore::update`] does with a key after inspecting its current value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingWrite {
	Keep,
	Set(String),
	Remove,
}

pub struct SettingsStore {
	backend: Arc<dyn SettingsBackend>,
	cache: RwLock<HashMap<String, String>>,
	write_lock: Mutex<()>,
}
impl SettingsStore {
	pub async fn load(backend: Arc<dyn SettingsBackend>) -> Result<Self> {
		let entries = backend.load_all().await?;

		tracing::debug!(count = entries.len(), "Loaded settings cache.");

		Ok(Self {
			backend,
			cache: RwLock::new(entries.into_iter().collect()),
			write_lock: Mutex::new(()),
		})
	}

	pub fn get(&self, key: &str) -> Option<String> {
		self.cache.read().unwrap_or_else(|err| err.into_inner()).get(key).cloned()
	}

	pub fn get_or(&self, key: &str, default: &str) -> String {
		self.get(key).unwrap_or_else(|| default.to_string())
	}

	/// Sorted copy of every cached entry.
	pub fn snapshot(&self) -> BTreeMap<String, String> {
		self.cache
			.read()
			.unwrap_or_else(|err| err.into_inner())
			.iter()
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect()
	}

	pub async fn set(&self, key: &str, value: &str) -> Result<()> {
		let _guard = self.write_lock.lock().await;

		self.backend.put(key, value).await?;
		self.cache
			.write()
			.unwrap_or_else(|err| err.into_inner())
			.insert(key.to_string(), value.to_string());

		tracing::info!(key, "Setting updated.");

		Ok(())
	}

	/// Read-modify-write of one key.
	///
	/// `edit` sees the current value and decides the write. The write lock is held from the read
	/// until the cache reflects the stored result, so concurrent updates of the same key never
	/// overwrite each other.
	pub async fn update<F, T>(&self, key: &str, edit: F) -> Result<T>
	where
		F: FnOnce(Option<String>) -> (SettingWrite, T),
	{
		let _guard = self.write_lock.lock().await;
		let (write, output) = edit(self.get(key));

		match write {
			SettingWrite::Keep => {},
			SettingWrite::Set(value) => {
				self.backend.put(key, &value).await?;
				self.cache
					.write()
					.unwrap_or_else(|err| err.into_inner())
					.insert(key.to_string(), value);

				tracing::info!(key, "Setting updated.");
			},
			SettingWrite::Remove => {
				let removed = self.backend.remove(key).await?;

				self.cache.write().unwrap_or_else(|err| err.into_inner()).remove(key);

				tracing::info!(key, removed, "Setting deleted.");
			},
		}

		Ok(output)
	}

	pub async fn delete(&self, key: &str) -> Result<bool> {
		let _guard = self.write_lock.lock().await;
		let removed = self.backend.remove(key).await?;

		self.cache.write().unwrap_or_else(|err| err.into_inner()).remove(key);

		tracing::info!(key, removed, "Setting deleted.");

		Ok(removed)
	}
}
