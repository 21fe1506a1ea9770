use std::{fmt::Display, marker::PhantomData, path::PathBuf};

use async_trait::async_trait;
use cached::IOCachedAsync;
use serde::{de::DeserializeOwned, Serialize};

/// Disk cache for expensive results (fitted profiles), stored with cacache
/// and encoded with bincode. Keys are prefixed with `namespace` so several
/// cached functions can share one cache root.
pub struct CacacheBackend<K, V> {
    root: PathBuf,
    namespace: String,
    refresh: bool,
    _phantom: PhantomData<(K, V)>,
}

impl<K, V> CacacheBackend<K, V> {
    pub fn new(root: PathBuf, namespace: &str) -> Self {
        Self {
            root,
            namespace: namespace.to_owned(),
            refresh: true,
            _phantom: PhantomData,
        }
    }

    fn entry_key(&self, key: &impl Display) -> String {
        format!("{}:{key}", self.namespace)
    }
}

#[async_trait]
impl<K, V> IOCachedAsync<K, V> for CacacheBackend<K, V>
where
    K: Display + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    type Error = eyre::Error;

    async fn cache_get(&self, key: &K) -> Result<Option<V>, Self::Error> {
        match cacache::read(&self.root, self.entry_key(key)).await {
            Ok(bytes) => Ok(Some(bincode::deserialize::<V>(&bytes)?)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn cache_set(&self, key: K, val: V) -> Result<Option<V>, Self::Error> {
        let prev = self.cache_get(&key).await?;
        let bytes = bincode::serialize(&val)?;
        cacache::write(&self.root, self.entry_key(&key), bytes).await?;
        log::debug!("cached {} in {:?}", self.entry_key(&key), self.root);

        Ok(prev)
    }

    async fn cache_remove(&self, key: &K) -> Result<Option<V>, Self::Error> {
        let prev = self.cache_get(key).await?;
        if prev.is_some() {
            cacache::remove(&self.root, self.entry_key(key)).await?;
        }
        Ok(prev)
    }

    fn cache_set_refresh(&mut self, refresh: bool) -> bool {
        let old = self.refresh;
        self.refresh = refresh;
        old
    }
}

#[tokio::test]
async fn test_cache_roundtrip() {
    let root = std::env::temp_dir().join("lgad_analysis_cache_test");
    let cache = CacacheBackend::<u64, Vec<f64>>::new(root.clone(), "test");

    cache.cache_remove(&7).await.unwrap();
    assert_eq!(cache.cache_get(&7).await.unwrap(), None);

    assert_eq!(cache.cache_set(7, vec![1.0, 2.5]).await.unwrap(), None);
    assert_eq!(cache.cache_get(&7).await.unwrap(), Some(vec![1.0, 2.5]));

    let other = CacacheBackend::<u64, Vec<f64>>::new(root.clone(), "other");
    assert_eq!(other.cache_get(&7).await.unwrap(), None);

    assert_eq!(cache.cache_remove(&7).await.unwrap(), Some(vec![1.0, 2.5]));
    let _ = std::fs::remove_dir_all(root);
}
