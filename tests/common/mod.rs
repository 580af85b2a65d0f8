//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use bucket_fs::config::Configuration;
use bucket_fs::connector::memory::InMemoryConnector;
use bucket_fs::driver::Driver;
use bucket_fs::node::{Directory, File};

pub const BUCKET: &str = "test-bucket";

/// An in-process bucket with a driver bound to it
pub struct TestHarness {
    pub store: InMemoryConnector,
    pub driver: Arc<Driver>,
}

impl TestHarness {
    pub async fn new() -> Self {
        let store = InMemoryConnector::with_bucket(BUCKET);
        let driver = Arc::new(
            Driver::connect(configuration(), BUCKET, &store)
                .await
                .unwrap(),
        );
        Self { store, driver }
    }

    /// A second bucket in the same store
    pub async fn bucket(&self, name: &str) -> Arc<Driver> {
        self.store.create_bucket(name);
        Arc::new(Driver::connect(configuration(), name, &self.store).await.unwrap())
    }

    /// Write `(key, content)` pairs straight through the driver
    pub async fn seed(&self, objects: &[(&str, &str)]) {
        for (key, content) in objects {
            if key.ends_with('/') {
                assert!(self.driver.make_directory(key).await);
            } else {
                self.file(key).write(content.to_string()).await.unwrap();
            }
        }
    }

    pub fn root(&self) -> Directory {
        Directory::new("").with_driver(self.driver.clone())
    }

    pub fn file(&self, path: &str) -> File {
        File::new(path).with_driver(self.driver.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.keys(BUCKET)
    }
}

pub fn configuration() -> Configuration {
    Configuration::new("test-access", "test-secret")
}

pub fn paths<T, F: Fn(&T) -> String>(items: &[T], path: F) -> Vec<String> {
    let mut out: Vec<String> = items.iter().map(path).collect();
    out.sort();
    out
}
