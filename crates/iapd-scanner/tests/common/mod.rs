#![allow(dead_code)]

use iapd_core::AppConfig;
use iapd_scanner::{FallbackFetcher, IapdClient, Result};
use iapd_session::mock::ScriptedTransport;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("read fixture {}: {e}", path.display()))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fallback that records its invocations instead of spawning a process.
#[derive(Default)]
pub struct RecordingFallback {
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl RecordingFallback {
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait::async_trait]
impl FallbackFetcher for RecordingFallback {
    async fn fetch(&self, url: &str, path: &Path) -> Result<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((url.to_string(), path.to_path_buf()));
        Ok(())
    }
}

pub struct TestEnv {
    pub transport: Arc<ScriptedTransport>,
    pub fallback: Arc<RecordingFallback>,
    pub config: AppConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        init_tracing();

        let mut config = AppConfig::default();
        config.session.min_delay_secs = 0.0;
        config.session.max_delay_secs = 0.0;

        Self {
            transport: Arc::new(ScriptedTransport::new()),
            fallback: Arc::new(RecordingFallback::default()),
            config,
        }
    }

    pub fn serve(&self, fixtures: &[&str]) -> &Self {
        for name in fixtures {
            self.transport.push_page(fixture(name));
        }
        self
    }

    pub fn client(&self) -> IapdClient {
        IapdClient::with_transport(&self.config, self.transport.clone(), self.fallback.clone())
    }
}

pub fn form_field<'a>(form: &'a [(String, String)], name: &str) -> Option<&'a str> {
    form.iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}
