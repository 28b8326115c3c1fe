//! ## Configuration Module
//!
//! Defines [`GbtClientConfig`], the client side settings of the codec, usually read from a TOML
//! file:
//!
//! ```toml
//! capabilities = ["coinbasetxn", "workid", "coinbase/append", "longpoll"]
//! foreign_submission = false
//! longpoll = true
//! ```
use crate::{
    capabilities::{Capabilities, Capability},
    error::Error,
    methods::client_to_server::WorkRequest,
};
use ext_config::{Config, File, FileFormat};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GbtClientConfig {
    #[serde(default = "default_capabilities")]
    capabilities: Vec<String>,
    #[serde(default)]
    foreign_submission: bool,
    #[serde(default = "default_true")]
    longpoll: bool,
}

fn default_capabilities() -> Vec<String> {
    Capabilities::default_client()
        .names()
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_true() -> bool {
    true
}

impl Default for GbtClientConfig {
    fn default() -> Self {
        GbtClientConfig {
            capabilities: default_capabilities(),
            foreign_submission: false,
            longpoll: true,
        }
    }
}

impl GbtClientConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        let settings = Config::builder()
            .add_source(File::from_str(s, FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// The configured capabilities as a mask. Unknown names are dropped. `longpoll` is added or
    /// removed according to the `longpoll` flag.
    pub fn capability_mask(&self) -> Capabilities {
        let mut caps = Capabilities::empty();
        for name in &self.capabilities {
            if !caps.insert_name(name) {
                warn!("Ignoring unknown capability `{}` in config", name);
            }
        }
        if self.longpoll {
            caps.insert(Capability::LongPoll);
        } else {
            caps.0 &= !Capability::LongPoll.bit();
        }
        caps
    }

    pub fn foreign_submission(&self) -> bool {
        self.foreign_submission
    }

    pub fn longpoll(&self) -> bool {
        self.longpoll
    }

    /// A work request with the configured capabilities. `longpoll_id` is only attached when
    /// long polling is enabled.
    pub fn work_request(&self, longpoll_id: Option<&str>) -> WorkRequest {
        let req = WorkRequest::new(self.capability_mask());
        match longpoll_id {
            Some(id) if self.longpoll => req.with_longpoll_id(id),
            _ => req,
        }
    }
}
