//! Environment values scoping one target deployment.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Key holding the environment name.
pub const ENV_NAME_KEY: &str = "AZURE_ENV_NAME";
/// Key holding the deployment location.
pub const LOCATION_KEY: &str = "AZURE_LOCATION";
/// Key holding the target subscription.
pub const SUBSCRIPTION_ID_KEY: &str = "AZURE_SUBSCRIPTION_ID";

/// Environment shared between its owner and the providers operating on it.
pub type SharedEnvironment = Arc<RwLock<Environment>>;

/// Named set of key/value settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub values: HashMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an environment with the given name already set.
    pub fn named(name: impl Into<String>) -> Self {
        let mut env = Self::new();
        env.set_env_name(name);
        env
    }

    /// Wrap into a handle that can be shared with providers.
    pub fn into_shared(self) -> SharedEnvironment {
        Arc::new(RwLock::new(self))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn env_name(&self) -> Option<&str> {
        self.get(ENV_NAME_KEY)
    }

    pub fn set_env_name(&mut self, name: impl Into<String>) {
        self.set(ENV_NAME_KEY, name);
    }

    pub fn location(&self) -> Option<&str> {
        self.get(LOCATION_KEY)
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.set(LOCATION_KEY, location);
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.get(SUBSCRIPTION_ID_KEY)
    }

    pub fn set_subscription_id(&mut self, id: impl Into<String>) {
        self.set(SUBSCRIPTION_ID_KEY, id);
    }
}
