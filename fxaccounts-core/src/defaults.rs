use crate::{config::AccountsConfig, Environment};

/// Per-environment server defaults.
pub trait DefaultConfig {
    /// Builds the configuration for `environment`.
    fn from_environment(environment: &Environment) -> Self
    where
        Self: Sized;
}

impl DefaultConfig for AccountsConfig {
    fn from_environment(environment: &Environment) -> Self {
        match environment {
            Environment::Staging => Self {
                remote_url: "https://accounts.stage.mozaws.net/".to_string(),
                auth_server_url: "https://api-accounts.stage.mozaws.net/v1".to_string(),
                ..Self::default()
            },
            Environment::Production => Self::default(),
        }
    }
}
