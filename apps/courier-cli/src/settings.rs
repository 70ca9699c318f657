use anyhow::{Context, Result};
use courier_http::ClientSettings;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde_json::{Map, Value, json};
use std::path::Path;

/// Settings given on the command line; they win over every other layer.
#[derive(Debug, Default)]
pub struct Overrides {
    pub timeout_ms: Option<u64>,
    pub allow_insecure_http: bool,
}

impl Overrides {
    fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(timeout_ms) = self.timeout_ms {
            map.insert("timeout_ms".to_owned(), json!(timeout_ms));
        }
        if self.allow_insecure_http {
            map.insert("allow_insecure_http".to_owned(), json!(true));
        }
        Value::Object(map)
    }
}

/// Layers, lowest first: defaults, YAML file, `COURIER__*` environment, CLI.
pub fn figment(config: Option<&Path>, overrides: &Overrides) -> Figment {
    let mut figment = Figment::new();
    if let Some(path) = config {
        figment = figment.merge(Yaml::file(path));
    }
    figment
        .merge(Env::prefixed("COURIER__").split("__"))
        .merge(Serialized::defaults(overrides.to_value()))
}

pub fn load(config: Option<&Path>, overrides: &Overrides) -> Result<ClientSettings> {
    ClientSettings::from_figment(figment(config, overrides)).context("invalid courier settings")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_layers_apply_in_order() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "courier.yaml",
                "base_url: https://file.example.com\ntimeout_ms: 1000\nuser_agent: from-file\n",
            )?;
            jail.set_env("COURIER__TIMEOUT_MS", "2000");
            jail.set_env("COURIER__USER_AGENT", "from-env");

            let overrides = Overrides {
                timeout_ms: Some(3000),
                allow_insecure_http: false,
            };
            let settings = load(Some(Path::new("courier.yaml")), &overrides)
                .map_err(|e| e.to_string())?;

            assert_eq!(settings.base_url.as_deref(), Some("https://file.example.com"));
            assert_eq!(settings.user_agent, "from-env");
            assert_eq!(settings.timeout_ms, 3000);
            Ok(())
        });
    }

    #[test]
    fn test_defaults_without_sources() {
        figment::Jail::expect_with(|_jail| {
            let settings = load(None, &Overrides::default()).map_err(|e| e.to_string())?;
            assert_eq!(settings, ClientSettings::default());
            Ok(())
        });
    }
}
