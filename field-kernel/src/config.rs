use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FieldConfig {
    pub quads: Vec<String>,
    pub mqtt: MqttConf,
    pub listen: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            quads: vec!["NE".into(), "NW".into(), "SE".into(), "SW".into()],
            mqtt: MqttConf { host: "localhost".into(), port: 1883 },
            listen: "0.0.0.0:8080".into(),
        }
    }
}

pub async fn load_config() -> FieldConfig {
    let path = std::env::var("FIELD_KERNEL_CONFIG").unwrap_or_else(|_| "field.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return FieldConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            warn!(error = %e, "invalid config file, using defaults");
            FieldConfig::default()
        })
    } else {
        warn!(path = %path, "no config file found, using defaults");
        FieldConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_four_quads() {
        let cfg = FieldConfig::default();
        assert_eq!(cfg.quads, vec!["NE", "NW", "SE", "SW"]);
        assert_eq!(cfg.mqtt.port, 1883);
    }

    #[test]
    fn parses_yaml_config() {
        let yaml = r#"
quads: ["A", "B"]
mqtt:
  host: broker.local
  port: 1884
listen: "127.0.0.1:9090"
"#;
        let cfg: FieldConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.quads, vec!["A", "B"]);
        assert_eq!(cfg.mqtt.host, "broker.local");
        assert_eq!(cfg.listen, "127.0.0.1:9090");
    }
}
