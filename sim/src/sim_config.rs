use serde::{Deserialize, Serialize};

/// Settings of the simulated robot.
///
/// ```rust,ignore
/// let config = SimConfig::from_json_str(r#"{ "port": 23100, "drop_every": 5 }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub port: u16,
    /// Every n-th pose frame is answered with a drop instead of being
    /// applied. Zero never drops.
    #[serde(default)]
    pub drop_every: u32,
    /// Raw battery word returned by parameter reads.
    #[serde(default = "default_battery_raw")]
    pub battery_raw: u16,
    /// Follow every reply with a 0x00 byte the way the device does.
    #[serde(default = "default_separator")]
    pub separator: bool,
    /// Log hand positions every n-th applied pose. Zero disables it.
    #[serde(default = "default_report_every")]
    pub report_every: u32,
}

fn default_battery_raw() -> u16 {
    0x0A28
}

fn default_separator() -> bool {
    true
}

fn default_report_every() -> u32 {
    50
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            port: 23100,
            drop_every: 0,
            battery_raw: default_battery_raw(),
            separator: default_separator(),
            report_every: default_report_every(),
        }
    }
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let config: SimConfig = serde_json::from_str(json).map_err(|e| format!("Invalid sim config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port number must be between 1 and 65535.".to_string());
        }
        if self.drop_every == 1 {
            tracing::warn!("every pose is dropped, no pose will ever be applied");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = SimConfig::from_json_str(r#"{ "port": 4000 }"#).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.drop_every, 0);
        assert!(config.separator);
        assert_eq!(config.battery_raw, SimConfig::default().battery_raw);
    }

    #[test]
    fn test_zero_port_is_rejected() {
        let err = SimConfig::from_json_str(r#"{ "port": 0 }"#).unwrap_err();
        assert!(err.contains("Port"), "{}", err);
        assert!(SimConfig { drop_every: 1, ..SimConfig::default() }.validate().is_ok());
    }

    #[test]
    fn test_bad_json_is_reported() {
        assert!(SimConfig::from_json_str(r#"{ "port": "x" }"#).is_err());
    }
}
