use serde::{Deserialize, Serialize};

/// User configuration from Relabel Config.yaml
///
/// Contains the file-selection rules and runtime preferences for relabel runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelabelConfig {
    #[serde(rename = "Relabel_Settings", default)]
    pub settings: RelabelSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelabelSettings {
    /// Extension (without the dot) of candidate resource files
    #[serde(rename = "Resource Extension", default = "default_resource_extension")]
    pub resource_extension: String,

    /// File that must exist directly under the project root
    #[serde(rename = "Marker File", default = "default_marker_file")]
    pub marker_file: String,

    /// `type` attribute value that marks a plain string entry
    #[serde(rename = "String Type", default = "default_string_type")]
    pub string_type: String,

    #[serde(rename = "Allow Empty Replacement", default)]
    pub allow_empty_replacement: bool,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,

    #[serde(rename = "Log Directory", default = "default_log_directory")]
    pub log_directory: String,
}

impl Default for RelabelSettings {
    fn default() -> Self {
        Self {
            resource_extension: default_resource_extension(),
            marker_file: default_marker_file(),
            string_type: default_string_type(),
            allow_empty_replacement: false,
            debug_mode: false,
            log_directory: default_log_directory(),
        }
    }
}

fn default_resource_extension() -> String {
    "resx".to_string()
}

fn default_marker_file() -> String {
    "project.info.xml".to_string()
}

fn default_string_type() -> String {
    "String".to_string()
}

fn default_log_directory() -> String {
    "logs".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relabel_settings_defaults() {
        let settings = RelabelSettings::default();
        assert_eq!(settings.resource_extension, "resx");
        assert_eq!(settings.marker_file, "project.info.xml");
        assert_eq!(settings.string_type, "String");
        assert!(!settings.allow_empty_replacement);
        assert!(!settings.debug_mode);
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let yaml = "Relabel_Settings:\n  Debug Mode: true\n";
        let config: RelabelConfig = serde_yaml_ng::from_str(yaml).unwrap();

        assert!(config.settings.debug_mode);
        assert_eq!(config.settings.marker_file, "project.info.xml");
        assert_eq!(config.settings.log_directory, "logs");
    }
}
