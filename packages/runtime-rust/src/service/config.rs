/// Runtime configuration for operation pipelines.
///
/// Passed to the registry at construction and applied to every pipeline it
/// composes.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Input keys whose values are replaced by a redaction marker in
    /// invocation log lines.
    pub filter_parameters: Vec<String>,
    /// Whether the start log line includes the (redacted) input at all.
    pub log_arguments: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            filter_parameters: vec!["password".to_string()],
            log_arguments: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_config_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.filter_parameters, vec!["password"]);
        assert!(config.log_arguments);
    }
}
