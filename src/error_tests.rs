//! Tests for error types

#[cfg(test)]
mod tests {
    use super::super::error::ForecastError;

    #[test]
    fn test_api_error() {
        let err = ForecastError::Api("rate limited by provider".to_string());
        assert!(err.to_string().contains("API error"));
        assert!(err.to_string().contains("rate limited by provider"));
    }

    #[test]
    fn test_config_error() {
        let err = ForecastError::Config("missing [question] table".to_string());
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_state_error_names_path() {
        let err = ForecastError::State {
            path: "monitor_state.json".to_string(),
            reason: "expected value at line 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("monitor_state.json"));
        assert!(msg.contains("expected value"));
    }

    #[test]
    fn test_insufficient_data() {
        let err = ForecastError::InsufficientData { needed: 3, got: 1 };
        let msg = err.to_string();
        assert!(msg.contains("need 3"));
        assert!(msg.contains("got 1"));
    }

    #[test]
    fn test_invalid_forecast() {
        let err = ForecastError::InvalidForecast(1.5);
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn test_unknown_trigger() {
        let err = ForecastError::UnknownTrigger("xai_blog_complete".to_string());
        assert!(err.to_string().contains("xai_blog_complete"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ForecastError = io.into();
        assert!(matches!(err, ForecastError::Io(_)));
    }

    #[test]
    fn test_json_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ForecastError = parse.into();
        assert!(err.to_string().contains("JSON parsing error"));
    }

    #[test]
    fn test_error_variants_distinct() {
        let api = ForecastError::Api("test".to_string());
        let extraction = ForecastError::Extraction("test".to_string());

        assert_ne!(api.to_string(), extraction.to_string());
    }
}
