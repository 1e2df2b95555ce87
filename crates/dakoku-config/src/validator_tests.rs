
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        let result = ConfigValidator::validate(&config);
        assert!(result.is_valid());
        // Credentials are absent by default.
        assert!(result.warnings.iter().any(|w| w.path == "jobcan.email"));
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("09:00"), Some(540));
        assert_eq!(parse_hhmm("9:05"), Some(545));
        assert_eq!(parse_hhmm("23:59"), Some(1439));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("12:60"), None);
        assert_eq!(parse_hhmm("1200"), None);
        assert_eq!(parse_hhmm("12:5"), None);
        assert_eq!(parse_hhmm(""), None);
    }

    #[test]
    fn test_validate_malformed_start() {
        let mut config = Config::default();
        config.schedule.start = "nine".to_string();

        let result = ConfigValidator::validate(&config);
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.path == "schedule.start"));
    }

    #[test]
    fn test_validate_start_after_end() {
        let mut config = Config::default();
        config.schedule.start = "19:00".to_string();
        config.schedule.end = "18:00".to_string();

        let result = ConfigValidator::validate(&config);
        assert!(result.errors.iter().any(|e| e.path == "schedule"));
    }

    #[test]
    fn test_validate_equal_times() {
        let mut config = Config::default();
        config.schedule.end = config.schedule.start.clone();

        let result = ConfigValidator::validate(&config);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_validate_invalid_url() {
        let mut config = Config::default();
        config.slackwf.channel_url = Some("app.slack.com/client".to_string());

        let result = ConfigValidator::validate(&config);
        assert!(result
            .errors
            .iter()
            .any(|e| e.path == "slackwf.channel_url"));
    }

    #[test]
    fn test_validate_zero_port_lets_chrome_pick() {
        let mut config = Config::default();
        config.browser.debug_port = 0;

        let result = ConfigValidator::validate(&config);
        assert!(result.is_valid());
        assert!(!result.warnings.iter().any(|w| w.path == "browser.debug_port"));
    }

    #[test]
    fn test_validate_missing_chrome_path_warning() {
        let mut config = Config::default();
        config.browser.chrome_path = Some(PathBuf::from("/nonexistent/chrome"));

        let result = ConfigValidator::validate(&config);
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.path == "browser.chrome_path"));
    }

    #[test]
    fn test_validate_zero_lifetime() {
        let mut config = Config::default();
        config.runtime.max_lifetime_secs = 0;

        let result = ConfigValidator::validate(&config);
        assert!(result
            .errors
            .iter()
            .any(|e| e.path == "runtime.max_lifetime_secs"));
    }

    #[test]
    fn test_validate_poll_longer_than_lifetime() {
        let mut config = Config::default();
        config.runtime.max_lifetime_secs = 5;
        config.runtime.poll_interval_secs = 10;

        let result = ConfigValidator::validate(&config);
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.path == "runtime.poll_interval_secs"));
    }

    #[test]
    fn test_validate_credentials_present() {
        let mut config = Config::default();
        config.jobcan.email = Some("user@example.com".to_string());
        config.jobcan.password = Some("secret".to_string());

        let result = ConfigValidator::validate(&config);
        assert!(!result.warnings.iter().any(|w| w.path.starts_with("jobcan.")));
    }
