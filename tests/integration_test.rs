use chatdesk::config::Config;

fn config(api_url: &str, api_token: Option<&str>) -> Config {
    Config {
        api_url: api_url.to_string(),
        api_token: api_token.map(ToOwned::to_owned),
        ..Config::default()
    }
}

#[test]
fn test_config_validation_requires_token_for_remote_api() {
    assert!(config("https://desk.example.com", None).validate().is_err());
    assert!(config("https://desk.example.com", Some("token"))
        .validate()
        .is_ok());
}

#[test]
fn test_config_validation_allows_local_endpoint_without_token() {
    assert!(config("http://localhost:8000", None).validate().is_ok());
    assert!(config("http://127.0.0.1:8000", None).validate().is_ok());
}

#[test]
fn test_config_validation_rejects_bad_scheme_and_zero_bound() {
    assert!(config("ftp://localhost", None).validate().is_err());

    let mut zero_bound = config("http://localhost:8000", None);
    zero_bound.max_line_bytes = 0;
    assert!(zero_bound.validate().is_err());
}
