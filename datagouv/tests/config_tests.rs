use datagouv::{Config, Environment};

#[test]
fn environment_parse_is_case_insensitive() {
    assert_eq!(Environment::parse("demo"), Environment::Demo);
    assert_eq!(Environment::parse("prod"), Environment::Prod);
    assert_eq!(Environment::parse("PROD"), Environment::Prod);
    assert_eq!(Environment::parse(" Prod "), Environment::Prod);
}

#[test]
fn environment_parse_falls_back_to_demo() {
    assert_eq!(Environment::parse("invalid"), Environment::Demo);
    assert_eq!(Environment::parse(""), Environment::Demo);
}

#[test]
fn environment_urls_demo() {
    let env = Environment::Demo;
    assert_eq!(env.api_base_url(), "https://demo.data.gouv.fr/api/");
    assert_eq!(env.site_base_url(), "https://demo.data.gouv.fr/");
    assert_eq!(
        env.tabular_api_base_url(),
        "https://tabular-api.preprod.data.gouv.fr/api/"
    );
}

#[test]
fn environment_urls_prod() {
    let env = Environment::Prod;
    assert_eq!(env.api_base_url(), "https://www.data.gouv.fr/api/");
    assert_eq!(env.site_base_url(), "https://www.data.gouv.fr/");
    assert_eq!(
        env.tabular_api_base_url(),
        "https://tabular-api.data.gouv.fr/api/"
    );
}

#[test]
fn config_defaults_to_demo() {
    let config = Config::new();
    assert_eq!(config.environment, Environment::Demo);
    assert_eq!(config.catalog.api_base, "https://demo.data.gouv.fr/api/");
    assert!(config.catalog.api_key.is_none());
}

#[test]
fn with_environment_rebinds_catalog_and_tabular_urls() {
    let config = Config::new().with_environment(Environment::Prod);
    assert_eq!(config.catalog.api_base, "https://www.data.gouv.fr/api/");
    assert_eq!(config.catalog.site_base, "https://www.data.gouv.fr/");
    assert_eq!(
        config.tabular_base_url,
        "https://tabular-api.data.gouv.fr/api/"
    );
}

#[test]
fn with_api_key_reaches_the_catalog_configuration() {
    let config = Config::new().with_api_key("secret");
    assert_eq!(config.catalog.api_key.as_deref(), Some("secret"));
}

#[test]
fn with_user_agent_reaches_the_catalog_configuration() {
    let config = Config::new().with_user_agent("my-agent/2.0");
    assert_eq!(config.user_agent, "my-agent/2.0");
    assert_eq!(config.catalog.user_agent.as_deref(), Some("my-agent/2.0"));
}

#[test]
fn builder_keeps_api_key_across_environment_switch() {
    let config = Config::new()
        .with_api_key("secret")
        .with_environment(Environment::Prod);
    assert_eq!(config.catalog.api_key.as_deref(), Some("secret"));
    assert_eq!(config.catalog.api_base, "https://www.data.gouv.fr/api/");
}
