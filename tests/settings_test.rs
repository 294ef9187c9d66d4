use std::path::PathBuf;
use serial_test::serial;
use tracing::Level;
use webgate::logging::init_logging;
use webgate::routing::RoutingTable;
use webgate::settings::watcher::reload_rules;
use webgate::settings::*;

const ENV_VARS: [&str; 15] = [
    "WEBGATE_CONFIG_FILE",
    "WEBGATE_BIND_ADDRESS",
    "WEBGATE_HTTP_PORT",
    "WEBGATE_HTTPS_ENABLED",
    "WEBGATE_HTTPS_PORT",
    "WEBGATE_TLS_CERT",
    "WEBGATE_TLS_KEY",
    "WEBGATE_LOG_FORMAT",
    "WEBGATE_LOG_LEVEL",
    "WEBGATE_LOG_OUTPUT",
    "WEBGATE_ROOT",
    "WEBGATE_STATIC_FOLDER",
    "WEBGATE_DYNAMIC_FOLDER",
    "WEBGATE_WELCOME_PAGE",
    "WEBGATE_PERFORMANCE",
];

// 테스트 전후 환경변수 초기화
fn cleanup_env() {
    for name in ENV_VARS {
        std::env::remove_var(name);
    }
}

fn create_test_toml(content: &str) -> (PathBuf, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("webgate.toml");
    std::fs::write(&file_path, content).unwrap();
    (file_path, dir)
}

#[tokio::test]
#[serial]
async fn test_defaults_from_env() {
    cleanup_env();

    let settings = Settings::load().await.unwrap();
    assert_eq!(settings.server.http_port, 8080);
    assert!(!settings.server.https_enabled);
    assert_eq!(settings.logging.level, Level::INFO);
    assert_eq!(settings.router.static_folder, "public");
    assert_eq!(settings.router.welcome_page, "index.html");
    assert!(!settings.router.performance);
}

#[tokio::test]
#[serial]
async fn test_env_overrides() {
    cleanup_env();
    std::env::set_var("WEBGATE_HTTP_PORT", "9000");
    std::env::set_var("WEBGATE_LOG_OUTPUT", "none");
    std::env::set_var("WEBGATE_LOG_LEVEL", "debug");
    std::env::set_var("WEBGATE_ROOT", "/srv/site");
    std::env::set_var("WEBGATE_PERFORMANCE", "true");

    let settings = Settings::from_env().unwrap();
    assert_eq!(settings.server.http_port, 9000);
    assert_eq!(settings.logging.output, LogOutput::Null);
    assert_eq!(settings.logging.level, Level::DEBUG);
    assert_eq!(settings.router.static_root(), PathBuf::from("/srv/site/public"));
    assert!(settings.router.performance);

    cleanup_env();
}

#[tokio::test]
#[serial]
async fn test_invalid_env_values() {
    cleanup_env();

    std::env::set_var("WEBGATE_HTTP_PORT", "99999");
    assert!(Settings::from_env().is_err());
    cleanup_env();

    std::env::set_var("WEBGATE_LOG_LEVEL", "loud");
    assert!(Settings::from_env().is_err());
    cleanup_env();

    std::env::set_var("WEBGATE_HTTPS_ENABLED", "true");
    assert!(matches!(
        Settings::from_env(),
        Err(SettingsError::EnvVarMissing { .. })
    ));
    cleanup_env();

    std::env::set_var("WEBGATE_WELCOME_PAGE", "nested/index.html");
    assert!(matches!(Settings::from_env(), Err(SettingsError::InvalidConfig(_))));
    cleanup_env();
}

#[tokio::test]
#[serial]
async fn test_config_file_env_takes_precedence() {
    cleanup_env();
    let (path, _dir) = create_test_toml(r#"
        [server]
        http_port = 7070

        [router.rules]
        "/bikes(/:id)" = "other/"
    "#);
    std::env::set_var("WEBGATE_CONFIG_FILE", &path);
    std::env::set_var("WEBGATE_HTTP_PORT", "9000");

    let settings = Settings::load().await.unwrap();
    assert_eq!(settings.server.http_port, 7070);
    assert_eq!(settings.router.rules(), vec![
        ("/bikes(/:id)".to_string(), "/other/".to_string()),
        ("/".to_string(), "/index.html".to_string()),
    ]);

    cleanup_env();
}

#[tokio::test]
async fn test_user_root_rule_suppresses_default() {
    let settings: Settings = toml::from_str(r#"
        [router]
        welcome_page = "home.html"

        [router.rules]
        "/" = "/landing.html"
    "#).unwrap();

    assert_eq!(settings.router.rules(), vec![("/".to_string(), "/landing.html".to_string())]);
}

#[tokio::test]
async fn test_reload_rules_updates_table() {
    let (path, _dir) = create_test_toml(r#"
        [router.rules]
        "/cars" = "/vehicles"
    "#);
    let table = RoutingTable::new();
    assert_eq!(reload_rules(&path, &table).await.unwrap(), 2);

    std::fs::write(&path, r#"
        [router.rules]
        "/cars" = "/autos"
        "/bikes" = "/cycles"
    "#).unwrap();
    assert_eq!(reload_rules(&path, &table).await.unwrap(), 3);
    assert_eq!(table.patterns().await, vec!["/cars", "/", "/bikes"]);
}

#[tokio::test]
async fn test_reload_rejects_invalid_pattern() {
    let (path, _dir) = create_test_toml(r#"
        [router.rules]
        "cars" = "/vehicles"
    "#);
    let table = RoutingTable::new();
    assert!(reload_rules(&path, &table).await.is_err());
    assert!(table.is_empty().await);
}

#[test]
fn test_null_output_installs_no_logger() {
    let settings = LogSettings {
        output: LogOutput::Null,
        ..Default::default()
    };
    assert!(init_logging(&settings).is_none());
}
