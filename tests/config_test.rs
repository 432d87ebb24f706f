use anyhow::Result;
use auth_sidecar::acl::GROUP_AUTHENTICATED;
use auth_sidecar::config::Config;
use std::fs;
use tempfile::tempdir;

#[test]
fn full_document_parses_every_branch() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let yaml = r#"
listen:
  addr: "0.0.0.0"
  port: 9090
cookie:
  authentication_key: "super-secret"
  domain: example.com
  expire: 1800
login:
  title: "Example Sign-in"
  default_redirect: "https://example.com/"
acl:
  rule_sets:
    - rules:
        - field: host
          equals: "example.com"
      allow:
        - "@_authenticated"
audit_log:
  targets:
    - "fd://stdout"
  events:
    - "login_success"
    - "access_denied"
  headers:
    - "x-request-id"
providers:
  simple:
    users:
      - user: alice
        pass: "aGFzaA=="
        groups: [admins]
mfa:
  totp:
    enabled: true
"#;
    fs::write(&config_path, yaml)?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.listen.port, 9090);
    assert_eq!(config.listen.addr, "0.0.0.0");
    assert_eq!(config.cookie.authentication_key, "super-secret");
    assert_eq!(config.login.title, "Example Sign-in");
    assert_eq!(config.acl.rule_sets.len(), 1);
    assert_eq!(config.audit_log.targets, vec!["fd://stdout".to_string()]);

    let document = config.as_document();
    assert!(document
        .get("providers")
        .and_then(|p| p.get("simple"))
        .is_some());
    assert!(document.get("mfa").and_then(|m| m.get("totp")).is_some());

    let acl = config.acl.build()?;
    let identity = auth_sidecar::identity::Identity::from_raw("alice", vec!["admins".into()]);
    let mut headers = std::collections::HashMap::new();
    headers.insert("host".to_string(), "example.com".to_string());
    assert!(acl.has_access(&identity, &headers));
    let _ = GROUP_AUTHENTICATED;

    Ok(())
}

#[test]
fn missing_cookie_section_fails_to_parse() {
    let result = Config::from_str("listen:\n  port: 8080\n");
    assert!(result.is_err(), "cookie.authentication_key is required");
}

#[test]
fn minimal_document_applies_every_default() -> Result<()> {
    let config = Config::from_str("cookie:\n  authentication_key: k\n")?;
    assert_eq!(config.listen.addr, "127.0.0.1");
    assert_eq!(config.listen.port, 8080);
    assert_eq!(config.cookie.expire, 3600);
    assert_eq!(config.cookie.prefix, "auth-sidecar");
    assert!(config.acl.rule_sets.is_empty());
    Ok(())
}
