use std::{env, fs, time::Duration};

use rolegate_auth::rules::AuthorizationRequirement;
use rolegate_server::config::loader::load_config;

const DEMO_TOML: &str = r#"
[server]
host = "127.0.0.1"
port = 8081

[logging]
level = "debug"

[auth]
realm = "Demo"

[auth.roles]
declared = ["admin", "userEdit", "userView"]
hierarchy = ["admin > userEdit > userView"]

[[auth.rules]]
pattern = "/actuator/prometheus"
requirement = "public"

[[auth.rules]]
pattern = "/admin/**"
requirement = { role = "admin" }

[[auth.rules]]
pattern = "/**"
requirement = "authenticated"

[[auth.operations]]
id = "api.testEdit"
requirement = { role = "userEdit" }

[auth.password]
memory_kib = 4096
iterations = 1

[auth.session]
idle_timeout = "5m"
max_lifetime = "1h"

[auth.remember_me]
key = "test"
token_validity = "2d"

[[auth.users]]
username = "userView"
password = "passView"
roles = ["userView"]
"#;

#[test]
fn config_parsing_and_env_overrides() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("rolegate.toml");
    fs::write(&path, DEMO_TOML).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.auth.realm, "Demo");
    assert_eq!(cfg.auth.rules.len(), 3);
    assert_eq!(cfg.auth.rules[0].requirement, AuthorizationRequirement::Public);
    assert_eq!(
        cfg.auth.rules[2].requirement,
        AuthorizationRequirement::AuthenticatedOnly
    );
    assert_eq!(cfg.auth.operations[0].id, "api.testEdit");
    assert_eq!(cfg.auth.session.idle_timeout, Duration::from_secs(300));
    assert_eq!(cfg.auth.session.max_lifetime, Duration::from_secs(3600));
    assert_eq!(
        cfg.auth.remember_me.token_validity,
        Duration::from_secs(2 * 24 * 3600)
    );
    assert_eq!(cfg.auth.remember_me.key.as_deref(), Some("test"));
    assert_eq!(cfg.auth.users.len(), 1);
    assert_eq!(cfg.auth.users[0].roles, vec!["userView".to_string()]);

    // Unspecified sections keep their defaults
    assert!(cfg.metrics.enabled);
    assert!(cfg.auth.session.enabled);
    assert_eq!(cfg.auth.session.cookie_name, "SESSION");
    assert_eq!(cfg.auth.remember_me.parameter, "remember-me");

    // 2) Env override should win over file
    unsafe {
        env::set_var("ROLEGATE__SERVER__PORT", "9090");
        env::set_var("ROLEGATE__METRICS__ENABLED", "false");
    }
    let cfg_env = load_config(path.to_str());
    unsafe {
        env::remove_var("ROLEGATE__SERVER__PORT");
        env::remove_var("ROLEGATE__METRICS__ENABLED");
    }
    let cfg_env = cfg_env.expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9090);
    assert!(!cfg_env.metrics.enabled);
    assert_eq!(cfg_env.auth.realm, "Demo");
}

#[test]
fn invalid_auth_config_is_rejected() {
    let dir = tempfile::tempdir().expect("tmp dir");

    // Cyclic hierarchy
    let cyclic = dir.path().join("cyclic.toml");
    fs::write(
        &cyclic,
        r#"
[auth.roles]
declared = ["a", "b"]
hierarchy = ["a > b", "b > a"]
"#,
    )
    .expect("write toml");
    let err = load_config(cyclic.to_str()).expect_err("expected cycle error");
    assert!(err.contains("cycle"), "{err}");

    // Rule referencing an undeclared role
    let undeclared = dir.path().join("undeclared.toml");
    fs::write(
        &undeclared,
        r#"
[[auth.rules]]
pattern = "/ops/**"
requirement = { role = "operator" }
"#,
    )
    .expect("write toml");
    let err = load_config(undeclared.to_str()).expect_err("expected undeclared role error");
    assert!(err.contains("operator"), "{err}");

    // User with both a password and a hash
    let ambiguous = dir.path().join("ambiguous.toml");
    fs::write(
        &ambiguous,
        r#"
[[auth.users]]
username = "userView"
password = "passView"
password_hash = "$argon2id$v=19$m=4096,t=1,p=1$c2FsdHNhbHQ$aGFzaA"
roles = ["userView"]
"#,
    )
    .expect("write toml");
    assert!(load_config(ambiguous.to_str()).is_err());

    // Stored hash that is not an argon2 PHC string
    let bcrypt = dir.path().join("bcrypt.toml");
    fs::write(
        &bcrypt,
        r#"
[[auth.users]]
username = "userView"
password_hash = "$2a$16$Mv3GLf6ZMiu9WdWhIDAbu.KN9Wg5zPgdmJgXhHv5Gxsw1lR3.R0Ha"
roles = ["userView"]
"#,
    )
    .expect("write toml");
    let err = load_config(bcrypt.to_str()).expect_err("expected unusable hash error");
    assert!(err.contains("password_hash"), "{err}");

    // Zero session idle timeout
    let zero_ttl = dir.path().join("zero.toml");
    fs::write(
        &zero_ttl,
        r#"
[auth.session]
idle_timeout = "0s"
"#,
    )
    .expect("write toml");
    assert!(load_config(zero_ttl.to_str()).is_err());
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");
    let err = load_config(path.to_str()).expect_err("expected missing file error");
    assert!(err.contains("does not exist"), "{err}");
}
