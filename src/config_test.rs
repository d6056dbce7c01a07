use super::*;

// Unique env var names per test avoid races between parallel tests.

#[test]
fn parse_bool_true_variants() {
    for val in ["1", "true", "yes", "on", "TRUE", "  On "] {
        assert_eq!(parse_bool(val), Some(true), "expected true for {val:?}");
    }
}

#[test]
fn parse_bool_false_variants() {
    for val in ["0", "false", "no", "off", "False"] {
        assert_eq!(parse_bool(val), Some(false), "expected false for {val:?}");
    }
}

#[test]
fn parse_bool_invalid_returns_none() {
    assert_eq!(parse_bool("maybe"), None);
    assert_eq!(parse_bool(""), None);
}

#[test]
fn env_bool_unset_returns_none() {
    assert_eq!(env_bool("__TEST_CFG_SURELY_UNSET_5521__"), None);
}

#[test]
fn cookie_secure_explicit_wins() {
    let discord = DiscordConfig { client_id: "id".into(), redirect_uri: "https://hub.example/auth/discord/callback".into() };
    assert!(!cookie_secure(Some(false), Some(&discord)));
    assert!(cookie_secure(Some(true), None));
}

#[test]
fn cookie_secure_inferred_from_https_redirect() {
    let https = DiscordConfig { client_id: "id".into(), redirect_uri: "https://hub.example/cb".into() };
    let http = DiscordConfig { client_id: "id".into(), redirect_uri: "http://localhost:3000/cb".into() };
    assert!(cookie_secure(None, Some(&https)));
    assert!(!cookie_secure(None, Some(&http)));
    assert!(!cookie_secure(None, None));
}

#[test]
fn env_parse_falls_back_on_garbage() {
    let key = "__TEST_CFG_PARSE_GARBAGE_3318__";
    unsafe { std::env::set_var(key, "ten") };
    assert_eq!(env_parse(key, 10_u64), 10);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_reads_trimmed_value() {
    let key = "__TEST_CFG_PARSE_OK_3319__";
    unsafe { std::env::set_var(key, " 42 ") };
    assert_eq!(env_parse(key, 10_u64), 42);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_strict_rejects_garbage() {
    let key = "__TEST_CFG_STRICT_BAD_3320__";
    unsafe { std::env::set_var(key, "eighty") };
    let err = env_parse_strict(key, 80_u16).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var, .. } if var == key));
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_strict_defaults_when_unset() {
    assert_eq!(env_parse_strict("__TEST_CFG_STRICT_UNSET_3321__", 8080_u16).unwrap(), 8080);
}

#[test]
fn cookie_secret_unset_or_blank_is_none() {
    assert_eq!(cookie_secret(None).unwrap(), None);
    assert_eq!(cookie_secret(Some("   ".into())).unwrap(), None);
}

#[test]
fn cookie_secret_too_short_is_invalid() {
    let err = cookie_secret(Some("short-secret".into())).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "COOKIE_SECRET", .. }));
    assert!(!err.to_string().contains("short-secret"));
}

#[test]
fn cookie_secret_is_redacted_in_debug() {
    let raw = "k".repeat(MIN_COOKIE_SECRET_BYTES);
    let secret = cookie_secret(Some(raw.clone())).unwrap().unwrap();
    assert_eq!(secret.as_bytes(), raw.as_bytes());
    assert!(!format!("{secret:?}").contains(&raw));
}
