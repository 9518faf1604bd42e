//! Serialized forms shared with config files and the settings boundary

use chrono::{TimeZone, Utc};
use timeguard_domain::{
    AppId, BlockDirective, Config, EnforcementModel, PlatformProfile, TimeguardError,
};

#[test]
fn indefinite_directive_omits_expiry() {
    let directive = BlockDirective::indefinite(AppId::new("Com.Game"));
    let json = serde_json::to_value(&directive).expect("serialize");

    assert_eq!(json, serde_json::json!({ "app": "com.game" }));
}

#[test]
fn timed_directive_round_trips_expiry() {
    let expiry = Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).single().expect("valid instant");
    let directive = BlockDirective::until(AppId::new("com.video"), expiry);

    let json = serde_json::to_string(&directive).expect("serialize");
    let parsed: BlockDirective = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(parsed.expires_at, Some(expiry));
    assert!(parsed.is_active_at(expiry - chrono::Duration::seconds(1)));
    assert!(!parsed.is_active_at(expiry));
}

#[test]
fn config_profile_reads_from_toml() {
    let config: Config = toml::from_str(
        r#"
        [platform]
        profile = "shield"

        [enforcement]
        poll_interval_ms = 1000
        "#,
    )
    .expect("toml should parse");

    assert_eq!(config.platform.profile, PlatformProfile::Shield);
    assert_eq!(config.enforcement.poll_interval(), std::time::Duration::from_secs(1));
    assert_eq!(config.sync.lookback_days, 7);
}

#[test]
fn wire_names_parse_loosely() {
    assert_eq!("Poll-And-Kill".parse::<EnforcementModel>(), Ok(EnforcementModel::PollAndKill));
    assert_eq!(EnforcementModel::DeclarativeShield.to_string(), "declarative_shield");
    assert!("windows".parse::<PlatformProfile>().is_err());
}

#[test]
fn errors_deserialize_from_tagged_json() {
    let parsed: TimeguardError =
        serde_json::from_str(r#"{"type":"CapabilityUnavailable","message":"shield"}"#)
            .expect("deserialize");

    assert_eq!(parsed, TimeguardError::CapabilityUnavailable("shield".into()));
    assert_eq!(parsed.label(), "capability_unavailable");
}
