use super::validation::validate_config;
use super::*;
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn device(name: &str, ip: &str) -> DeviceConfig {
    DeviceConfig {
        name: name.to_string(),
        ip: ip.to_string(),
        always_light: false,
        cloud_coverage: None,
        light_times: LightOffsets::default(),
    }
}

fn create_test_config(devices: Vec<DeviceConfig>) -> GlobalConfig {
    GlobalConfig {
        devices,
        devices_ips: None,
        light_times: WindowOffsets {
            erev: 20,
            motzei: 10,
        },
        sleep_time: 30,
        testing: false,
        weather: WeatherSettings::default(),
    }
}

#[test]
fn test_load_full_json_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            "devices": [
                {
                    "name": "Dining Room",
                    "ip": "192.168.1.40",
                    "always_light": true,
                    "cloud_coverage": 80,
                    "light_times": { "night": 15, "morning": -10 }
                },
                { "name": "Hallway", "ip": "192.168.1.41" }
            ],
            "light_times": { "erev": 20, "motzei": 10 },
            "sleep_time": 15,
            "testing": true
        }"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();

    assert_eq!(config.sleep_time, 15);
    assert!(config.testing);
    assert_eq!(config.light_times, WindowOffsets { erev: 20, motzei: 10 });
    assert_eq!(config.devices.len(), 2);

    let dining = config.device("dining room").unwrap();
    assert!(dining.always_light);
    assert_eq!(dining.cloud_threshold(), Some(80));
    assert_eq!(dining.light_times, LightOffsets { night: 15, morning: -10 });

    let hallway = config.device("192.168.1.41").unwrap();
    assert!(!hallway.always_light);
    assert_eq!(hallway.cloud_threshold(), None);
    assert_eq!(hallway.light_times, LightOffsets::default());
    assert_eq!(config.weather, WeatherSettings::default());
}

#[test]
fn test_load_toml_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
sleep_time = 20

[light_times]
erev = 18

[[devices]]
name = "Kitchen"
ip = "10.0.0.5"
cloud_coverage = 0
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.sleep_time, 20);
    assert_eq!(config.light_times.erev, 18);
    assert_eq!(config.light_times.motzei, 0);
    // A zero threshold disables the weather check
    assert_eq!(config.devices[0].cloud_threshold(), None);
}

#[test]
fn test_legacy_devices_ips_are_migrated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            "devices": [{ "name": "Porch", "ip": "10.0.0.2", "always_light": true }],
            "devices_ips": ["10.0.0.2", "10.0.0.3"],
            "sleep_time": 30,
            "testing": false
        }"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert!(config.devices_ips.is_none());
    assert_eq!(config.devices.len(), 2);
    assert!(config.device("Porch").unwrap().always_light);
    let migrated = config.device("10.0.0.3").unwrap();
    assert_eq!(migrated.name, "10.0.0.3");
    assert!(!migrated.always_light);
}

#[test]
fn test_load_errors_are_classified() {
    let dir = tempdir().unwrap();

    let missing = dir.path().join("missing.json");
    assert!(matches!(
        load_from_path(&missing),
        Err(ConfigLoadError::Read { .. })
    ));

    let corrupt = dir.path().join("corrupt.json");
    fs::write(&corrupt, r#"{ "devices": [ "#).unwrap();
    assert!(matches!(
        load_from_path(&corrupt),
        Err(ConfigLoadError::Parse { .. })
    ));

    let invalid = dir.path().join("invalid.json");
    fs::write(&invalid, r#"{ "sleep_time": 0 }"#).unwrap();
    let err = load_from_path(&invalid).unwrap_err();
    assert!(matches!(err, ConfigLoadError::Invalid { .. }));
    assert!(err.to_string().contains("sleep_time"));

    let overflowing = dir.path().join("overflowing.json");
    fs::write(
        &overflowing,
        r#"{ "devices": [{ "name": "A", "ip": "10.0.0.1", "light_times": { "night": -2147483648, "morning": 0 } }] }"#,
    )
    .unwrap();
    let err = load_from_path(&overflowing).unwrap_err();
    assert!(matches!(err, ConfigLoadError::Invalid { .. }));
    assert!(err.to_string().contains("light_times.night"));
}

#[test]
fn test_validation_accepts_reasonable_config() {
    let config = create_test_config(vec![device("A", "10.0.0.1"), device("B", "10.0.0.2")]);
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_validation_sleep_time_bounds() {
    let mut config = create_test_config(vec![]);
    config.sleep_time = 0;
    assert!(validate_config(&config).is_err());
    config.sleep_time = 24 * 60 + 1;
    assert!(validate_config(&config).is_err());
    config.sleep_time = 1;
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_validation_window_offsets() {
    let mut config = create_test_config(vec![]);
    config.light_times.erev = 24 * 60;
    assert!(validate_config(&config).is_ok());
    config.light_times.erev = 24 * 60 + 1;
    assert!(validate_config(&config).is_err());
    config.light_times.erev = 0;
    config.light_times.motzei = 5000;
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_validation_device_fields() {
    let mut bad_threshold = device("A", "10.0.0.1");
    bad_threshold.cloud_coverage = Some(101);
    assert!(validate_config(&create_test_config(vec![bad_threshold])).is_err());

    let mut bad_offset = device("A", "10.0.0.1");
    bad_offset.light_times.night = -721;
    assert!(validate_config(&create_test_config(vec![bad_offset])).is_err());

    let mut extreme_offset = device("A", "10.0.0.1");
    extreme_offset.light_times.night = i32::MIN;
    assert!(validate_config(&create_test_config(vec![extreme_offset.clone()])).is_err());
    extreme_offset.light_times.night = 0;
    extreme_offset.light_times.morning = i32::MAX;
    assert!(validate_config(&create_test_config(vec![extreme_offset])).is_err());

    assert!(validate_config(&create_test_config(vec![device("", "10.0.0.1")])).is_err());
    assert!(validate_config(&create_test_config(vec![device("A", " ")])).is_err());

    let duplicate_names = vec![device("Lamp", "10.0.0.1"), device("lamp", "10.0.0.2")];
    assert!(validate_config(&create_test_config(duplicate_names)).is_err());

    let duplicate_ips = vec![device("A", "10.0.0.1"), device("B", "10.0.0.1")];
    assert!(validate_config(&create_test_config(duplicate_ips)).is_err());
}

#[test]
#[serial]
fn test_resolve_config_path_precedence() {
    let dir = tempdir().unwrap();
    let from_env = dir.path().join("env.json");

    let original = std::env::var(crate::common::constants::CONFIG_ENV_VAR).ok();
    unsafe {
        std::env::set_var(crate::common::constants::CONFIG_ENV_VAR, &from_env);
    }

    let explicit = Path::new("/etc/lightkeeper/explicit.json");
    let resolved_explicit = resolve_config_path(Some(explicit));
    let resolved_env = resolve_config_path(None);

    unsafe {
        match original {
            Some(val) => std::env::set_var(crate::common::constants::CONFIG_ENV_VAR, val),
            None => std::env::remove_var(crate::common::constants::CONFIG_ENV_VAR),
        }
    }

    assert_eq!(resolved_explicit.unwrap(), explicit);
    assert_eq!(resolved_env.unwrap(), from_env);
}
