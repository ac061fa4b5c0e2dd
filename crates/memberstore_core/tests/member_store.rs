use memberstore_core::{
    ConfigError, Member, MemberStore, ProvisioningMode, StoreConfig, StoreError,
};

#[test]
fn open_builds_each_mode_over_the_same_contract() {
    let dir = tempfile::tempdir().unwrap();

    for mode in [
        ProvisioningMode::Driver,
        ProvisioningMode::Managed,
        ProvisioningMode::Template,
    ] {
        let config = StoreConfig {
            mode,
            ..StoreConfig::for_database(dir.path().join("shared.db"))
        };
        let store = MemberStore::open(&config).unwrap();
        assert_eq!(store.mode(), mode);
        assert_eq!(store.data_source().is_some(), mode != ProvisioningMode::Driver);
        assert_eq!(
            store.transaction_manager().is_some(),
            mode != ProvisioningMode::Driver
        );

        let member_id = format!("{mode}-member");
        let repo = store.repository();
        repo.save(&Member::new(member_id.as_str(), 1)).unwrap();
        assert_eq!(repo.find_by_id(&member_id).unwrap().money, 1);
    }

    let store = MemberStore::open(&StoreConfig::for_database(dir.path().join("shared.db"))).unwrap();
    for mode in ["driver", "managed", "template"] {
        let member_id = format!("{mode}-member");
        assert!(store.repository().find_by_id(&member_id).is_ok());
    }
}

#[test]
fn open_loads_config_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("store.json");
    let database = dir.path().join("from-json.db");
    let json = serde_json::json!({
        "database": database,
        "mode": "template",
        "pool_max_size": 2,
    });
    std::fs::write(&config_path, json.to_string()).unwrap();

    let config = StoreConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.mode, ProvisioningMode::Template);
    assert_eq!(config.pool_max_size, 2);

    let store = MemberStore::open(&config).unwrap();
    store.repository().save(&Member::new("json", 3)).unwrap();
    assert!(database.exists());
}

#[test]
fn open_rejects_invalid_config() {
    let config = StoreConfig {
        pool_max_size: 0,
        ..StoreConfig::for_database("unused.db")
    };
    let err = MemberStore::open(&config).err().expect("invalid config must fail");
    assert!(matches!(err, StoreError::Config(ConfigError::Invalid(_))));
}

#[test]
fn missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = StoreConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
