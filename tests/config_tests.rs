use figment::Jail;
use std::path::Path;
use tidal_playlist::config::Config;

fn load(path: Option<&Path>) -> figment::error::Result<Config> {
    Config::load(path).map_err(|e| format!("{:#}", e).into())
}

#[test]
fn defaults_without_any_file() {
    Jail::expect_with(|_jail| {
        let cfg = load(None)?;
        assert_eq!(cfg.tidal.country_code, "US");
        assert_eq!(cfg.playlist.default_name, "My Artists Mix");
        assert_eq!(cfg.playlist.count, 0);
        assert!(cfg.filters.whitelist.is_empty());
        assert!(cfg.log_dir.is_none());
        Ok(())
    });
}

#[test]
fn local_yaml_is_discovered() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.yaml",
            r#"
tidal:
  client_id: abc
  client_secret: shh
  country_code: "SE"
playlist:
  default_name: Weekly
  count: 25
filters:
  blacklist: ["123", "456"]
"#,
        )?;
        let cfg = load(None)?;
        assert_eq!(cfg.tidal.client_id, "abc");
        assert_eq!(cfg.tidal.country_code, "SE");
        assert_eq!(cfg.playlist.default_name, "Weekly");
        assert_eq!(cfg.playlist.count, 25);
        assert_eq!(cfg.filters.blacklist, vec!["123", "456"]);
        assert!(cfg.validate().is_ok());
        Ok(())
    });
}

#[test]
fn environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "custom.yaml",
            "tidal:\n  client_id: from-file\n  client_secret: s\nplaylist:\n  count: 5\n",
        )?;
        jail.set_env("TIDAL_CLIENT_ID", "from-env");
        jail.set_env("TIDAL_COUNTRY_CODE", "DE");
        jail.set_env("TIDAL_PLAYLIST__COUNT", "40");

        let cfg = load(Some(Path::new("custom.yaml")))?;
        assert_eq!(cfg.tidal.client_id, "from-env");
        assert_eq!(cfg.tidal.client_secret, "s");
        assert_eq!(cfg.tidal.country_code, "DE");
        assert_eq!(cfg.playlist.count, 40);
        Ok(())
    });
}

#[test]
fn explicit_missing_path_is_an_error() {
    Jail::expect_with(|_jail| {
        let err = Config::load(Some(Path::new("nope.yaml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
        Ok(())
    });
}

#[test]
fn validation_rules() {
    let mut cfg = Config::default();
    assert!(cfg.validate_credentials().is_err());

    cfg.tidal.client_id = "id".into();
    cfg.tidal.client_secret = "secret".into();
    assert!(cfg.validate_credentials().is_ok());

    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("count"));

    cfg.playlist.count = 1;
    assert!(cfg.validate().is_ok());
}

#[test]
fn numeric_ids_in_yaml_and_env_load_as_strings() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.yaml",
            "tidal:\n  client_secret: 987\nfilters:\n  whitelist: [\"42\", 17]\n  blacklist: [7804, 3520813]\n",
        )?;
        jail.set_env("TIDAL_CLIENT_ID", "12345");

        let cfg = load(None)?;
        assert_eq!(cfg.tidal.client_id, "12345");
        assert_eq!(cfg.tidal.client_secret, "987");
        assert_eq!(cfg.filters.whitelist, vec!["42", "17"]);
        assert_eq!(cfg.filters.blacklist, vec!["7804", "3520813"]);
        Ok(())
    });
}

#[test]
fn create_overrides_name_and_count() {
    let mut cfg = Config::default();
    cfg.playlist.default_name = "Configured".into();
    cfg.playlist.count = 10;

    assert_eq!(
        cfg.playlist_name(Some("Positional".into()), Some("Flag".into())),
        "Positional"
    );
    assert_eq!(cfg.playlist_name(None, Some("Flag".into())), "Flag");
    assert_eq!(cfg.playlist_name(None, None), "Configured");

    cfg.override_count(None);
    assert_eq!(cfg.playlist.count, 10);
    cfg.override_count(Some(0));
    assert_eq!(cfg.playlist.count, 10);
    cfg.override_count(Some(25));
    assert_eq!(cfg.playlist.count, 25);
}
