//! Loading and saving settings documents on disk.

use prisma::prelude::*;
use std::fs;
use tempfile::tempdir;

const TOML_SETTINGS: &str = r#"
[blur]
filter = "gaussian_blur"
params = { sigma = 1.2, size = 5 }

[edges]
filter = "canny"
params = { low = 8.0, high = 30.0 }

[mirror]
filter = "reflect"
enabled = false
params = { mode = "right_to_left" }
"#;

#[test]
fn load_toml_builds_ordered_chain() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("look.toml");
    fs::write(&path, TOML_SETTINGS).unwrap();

    let settings = FilterSettings::load(&path).unwrap();
    assert_eq!(settings.len(), 3);

    let chain = settings.build_chain(&FilterRegistry::with_builtins()).unwrap();
    assert_eq!(chain.names(), vec!["blur", "edges"]);
}

#[test]
fn save_and_reload_json() {
    let registry = FilterRegistry::with_builtins();
    let chain = FilterChain::new()
        .with("warm", ColorTone::new(Tone::Warm, true))
        .with("swirl", Swirl::new([0.3, 0.6], 0.4, 1.5).unwrap())
        .with("sharpen", Sharpen::new(0.5).unwrap());

    let dir = tempdir().unwrap();
    let path = dir.path().join("chain.json");
    chain.to_settings().save(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"color_tone\""));

    let reloaded = FilterSettings::load(&path).unwrap().build_chain(&registry).unwrap();
    assert_eq!(reloaded, chain);
}

#[test]
fn save_and_reload_toml() {
    let registry = FilterRegistry::with_builtins();
    let chain = FilterSettings::from_toml_str(TOML_SETTINGS)
        .unwrap()
        .build_chain(&registry)
        .unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("roundtrip.toml");
    chain.to_settings().save(&path).unwrap();

    let reloaded = FilterSettings::load(&path).unwrap().build_chain(&registry).unwrap();
    assert_eq!(reloaded, chain);
}

#[test]
fn reapplying_settings_updates_in_place() {
    let registry = FilterRegistry::with_builtins();
    let mut chain = FilterSettings::from_toml_str(TOML_SETTINGS)
        .unwrap()
        .build_chain(&registry)
        .unwrap();

    let update = FilterSettings::from_json_str(
        r#"{
            "blur": { "filter": "gaussian_blur", "params": { "sigma": 3.0, "size": 9 } },
            "mirror": { "filter": "reflect", "params": { "mode": "right_to_left" } }
        }"#,
    )
    .unwrap();
    chain.apply_settings(&update, &registry).unwrap();

    assert_eq!(chain.names(), vec!["blur", "edges", "mirror"]);
    let blur = chain.get("blur").unwrap().parameters();
    assert_eq!(blur.float_or("sigma", 0.0).unwrap(), 3.0);

    // Applying the same document again changes nothing.
    let before = chain.clone();
    chain.apply_settings(&update, &registry).unwrap();
    assert_eq!(chain, before);
}

#[test]
fn missing_file_and_bad_documents() {
    let dir = tempdir().unwrap();

    assert!(matches!(
        FilterSettings::load(dir.path().join("absent.json")),
        Err(SettingsError::Io(_))
    ));

    let path = dir.path().join("broken.toml");
    fs::write(&path, "[blur\nfilter = ").unwrap();
    assert!(matches!(FilterSettings::load(&path), Err(SettingsError::Toml(_))));

    let path = dir.path().join("unknown.json");
    fs::write(&path, r#"{ "x": { "filter": "posterize" } }"#).unwrap();
    let settings = FilterSettings::load(&path).unwrap();
    match settings.build_chain(&FilterRegistry::with_builtins()) {
        Err(SettingsError::Entry { entry, error }) => {
            assert_eq!(entry, "x");
            assert_eq!(error, ParameterError::UnknownFilter("posterize".to_string()));
        }
        other => panic!("expected entry error, got {:?}", other),
    }
}
