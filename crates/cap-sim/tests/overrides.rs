use cap_config::{Configuration, ParamValue, Scope};
use cap_sim::{apply_overrides, parse_override};

#[test]
fn scoped_override_is_typed_like_yaml() {
    let parsed = parse_override("Run/Spectra:nBinsPt=30").unwrap();
    assert_eq!(parsed.scope.path(), "Run/Spectra");
    assert_eq!(parsed.name, "nBinsPt");
    assert_eq!(parsed.value, ParamValue::Int(30));

    assert_eq!(parse_override("ptMax=2.5").unwrap().value, ParamValue::Double(2.5));
    assert_eq!(parse_override("doPartialSave=true").unwrap().value, ParamValue::Bool(true));
    assert_eq!(
        parse_override("histoOutputPath=out/run1").unwrap().value,
        ParamValue::Str("out/run1".to_owned())
    );
}

#[test]
fn override_without_path_lands_at_root() {
    let parsed = parse_override("nIterationRequested=500").unwrap();
    assert!(parsed.scope.is_root());
}

#[test]
fn malformed_overrides_are_rejected() {
    for arg in ["nIterationRequested", "=3", "Run:=3"] {
        let err = parse_override(arg).unwrap_err();
        assert_eq!(err.info().code, "override-syntax", "{arg}");
    }
}

#[test]
fn applied_overrides_resolve_from_nested_scopes() {
    let mut config = Configuration::new();
    apply_overrides(
        &mut config,
        &["ptMax=3.0".to_owned(), "Run/Spectra:ptMax=4.0".to_owned()],
    )
    .unwrap();

    let spectra = Scope::from_path("Run/Spectra").unwrap();
    let generator = Scope::from_path("Run/Generator").unwrap();
    assert_eq!(config.get_double(&spectra, "ptMax"), 4.0);
    assert_eq!(config.get_double(&generator, "ptMax"), 3.0);
}
