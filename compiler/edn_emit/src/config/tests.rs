use pretty_assertions::assert_eq;

use super::*;

fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
    move |key| {
        vars.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_owned())
    }
}

// === Environment ===

#[test]
fn empty_environment_is_default() {
    assert_eq!(EmitConfig::from_lookup(lookup(&[])), EmitConfig::default());
}

#[test]
fn model_and_enable_flag_are_independent() {
    let cfg = EmitConfig::from_lookup(lookup(&[("EDN_EH_MODEL", "ITANIUM")]));
    assert!(cfg.eh_itanium);
    assert!(!cfg.eh_enabled);
    assert_eq!(cfg.personality(), Some(Personality::Itanium));
    assert_eq!(cfg.lowering_personality(), None);

    let cfg = EmitConfig::from_lookup(lookup(&[
        ("EDN_EH_MODEL", "seh"),
        ("EDN_ENABLE_EH", "1"),
    ]));
    assert_eq!(cfg.personality(), Some(Personality::Seh));
    assert_eq!(cfg.lowering_personality(), Some(Personality::Seh));
}

#[test]
fn panic_coro_and_triple() {
    let cfg = EmitConfig::from_lookup(lookup(&[
        ("EDN_PANIC", "unwind"),
        ("EDN_ENABLE_CORO", "1"),
        ("EDN_TARGET_TRIPLE", "x86_64-unknown-linux-gnu"),
    ]));
    assert!(cfg.panic_unwind);
    assert!(cfg.coroutines);
    assert_eq!(cfg.target_triple.as_deref(), Some("x86_64-unknown-linux-gnu"));
}

#[test]
fn empty_values_are_unset() {
    let cfg = EmitConfig::from_lookup(lookup(&[("EDN_TARGET_TRIPLE", "")]));
    assert_eq!(cfg.target_triple, None);
}

// === Personality selection ===

#[test]
fn both_models_prefer_seh_on_windows() {
    let cfg = EmitConfig::default()
        .with_eh_models(true, true)
        .with_target_triple("x86_64-pc-windows-msvc");
    assert_eq!(cfg.personality(), Some(Personality::Seh));
}

#[test]
fn both_models_prefer_itanium_elsewhere() {
    let cfg = EmitConfig::default()
        .with_eh_models(true, true)
        .with_target_triple("aarch64-apple-darwin");
    assert_eq!(cfg.personality(), Some(Personality::Itanium));
}

#[test]
fn single_model_is_used_as_is() {
    let cfg = EmitConfig::default()
        .with_eh_models(false, true)
        .with_target_triple("x86_64-unknown-linux-gnu");
    assert_eq!(cfg.personality(), Some(Personality::Seh));
    assert_eq!(Personality::Seh.symbol(), "__C_specific_handler");
    assert_eq!(Personality::Itanium.symbol(), "__gxx_personality_v0");
}

#[test]
fn no_model_no_personality() {
    assert_eq!(EmitConfig::default().with_eh_models(false, false).personality(), None);
}

#[test]
fn disabling_lowering_keeps_the_requested_model() {
    let mut cfg = EmitConfig::default()
        .with_eh_models(false, true)
        .with_target_triple("x86_64-pc-windows-msvc");
    cfg.eh_enabled = false;
    assert_eq!(cfg.personality(), Some(Personality::Seh));
    assert_eq!(cfg.lowering_personality(), None);
}
