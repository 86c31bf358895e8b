//! Profile persistence and profile-driven binding
//!
//! Round-trips profile files through real directories and checks that a
//! persisted choice reaches the dispatch binding.

use std::fs;
use tempfile::tempdir;
use vkern::kernels::{deinterleave_real_16i, dot_prod_32fc};
use vkern::{
    capabilities, host_identity, DispatchConfig, DispatchContext, Profile, ProfileEntry,
    Profiler, ProfilerConfig,
};

fn quick_profiler() -> Profiler {
    let config = ProfilerConfig {
        warmup_iterations: 1,
        measurement_iterations: 3,
        num_points: 1027,
        ..ProfilerConfig::default()
    };
    Profiler::new(config).unwrap()
}

/// Runnable implementation that static priority would not pick first
fn runnable_non_default() -> Option<(&'static str, &'static str)> {
    let context = DispatchContext::default();
    let binding = context.bind(&dot_prod_32fc::KERNEL);
    dot_prod_32fc::KERNEL
        .implementations()
        .iter()
        .filter(|imp| capabilities().satisfies(imp.info.requires))
        .map(|imp| imp.name())
        .find(|name| *name != binding.aligned().name())
        .map(|name| (name, binding.aligned().name()))
}

// =============================================================================
// FILE STORAGE
// =============================================================================

#[test]
fn test_save_and_load_in_nested_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a").join("b").join("profile.json");

    let mut profile = Profile::new();
    profile.insert(ProfileEntry::new("dot_prod_32fc", "host-a", "a_avx", "u_avx"));
    profile.insert(ProfileEntry::new("deinterleave_real_16i", "host-a", "generic", "generic"));
    profile.save(&path).unwrap();

    let loaded = Profile::load(&path).unwrap();
    assert_eq!(loaded, profile);
    assert!(!dir.path().join("a").join("b").join("profile.json.tmp").exists());
}

#[test]
fn test_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let loaded = Profile::load(dir.path().join("absent.json")).unwrap();
    assert!(loaded.is_empty());
}

#[test]
fn test_malformed_file_is_ignored() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profile.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(Profile::load(&path).is_err());
    assert!(Profile::load_or_default(&path).is_empty());
}

#[test]
fn test_bad_entries_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profile.json");
    fs::write(
        &path,
        r#"{
            "version": 1,
            "entries": [
                { "kernel": "dot_prod_32fc", "host": "h", "aligned": "generic", "unaligned": "generic" },
                { "kernel": "dot_prod_32fc", "host": "h2" },
                { "kernel": "", "host": "h3", "aligned": "generic", "unaligned": "generic" },
                42
            ]
        }"#,
    )
    .unwrap();

    let loaded = Profile::load(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(loaded.lookup("dot_prod_32fc", "h").is_some());
}

#[test]
fn test_future_version_is_ignored() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profile.json");
    fs::write(&path, r#"{ "version": 99, "entries": [] }"#).unwrap();
    assert!(Profile::load(&path).unwrap().is_empty());
}

// =============================================================================
// PROFILE-DRIVEN BINDING
// =============================================================================

#[test]
fn test_profile_entry_overrides_static_priority() {
    let Some((preferred, default)) = runnable_non_default() else {
        return;
    };
    let mut profile = Profile::new();
    profile.insert(ProfileEntry::new(
        dot_prod_32fc::NAME,
        host_identity(),
        preferred,
        "generic",
    ));

    let binding = DispatchContext::default()
        .with_profile(Some(profile))
        .bind(&dot_prod_32fc::KERNEL);
    assert_eq!(binding.aligned().name(), preferred);
    assert_ne!(binding.aligned().name(), default);
    assert_eq!(binding.unaligned().name(), "generic");
}

#[test]
fn test_entry_for_other_host_is_ignored() {
    let mut profile = Profile::new();
    profile.insert(ProfileEntry::new(
        dot_prod_32fc::NAME,
        "some-other-machine",
        "generic",
        "generic",
    ));
    let with_profile = DispatchContext::default()
        .with_profile(Some(profile))
        .bind(&dot_prod_32fc::KERNEL);
    let without = DispatchContext::default().bind(&dot_prod_32fc::KERNEL);
    assert_eq!(with_profile.aligned().name(), without.aligned().name());
    assert_eq!(with_profile.unaligned().name(), without.unaligned().name());
}

#[test]
fn test_unknown_implementation_in_profile_falls_back() {
    let mut profile = Profile::new();
    profile.insert(ProfileEntry::new(
        deinterleave_real_16i::NAME,
        host_identity(),
        "a_quantum",
        "u_quantum",
    ));
    let binding = DispatchContext::default()
        .with_profile(Some(profile))
        .bind(&deinterleave_real_16i::KERNEL);
    let fallback = DispatchContext::default().bind(&deinterleave_real_16i::KERNEL);
    assert_eq!(binding.aligned().name(), fallback.aligned().name());
}

#[test]
fn test_config_reads_profile_from_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profile.json");
    let mut profile = Profile::new();
    profile.insert(ProfileEntry::new(
        dot_prod_32fc::NAME,
        host_identity(),
        "generic",
        "generic",
    ));
    profile.save(&path).unwrap();

    let config = DispatchConfig {
        profile_path: Some(path.clone()),
        ..DispatchConfig::default()
    };
    let binding = DispatchContext::from_config(&config).bind(&dot_prod_32fc::KERNEL);
    assert_eq!(binding.aligned().name(), "generic");

    let disabled = DispatchConfig {
        use_profile: false,
        ..config
    };
    assert!(DispatchContext::from_config(&disabled).profile().is_none());
}

// =============================================================================
// PROFILER
// =============================================================================

#[test]
fn test_update_file_merges_with_existing_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profile.json");

    let mut existing = Profile::new();
    existing.insert(ProfileEntry::new(dot_prod_32fc::NAME, "other-host", "generic", "generic"));
    existing.save(&path).unwrap();

    let profiler = quick_profiler();
    let updated = profiler.update_file(&path).unwrap();

    let reloaded = Profile::load(&path).unwrap();
    assert_eq!(reloaded, updated);
    assert!(reloaded.lookup(dot_prod_32fc::NAME, "other-host").is_some());
    for kernel in vkern::registered() {
        let entry = reloaded.lookup(kernel.name(), profiler.host()).unwrap();
        assert!(kernel.implementations().iter().any(|info| info.name == entry.aligned));
    }
}

#[test]
fn test_profiled_winners_are_bindable() {
    let profile = quick_profiler().profile_registered().unwrap();
    let context = DispatchContext::default().with_profile(Some(profile.clone()));

    let binding = context.bind(&dot_prod_32fc::KERNEL);
    let entry = profile.lookup(dot_prod_32fc::NAME, host_identity()).unwrap();
    assert_eq!(binding.aligned().name(), entry.aligned);
    assert_eq!(binding.unaligned().name(), entry.unaligned);
}
