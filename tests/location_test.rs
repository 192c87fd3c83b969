//! Tests for diff locations, slugs and cache keys.

use scaffdiff::{CacheKey, DiffLocation, Feature, FeatureSet, ScaffdiffError, Version};

#[test]
fn tailwind_location_keys_to_patch_file() {
    let features = FeatureSet::from_flags([("tailwind", true)]).unwrap();
    let location = DiffLocation::parse("7.0.0", "7.5.0", features).unwrap();
    assert_eq!(
        location.cache_key().file_name(),
        "diff-7.0.0-7.5.0-tailwind.patch"
    );
}

#[test]
fn disabled_features_do_not_change_the_key() {
    let a = FeatureSet::from_flags([("tailwind", true)]).unwrap();
    let b = FeatureSet::from_flags([("tailwind", true), ("prisma", false)]).unwrap();
    let a = DiffLocation::parse("7.0.0", "7.5.0", a).unwrap();
    let b = DiffLocation::parse("7.0.0", "7.5.0", b).unwrap();
    assert_eq!(a.cache_key(), b.cache_key());
}

#[test]
fn feature_order_is_canonical() {
    let features = FeatureSet::from_flags([
        ("trpc", true),
        ("nextAuth", true),
        ("tailwind", true),
        ("prisma", true),
    ])
    .unwrap();
    let location = DiffLocation::parse("7.0.0", "7.5.0", features).unwrap();
    assert_eq!(
        location.cache_key().as_str(),
        "7.0.0-7.5.0-nextAuth-prisma-tailwind-trpc"
    );
}

#[test]
fn slug_parses_versions_and_features() {
    let location = DiffLocation::from_slug("7.0.0..7.5.0-prisma-tailwind").unwrap();
    assert_eq!(location.current(), Version::new(7, 0, 0));
    assert_eq!(location.upgrade(), Version::new(7, 5, 0));
    assert!(location.features().contains(Feature::Prisma));
    assert!(location.features().contains(Feature::Tailwind));
    assert!(!location.features().contains(Feature::Trpc));
}

#[test]
fn malformed_slugs_are_rejected_whole() {
    for slug in [
        "",
        "7.0.0",
        "7.0.0..",
        "..7.5.0",
        "7.0..7.5.0",
        "7.0.0..7.5.0.1",
        "v7.0.0..7.5.0",
        "7.0.0..7.5.0-unknownFeature",
        "7.0.0-7.5.0",
    ] {
        let err = DiffLocation::from_slug(slug).unwrap_err();
        assert!(
            matches!(err, ScaffdiffError::InvalidLocation(_)),
            "slug {slug:?} should be rejected, got {err:?}"
        );
    }
}

#[test]
fn key_file_names_round_trip_to_locations() {
    let key = CacheKey::from_file_name("diff-7.0.0-7.5.0-tailwind.patch").unwrap();
    let location = key.to_location().unwrap();
    assert_eq!(location.to_slug(), "7.0.0..7.5.0-tailwind");
    assert_eq!(location.cache_key(), key);
}

#[test]
fn non_patch_files_are_not_keys() {
    for name in [
        "README.md",
        "diff-7.0.0-7.5.0.patch.tmp",
        ".diff-7.0.0-7.5.0.patch.1-0.tmp",
        "diff-7.0.0-7.5.0-tailwind-prisma.patch",
        "diff-latest.patch",
    ] {
        assert!(CacheKey::from_file_name(name).is_none(), "{name}");
    }
}

#[test]
fn generator_flags_follow_enabled_features() {
    let features = FeatureSet::empty()
        .with(Feature::Trpc, true)
        .with(Feature::NextAuth, true);
    let location = DiffLocation::parse("7.0.0", "7.5.0", features).unwrap();
    assert_eq!(
        location.generator_flags(),
        vec!["--nextAuth=true".to_string(), "--trpc=true".to_string()]
    );
}
