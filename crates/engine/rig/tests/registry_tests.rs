mod common;

use common::{origin, Fixture};
use marionette_rig::{RigError, RigOptions};
use std::collections::HashSet;
use std::time::Duration;

#[test]
fn test_create_and_lookup() {
    let fx = Fixture::new();
    let rig = fx.registry.create_rig("crane", origin(), 32.0, false).unwrap();

    assert_eq!(rig.name(), "crane");
    assert!(!rig.uses_native_mode());
    assert_eq!(rig.view_distance(), 32.0);
    assert_eq!(rig.segment_count(), 0);
    assert!(!rig.is_visibility_task_running());

    let found = fx.registry.lookup("crane").unwrap();
    assert!(std::sync::Arc::ptr_eq(&rig, &found));
    assert!(fx.registry.lookup("missing").is_none());
}

#[test]
fn test_duplicate_name_rejected() {
    let fx = Fixture::new();
    fx.registry.create_rig("twin", origin(), 10.0, false).unwrap();
    assert!(matches!(
        fx.registry.create_rig("twin", origin(), 10.0, false),
        Err(RigError::DuplicateRig(name)) if name == "twin"
    ));
    assert_eq!(fx.registry.len(), 1);
}

#[test]
fn test_invalid_view_distance_rejected() {
    let fx = Fixture::new();
    for distance in [0.0, -4.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            fx.registry.create_rig("bad", origin(), distance, false),
            Err(RigError::InvalidViewDistance(_))
        ));
    }
    assert!(fx.registry.is_empty());
}

#[test]
fn test_native_mode_requires_host() {
    let fx = Fixture::new();
    assert!(!fx.registry.has_native_host());
    assert!(matches!(
        fx.registry.create_rig("native", origin(), 10.0, true),
        Err(RigError::NativeHostUnavailable)
    ));
    assert!(fx.registry.lookup("native").is_none());
}

#[test]
fn test_remove_by_name() {
    let fx = Fixture::new();
    let a = fx.join("A", 1.0);
    let rig = fx.rig("temp", 10.0, 2);
    rig.run_visibility_pass();

    let report = fx.registry.remove("temp").unwrap();
    assert_eq!(report.delivered, 2);
    assert!(rig.is_removed());
    assert_eq!(fx.count(&a, "destroy"), 2);
    assert!(fx.registry.remove("temp").is_none());

    // The name is free again.
    fx.registry.create_rig("temp", origin(), 10.0, false).unwrap();
}

#[test]
fn test_stale_rig_does_not_deregister_successor() {
    let fx = Fixture::new();
    let old = fx.registry.create_rig("slot", origin(), 10.0, false).unwrap();
    fx.registry.remove("slot");
    let new = fx.registry.create_rig("slot", origin(), 10.0, false).unwrap();

    old.remove(true);
    let found = fx.registry.lookup("slot").unwrap();
    assert!(std::sync::Arc::ptr_eq(&new, &found));
}

#[test]
fn test_names_sorted_and_remove_all() {
    let fx = Fixture::new();
    let a = fx.join("A", 1.0);
    for name in ["zeta", "alpha", "mid"] {
        fx.rig(name, 10.0, 1).run_visibility_pass();
    }
    assert_eq!(fx.registry.names(), vec!["alpha", "mid", "zeta"]);
    assert_eq!(fx.registry.rigs().len(), 3);

    let report = fx.registry.remove_all();
    assert_eq!(report.delivered, 3);
    assert_eq!(fx.count(&a, "destroy"), 3);
    assert!(fx.registry.is_empty());
}

#[test]
fn test_entity_ids_unique_across_rigs() {
    let fx = Fixture::new();
    let first = fx.rig("one", 10.0, 3);
    let second = fx.rig("two", 10.0, 3);

    let ids: HashSet<_> = first
        .segments()
        .iter()
        .chain(second.segments().iter())
        .map(|segment| segment.proxy().entity_id().unwrap())
        .collect();
    assert_eq!(ids.len(), 6);
}

#[test]
fn test_options_validated() {
    let fx = Fixture::new();
    let options = RigOptions {
        visibility_period: Duration::ZERO,
        ..Default::default()
    };
    assert!(matches!(
        fx.registry.with_options(options),
        Err(RigError::InvalidPeriod)
    ));
}
