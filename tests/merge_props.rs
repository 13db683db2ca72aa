// tests/merge_props.rs
use proptest::prelude::*;

use rschr_enrich::record::{Attribute, Field, Record, RecordPatch, Status};

fn field() -> impl Strategy<Value = Field> {
    prop::sample::select(Field::all().collect::<Vec<_>>())
}

fn status() -> impl Strategy<Value = Status> {
    prop::sample::select(Status::ALL.to_vec())
}

/// Values drawn from a small pool so records and patches overlap often.
fn value() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["1975", "남", "여", "교수", "한국대학교", "10032099", " ", ""])
        .prop_map(str::to_string)
}

fn patch() -> impl Strategy<Value = RecordPatch> {
    prop::collection::vec((field(), value()), 0..8).prop_map(|pairs| {
        let mut p = RecordPatch::new();
        for (f, v) in pairs {
            p.set(f, v);
        }
        p
    })
}

fn record() -> impl Strategy<Value = Record> {
    patch().prop_map(|p| {
        let mut r = Record::new("ART1");
        r.apply(&p).unwrap();
        r
    })
}

/// Forward-only order of the status graph.
fn rank(s: Status) -> u8 {
    match s {
        Status::Unresolved => 0,
        Status::IdentityResolved => 1,
        Status::Failed => 2,
        Status::NoIdentity | Status::AttributesResolved | Status::NoAttributes => 3,
    }
}

proptest! {
    #[test]
    fn merging_twice_changes_nothing_the_second_time(mut r in record(), mut p in patch()) {
        p.retain_missing(&r);
        r.apply(&p).unwrap();
        let after_first = r.clone();
        prop_assert_eq!(r.apply(&p), Ok(0));
        prop_assert_eq!(r, after_first);
    }

    #[test]
    fn filled_fields_are_never_overwritten(r in record(), p in patch()) {
        let mut merged = r.clone();
        match merged.apply(&p) {
            Ok(_) => {
                for f in Field::all() {
                    if let Some(v) = r.get(f) {
                        prop_assert_eq!(merged.get(f), Some(v));
                    }
                }
            }
            Err(c) => {
                prop_assert_eq!(&merged, &r);
                prop_assert_eq!(r.get(c.field), Some(c.existing.as_str()));
            }
        }
    }

    #[test]
    fn trimmed_patch_always_merges(r in record(), mut p in patch()) {
        let conflicts = p.retain_missing(&r);
        for c in &conflicts {
            prop_assert!(p.get(c.field).is_none());
        }
        let mut merged = r.clone();
        prop_assert!(merged.apply(&p).is_ok());
        prop_assert!(Attribute::ALL.iter().all(|a| r.attribute(*a).is_none() || merged.attribute(*a) == r.attribute(*a)));
    }

    #[test]
    fn status_never_moves_backwards(steps in prop::collection::vec(status(), 1..12)) {
        let mut r = Record::new("ART1");
        for next in steps {
            let before = r.status;
            match r.advance(next) {
                Ok(_) => {
                    prop_assert!(before.can_advance_to(next));
                    prop_assert_eq!(r.status, next);
                }
                Err(current) => {
                    prop_assert!(!before.can_advance_to(next));
                    prop_assert_eq!(current, before);
                    prop_assert_eq!(r.status, before);
                }
            }
            prop_assert!(rank(r.status) >= rank(before));
        }
    }
}
