use std::rc::Rc;

use proptest::prelude::*;
use skio_group::{Group, GroupError, Schema, SchemaBuilder, TypeSpec, Value};

const DECLARED: [&str; 3] = ["alpha", "beta", "gamma"];

fn schema() -> Rc<Schema> {
    SchemaBuilder::new("Sample")
        .default("alpha", 1)
        .default("beta", "b")
        .typed("gamma", TypeSpec::float())
        .child("nested", "nested group", || SchemaBuilder::new("Nested").build())
        .build()
}

fn any_key() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(DECLARED.to_vec()).prop_map(str::to_string),
        "[a-z]{1,6}_x",
    ]
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::from),
        (-1.0e9f64..1.0e9).prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn delete_restores_default(key in any_key(), value in scalar()) {
        let group = Group::new(schema());
        let before = group.get_raw(&key).ok();
        group.set(&key, value).unwrap();
        prop_assert!(group.contains(&key));
        group.delete(&key).unwrap();
        prop_assert_eq!(group.get_raw(&key).ok(), before);
        prop_assert!(!group.contains(&key));
    }

    #[test]
    fn no_new_key_rejects_only_unknown_keys(key in any_key(), value in scalar()) {
        let group = Group::new(schema());
        group.set_no_new_key(true);
        let result = group.set(&key, value);
        if DECLARED.contains(&key.as_str()) {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(matches!(result, Err(GroupError::PermissionDenied(_))));
            prop_assert!(!group.contains(&key));
        }
    }

    #[test]
    fn read_only_keeps_snapshot(
        initial in prop::collection::vec((any_key(), scalar()), 0..6),
        writes in prop::collection::vec((any_key(), scalar()), 1..6),
    ) {
        let group = Group::new(schema());
        group.update(initial, false).unwrap();
        let snapshot = group.items_raw(false);
        group.set_read_only(true);
        for (key, value) in writes {
            prop_assert!(group.set(&key, value).is_err());
            prop_assert!(group.delete(&key).is_err());
        }
        prop_assert!(group.clear().is_err());
        prop_assert_eq!(group.items_raw(false), snapshot);
    }

    #[test]
    fn nested_groups_survive_every_write(writes in prop::collection::vec(scalar(), 1..4)) {
        let group = Group::new(schema());
        let nested = group.child("nested").unwrap();
        for value in writes {
            prop_assert!(group.set("nested", value).is_err());
        }
        prop_assert!(group.delete("nested").is_err());
        prop_assert!(group.child("nested").unwrap().ptr_eq(&nested));
    }
}
