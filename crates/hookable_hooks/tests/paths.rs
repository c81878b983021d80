//! Property tests for argument path parsing and resolution.

use hookable_hooks::path::Path;
use hookable_hooks::value::Object;
use hookable_hooks::{Args, Value};
use proptest::prelude::*;

fn arb_key() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,7}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Dotted and bracketed spellings of the same path parse to the same
    /// segments.
    #[test]
    fn prop_spellings_agree(index in 0usize..4, keys in prop::collection::vec(arb_key(), 0..4)) {
        let mut dotted = index.to_string();
        let mut bracketed = format!("[{index}]");
        for key in &keys {
            dotted.push('.');
            dotted.push_str(key);
            bracketed.push_str(&format!("[\"{key}\"]"));
        }

        let a = Path::parse(&dotted).expect("dotted path");
        let b = Path::parse(&bracketed).expect("bracketed path");
        prop_assert_eq!(a.segments(), b.segments());
        prop_assert_eq!(a.segments().len(), keys.len() + 1);
    }

    /// A path built from the nesting of an argument resolves to the leaf,
    /// preserving its identity.
    #[test]
    fn prop_nested_objects_resolve(keys in prop::collection::vec(arb_key(), 1..5)) {
        let leaf = Value::object();
        let mut node = leaf.clone();
        for key in keys.iter().rev() {
            let parent = Object::new();
            parent.insert(key.clone(), node);
            node = Value::from(parent);
        }
        let args: Args = vec![Value::Null, node];

        let path = Path::parse(&format!("1.{}", keys.join("."))).expect("valid path");
        let resolved = path.resolve(&args).expect("present");
        prop_assert!(resolved.same(&leaf));

        let missing = Path::parse(&format!("1.{}.absent", keys.join("."))).expect("valid path");
        prop_assert!(missing.resolve(&args).is_none());
    }

    /// Parsing never panics on arbitrary input.
    #[test]
    fn prop_parse_is_total(input in ".{0,24}") {
        let _ = Path::parse(&input);
    }
}
