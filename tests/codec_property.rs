use proptest::prelude::*;

use wiregraph::builder::CallBuilder;
use wiregraph::codec;
use wiregraph::engine::Engine;
use wiregraph::registry::FunctionRegistry;

proptest! {
    #[test]
    fn integers_round_trip(v in any::<i64>()) {
        let bytes = codec::encode(&v).unwrap();
        prop_assert_eq!(codec::decode::<i64>(&bytes).unwrap(), v);
    }

    #[test]
    fn strings_round_trip(v in any::<String>()) {
        let bytes = codec::encode(&v).unwrap();
        prop_assert_eq!(codec::decode::<String>(&bytes).unwrap(), v);
    }

    #[test]
    fn string_sequences_round_trip(v in proptest::collection::vec(any::<String>(), 0..8)) {
        let bytes = codec::encode(&v).unwrap();
        prop_assert_eq!(codec::decode::<Vec<String>>(&bytes).unwrap(), v);
    }

    /// A program of one literal and no instructions returns the literal
    /// unchanged through the whole store/program/engine path.
    #[test]
    fn lone_literal_survives_an_engine_run(v in any::<i64>()) {
        let registry = FunctionRegistry::new();
        let mut b = CallBuilder::new();
        let value = b.literal(v).unwrap();
        b.mark_outputs(&[&value]);

        let (mut store, program) = b.build();
        let outputs = Engine::new().run(&program, &mut store, &registry).unwrap();
        let back: i64 = codec::decode(outputs.get(value.slot()).unwrap()).unwrap();
        prop_assert_eq!(back, v);
    }
}
