use proptest::prelude::*;

use symdist::rv::engine::Engine;
use symdist::rv::randomvariable::{
    Form,
    Nature,
    RandomVariable
};

fn continuous_components() -> [RandomVariable; 2] {
    [
        RandomVariable::from_strings(&["x", "2 - x"], &["0", "1", "2"], Nature::Continuous, Form::Pdf, "x").unwrap(),
        RandomVariable::from_strings(&["exp(-x)"], &["0", "inf"], Nature::Continuous, Form::Pdf, "x").unwrap(),
    ]
}

fn discrete_components() -> [RandomVariable; 2] {
    [
        RandomVariable::discrete_explicit_pdf(vec![0.2, 0.3, 0.5], vec![1.0, 2.0, 3.0]).unwrap(),
        RandomVariable::discrete_explicit_pdf(vec![0.5, 0.5], vec![2.0, 5.0]).unwrap(),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_continuous_mixture_is_normalized(p in 0.01f64..0.99) {
        let engine = Engine::default();
        let mixture = engine.mixture(&[p, 1.0 - p], &continuous_components()).unwrap();
        let check = engine.verify_pdf(&mixture).unwrap();
        prop_assert!((check.total_mass - 1.0).abs() < 1e-9);
        prop_assert!(check.negative_at.is_none());
    }

    #[test]
    fn test_discrete_mixture_is_normalized(p in 0.01f64..0.99) {
        let engine = Engine::default();
        let mixture = engine.mixture(&[p, 1.0 - p], &discrete_components()).unwrap();
        let check = engine.verify_pdf(&mixture).unwrap();
        prop_assert!((check.total_mass - 1.0).abs() < 1e-9);
        prop_assert_eq!(mixture.breakpoints().len(), 4);
    }

    #[test]
    fn test_weights_off_by_more_than_the_tolerance_are_rejected(p in 0.01f64..0.99, excess in 0.001f64..0.5) {
        let engine = Engine::default();
        let result = engine.mixture(&[p, 1.0 - p + excess], &continuous_components());
        prop_assert!(result.is_err());
    }
}
