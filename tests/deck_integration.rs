// tests/deck_integration.rs

use miso_enrich::{parse_input_deck, BindingConstraint, EnrichmentCalculator, StageNumber};

fn sample_deck_path() -> String {
    format!("{}/decks/natural_uranium.yaml", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn test_sample_deck_solves() {
    let deck = parse_input_deck(&sample_deck_path()).unwrap();
    let calc = EnrichmentCalculator::new(deck.cascade_parameters().unwrap()).unwrap();
    let output = calc.enrichment_output().unwrap();

    assert_eq!(output.n_enriching, StageNumber::Whole(56));
    assert_eq!(output.n_stripping, StageNumber::Whole(14));
    assert_eq!(calc.binding_constraint(), BindingConstraint::Feed);
    assert!((calc.product_assay() - 0.9).abs() < 5e-5);
    assert!((output.feed_used - 100.0).abs() < 1e-10);
    assert!((output.product_produced - 0.679611).abs() < 1e-6);
}

#[test]
fn test_sample_deck_later_timestep() {
    let mut deck = parse_input_deck(&sample_deck_path()).unwrap();
    deck.timestep = 24;
    let params = deck.cascade_parameters().unwrap();
    assert_eq!(params.max_swu, 800.0);
}

#[test]
fn test_output_serialises_to_yaml() {
    let deck = parse_input_deck(&sample_deck_path()).unwrap();
    let calc = EnrichmentCalculator::new(deck.cascade_parameters().unwrap()).unwrap();
    let yaml = serde_yaml::to_string(&calc.enrichment_output().unwrap()).unwrap();

    assert!(yaml.contains("product_composition:"));
    assert!(yaml.contains("922350000:"));
    assert!(yaml.contains("n_enriching: 56\n"));
    assert!(yaml.contains("n_stripping: 14\n"));
}
