use blendwise_core::domain::blend::RiskKind;
use blendwise_core::fixtures::{demo_inventory, demo_taken_at};
use blendwise_core::{
    Chemotype, EngineErrorCode, Intent, Inventory, PhaseKind, RecommendationEngine,
};

fn snapshot(chemotypes: Vec<Chemotype>) -> Inventory {
    Inventory::new(demo_taken_at(), chemotypes)
}

fn citrus_focus() -> Chemotype {
    Chemotype::new("citrus-focus", "Citrus Focus")
        .with_thc(8.0)
        .with_cbd(0.5)
        .with_terpene("limonene", 1.2)
        .with_terpene("pinene", 0.9)
        .with_terpene("caryophyllene", 0.3)
}

fn couch_lock() -> Chemotype {
    Chemotype::new("couch-lock", "Couch Lock")
        .with_thc(26.0)
        .with_cbd(0.1)
        .with_terpene("myrcene", 1.5)
        .with_terpene("caryophyllene", 0.4)
}

#[test]
fn focus_intent_favors_the_bright_low_thc_chemotype() {
    let engine = RecommendationEngine::default();
    let intent = Intent::new("focus work ignore distractions clear mind no anxiety");
    let output = engine.recommend(&intent, &snapshot(vec![couch_lock(), citrus_focus()])).unwrap();

    let blend = output.as_blend().expect("focus intent is a single blend");
    let limit = blend.profile().constraints.max_anxiety_risk;
    assert!(limit < 0.45, "anxiety constraint should tighten, got {limit}");

    let best = blend.best().expect("a feasible blend exists");
    let dominant = best.blend.dominant().expect("blends are never empty");
    assert_eq!(dominant.chemotype_id.as_str(), "citrus-focus");

    for recommendation in blend.recommendations() {
        let evaluation = &recommendation.evaluation;
        assert!(evaluation.risks_incurred.iter().all(|risk| risk.kind != RiskKind::Anxiety));
        if evaluation.aggregate.anxiety_risk > limit {
            assert!(evaluation.risks_managed.iter().any(|risk| risk.kind == RiskKind::Anxiety));
        }
    }
}

#[test]
fn sequencing_language_yields_two_ordered_phases() {
    let engine = RecommendationEngine::default();
    let output = engine
        .recommend(&Intent::new("energize me then help me wind down"), &demo_inventory())
        .unwrap();

    let stack = output.as_stack().expect("sequenced intent becomes a stack");
    assert_eq!(stack.phases().len(), 2);
    assert_eq!(stack.phases()[0].phase, PhaseKind::Onset);
    assert_eq!(stack.phases()[1].phase, PhaseKind::Sustain);
    assert_eq!(stack.phases()[1].intent_text, "help me wind down");

    let onset = stack.phases()[0].output.profile();
    let sustain = stack.phases()[1].output.profile();
    assert!(onset.targets.energy > sustain.targets.energy);
    assert!(sustain.targets.relaxation > onset.targets.relaxation);

    for phase in stack.phases() {
        let best = phase.output.best().expect("each phase is a valid blend");
        assert!((best.blend.ratio_sum() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn empty_inventory_is_distinguished_from_infeasible_constraints() {
    let engine = RecommendationEngine::default();

    let empty = engine.recommend(&Intent::new("relax"), &snapshot(Vec::new())).unwrap();
    assert_eq!(empty.error(), Some(EngineErrorCode::InsufficientInventory));
    assert!(empty.as_blend().unwrap().recommendations().is_empty());

    let sold_out = snapshot(vec![citrus_focus().unavailable()]);
    let sold_out = engine.recommend(&Intent::new("relax"), &sold_out).unwrap();
    assert_eq!(sold_out.error(), Some(EngineErrorCode::InsufficientInventory));

    let harsh = Chemotype::new("harsh", "Harsh").with_thc(30.0).with_terpene("terpinolene", 1.0);
    let infeasible = engine.recommend(&Intent::new("no anxiety"), &snapshot(vec![harsh])).unwrap();
    assert_eq!(infeasible.error(), Some(EngineErrorCode::NoFeasibleBlend));
    assert!(infeasible.as_blend().unwrap().recommendations().is_empty());
}

#[test]
fn mild_intent_rejects_an_inventory_that_is_all_over_the_thc_ceiling() {
    let engine = RecommendationEngine::default();
    let buffered = Chemotype::new("buffered", "Buffered")
        .with_thc(20.0)
        .with_cbd(10.0)
        .with_terpene("limonene", 0.5);
    let strong = Chemotype::new("strong", "Strong").with_thc(18.0).with_cbd(12.0);

    let output =
        engine.recommend(&Intent::new("something mild"), &snapshot(vec![buffered, strong])).unwrap();

    let blend = output.as_blend().expect("mild intent is a single blend");
    assert_eq!(blend.profile().constraints.max_thc_percent, Some(12.0));
    assert_eq!(blend.error(), Some(EngineErrorCode::NoFeasibleBlend));
    assert!(blend.audit().candidates_evaluated > 0);
    assert_eq!(blend.audit().candidates_feasible, 0);
}

#[test]
fn missing_terpene_panel_participates_with_lower_confidence() {
    let engine = RecommendationEngine::default();
    let complete = Chemotype::new("house", "House")
        .with_thc(14.0)
        .with_cbd(0.3)
        .with_terpene("limonene", 0.9)
        .with_terpene("pinene", 0.6);
    let sparse = Chemotype::new("house", "House").with_thc(14.0).with_cbd(0.3);

    let full = engine.recommend(&Intent::new(""), &snapshot(vec![complete])).unwrap();
    let partial = engine.recommend(&Intent::new(""), &snapshot(vec![sparse])).unwrap();

    let full_best = full.as_blend().and_then(|blend| blend.best()).expect("complete blend");
    let partial_best = partial.as_blend().and_then(|blend| blend.best()).expect("sparse blend");

    assert_eq!(partial_best.blend.signature(), "house");
    assert!(partial_best.evaluation.dominant_contributors.is_empty());
    assert!(partial_best.evaluation.confidence < full_best.evaluation.confidence);
    assert!(partial_best.evaluation.data_completeness < full_best.evaluation.data_completeness);
}
