//! The recommendation pipeline: interpret, score, compose, evaluate, rank.
//!
//! Every call takes its own inventory snapshot. The engine holds only
//! immutable settings and tables plus the optional memo cache.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{CacheKey, RecommendationCache};
use crate::composer::{BlendComposer, ComposerSettings, ScoredChemotype};
use crate::config::EngineSettings;
use crate::domain::chemotype::{Chemotype, Inventory};
use crate::domain::output::{
    Audit, BlendOutput, EngineErrorCode, EngineOutput, PhaseKind, StackOutput, StackPhase,
};
use crate::domain::profile::TargetProfile;
use crate::errors::{ApplicationError, DomainError};
use crate::evaluator::{rank, BlendEvaluator, EvaluatorSettings};
use crate::intent::{Intent, IntentInterpreter};
use crate::mode::{GateDecision, ModeGate};
use crate::scoring::{ChemotypeScore, ChemotypeScorer};
use crate::tables::EngineTables;

#[derive(Debug)]
pub struct RecommendationEngine {
    settings: EngineSettings,
    tables: EngineTables,
    interpreter: IntentInterpreter,
    gate: ModeGate,
    cache: Option<RecommendationCache>,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::assemble(EngineSettings::default(), EngineTables::default())
    }
}

impl RecommendationEngine {
    /// Validates both settings and tables before accepting them.
    pub fn new(settings: EngineSettings, tables: EngineTables) -> Result<Self, ApplicationError> {
        settings.validate()?;
        tables.validate()?;
        Ok(Self::assemble(settings, tables))
    }

    /// Loads the calibration tables the settings point at.
    pub fn from_settings(settings: EngineSettings) -> Result<Self, ApplicationError> {
        let tables = settings.load_tables()?;
        Self::new(settings, tables)
    }

    fn assemble(settings: EngineSettings, tables: EngineTables) -> Self {
        let cache = settings
            .cache
            .enabled
            .then(|| RecommendationCache::new(settings.cache.capacity));
        Self {
            settings,
            tables,
            interpreter: IntentInterpreter::new(),
            gate: ModeGate::new(),
            cache,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn tables(&self) -> &EngineTables {
        &self.tables
    }

    pub fn cache(&self) -> Option<&RecommendationCache> {
        self.cache.as_ref()
    }

    pub fn interpret(&self, intent: &Intent) -> TargetProfile {
        self.interpreter.interpret(intent)
    }

    /// Full invocation. Sequencing language with both halves present and a
    /// non-empty inventory yields a two-phase stack; everything else a blend.
    pub fn recommend(
        &self,
        intent: &Intent,
        inventory: &Inventory,
    ) -> Result<EngineOutput, DomainError> {
        info!(
            event_name = "engine.recommend.start",
            chemotypes = inventory.chemotypes.len(),
            available = inventory.available_count(),
            "recommendation requested"
        );

        let decision = self.gate.decide(&intent.text);
        match decision {
            GateDecision::Stack { onset, sustain } if inventory.available_count() > 0 => {
                info!(event_name = "engine.mode.stack", "sequencing language found, building stack");
                let whole = self.interpreter.interpret(intent);
                let carried = intent.overrides.constraints_and_context();
                let mut phases = Vec::with_capacity(2);
                for (phase, text) in [(PhaseKind::Onset, onset), (PhaseKind::Sustain, sustain)] {
                    let phase_intent = Intent { text: text.clone(), overrides: carried.clone() };
                    let profile = self.interpreter.interpret_phase(&phase_intent, &whole);
                    let output = self.recommend_profile(&profile, inventory)?;
                    if let Some(code) = output.error() {
                        warn!(
                            event_name = "engine.mode.stack_failed",
                            phase = phase.as_str(),
                            error_code = code.as_str(),
                            "stack phase came back empty, returning a flat failed result"
                        );
                        return Ok(EngineOutput::Blend(BlendOutput::empty(
                            whole,
                            code,
                            output.audit().clone(),
                        )));
                    }
                    phases.push(StackPhase { phase, intent_text: text, output });
                }
                Ok(EngineOutput::Stack(StackOutput::new(phases)?))
            }
            _ => {
                let profile = self.interpreter.interpret(intent);
                Ok(EngineOutput::Blend(self.recommend_profile(&profile, inventory)?))
            }
        }
    }

    /// Ranked blends for an already interpreted profile.
    pub fn recommend_profile(
        &self,
        profile: &TargetProfile,
        inventory: &Inventory,
    ) -> Result<BlendOutput, DomainError> {
        let fingerprint = inventory.fingerprint();
        let key = CacheKey::from_fingerprint(fingerprint.clone(), profile);
        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            debug!(
                event_name = "engine.cache.hit",
                inventory_fingerprint = %fingerprint,
                "served from memo cache"
            );
            return Ok(hit.as_ref().clone());
        }

        let output = self.run_pipeline(profile, inventory, fingerprint)?;
        if let Some(cache) = &self.cache {
            cache.insert(key, Arc::new(output.clone()));
        }
        Ok(output)
    }

    fn run_pipeline(
        &self,
        profile: &TargetProfile,
        inventory: &Inventory,
        fingerprint: String,
    ) -> Result<BlendOutput, DomainError> {
        let available: Vec<&Chemotype> = inventory.available().collect();
        let mut audit = Audit {
            chemotypes_available: available.len(),
            inventory_fingerprint: fingerprint,
            ..Audit::default()
        };

        if available.is_empty() {
            warn!(
                event_name = "engine.recommend.empty",
                error_code = EngineErrorCode::InsufficientInventory.as_str(),
                "no available chemotypes"
            );
            return Ok(BlendOutput::empty(
                profile.clone(),
                EngineErrorCode::InsufficientInventory,
                audit,
            ));
        }

        let scorer = ChemotypeScorer::new(&self.tables, self.settings.scoring.violation_score_cap);
        let scores: Vec<ChemotypeScore> =
            available.iter().map(|chemotype| scorer.score(chemotype, profile)).collect();
        let scored: Vec<ScoredChemotype<'_>> = available
            .iter()
            .zip(&scores)
            .map(|(chemotype, score)| ScoredChemotype { chemotype: *chemotype, score })
            .collect();

        let composer = BlendComposer::new(&self.tables, self.composer_settings());
        let composition = composer.compose(&scored, profile)?;
        audit.candidates_evaluated = composition.combinations_evaluated;
        audit.candidates_feasible = composition.candidates.len();
        audit.chemotypes_considered = composition.chemotypes_considered;
        info!(
            event_name = "engine.compose.completed",
            combinations = composition.combinations_evaluated,
            feasible = composition.candidates.len(),
            considered = composition.chemotypes_considered,
            "blend composition completed"
        );

        if composition.candidates.is_empty() {
            warn!(
                event_name = "engine.recommend.empty",
                error_code = EngineErrorCode::NoFeasibleBlend.as_str(),
                max_anxiety_risk = profile.constraints.max_anxiety_risk,
                "every combination violated a hard constraint"
            );
            return Ok(BlendOutput::empty(profile.clone(), EngineErrorCode::NoFeasibleBlend, audit));
        }

        let evaluator = BlendEvaluator::new(&self.tables, self.evaluator_settings());
        let mut evaluations: Vec<_> = composition
            .candidates
            .iter()
            .map(|candidate| evaluator.evaluate(candidate, profile))
            .collect();
        evaluator.apply_margins(&mut evaluations);

        let evaluated = composition
            .candidates
            .into_iter()
            .map(|candidate| candidate.blend)
            .zip(evaluations)
            .collect();
        let recommendations = rank(evaluated, self.settings.engine.max_recommendations);

        if let Some(best) = recommendations.first() {
            info!(
                event_name = "engine.recommend.completed",
                best_signature = %best.blend.signature(),
                best_score = best.evaluation.blend_score,
                best_confidence = best.evaluation.confidence,
                returned = recommendations.len(),
                "recommendation ranked"
            );
        }

        BlendOutput::ranked(profile.clone(), recommendations, audit)
    }

    fn composer_settings(&self) -> ComposerSettings {
        ComposerSettings {
            max_blend_size: self.settings.engine.max_blend_size,
            prefilter_top_m: self.settings.engine.prefilter_top_m,
            ratio_steps: self.settings.engine.ratio_steps,
            mitigation_margin: self.settings.scoring.mitigation_margin,
        }
    }

    fn evaluator_settings(&self) -> EvaluatorSettings {
        let scoring = &self.settings.scoring;
        EvaluatorSettings {
            max_blend_size: self.settings.engine.max_blend_size,
            simplicity_bonus: scoring.simplicity_bonus,
            unmitigated_risk_penalty: scoring.unmitigated_risk_penalty,
            confidence_floor: scoring.confidence_floor,
            confidence_margin_points: scoring.confidence_margin_points,
            dominant_contributors: self.settings.engine.dominant_contributors,
        }
    }
}
