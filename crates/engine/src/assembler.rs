//! Draft validation and manifest assembly.
//!
//! [`assemble`] runs every structural validator over a planner draft:
//! the scene timeline, cross-entity references, and the job dependency
//! graph. All three run unconditionally so one failed draft reports its
//! complete defect list at once. Only a structurally sound draft becomes
//! a [`Manifest`]; the quality gate is evaluated and recorded on it but
//! does not reject the plan.

use serde::Serialize;
use serde_json::json;

use showrun_core::graph::{JobGraph, JobGraphError};
use showrun_core::manifest::{Manifest, ManifestDraft};
use showrun_core::quality_gate::{evaluate_quality_gate, gate_warnings};
use showrun_core::query::AssetState;
use showrun_core::references::{resolve_references, DanglingReference};
use showrun_core::timeline::{validate_timeline, TimelineViolation};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A validated manifest plus its executable dependency graph.
#[derive(Debug)]
pub struct AssembledPlan {
    pub manifest: Manifest,
    pub graph: JobGraph,
}

/// Everything wrong with a rejected draft, grouped by validator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssemblyFailure {
    pub timeline: Vec<TimelineViolation>,
    pub references: Vec<DanglingReference>,
    pub graph: Vec<JobGraphError>,
}

impl AssemblyFailure {
    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty() && self.references.is_empty() && self.graph.is_empty()
    }

    /// One-line count summary for failure messages.
    pub fn summary(&self) -> String {
        format!(
            "{} timeline violation(s), {} dangling reference(s), {} job graph error(s)",
            self.timeline.len(),
            self.references.len(),
            self.graph.len()
        )
    }

    /// Full violation lists as structured failure details.
    pub fn to_details(&self) -> serde_json::Value {
        json!({
            "timeline": self.timeline,
            "references": self.references,
            "graph": self.graph,
        })
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Validate a draft and, if sound, seal it into a manifest.
///
/// `asset_states` are the final analysis states, used for the recorded
/// quality gate and its warnings.
pub fn assemble(
    draft: ManifestDraft,
    asset_states: &[AssetState],
) -> Result<AssembledPlan, AssemblyFailure> {
    let timeline = validate_timeline(&draft.scenes, draft.metadata.duration_seconds);
    let references = resolve_references(&draft);

    let graph = match JobGraph::build(&draft.jobs) {
        Ok(graph) if timeline.valid && references.is_empty() => graph,
        Ok(_) => {
            return Err(AssemblyFailure {
                timeline: timeline.violations,
                references,
                graph: Vec::new(),
            });
        }
        Err(errors) => {
            return Err(AssemblyFailure {
                timeline: timeline.violations,
                references,
                graph: errors,
            });
        }
    };

    let quality_gate = evaluate_quality_gate(&draft, asset_states);
    let warnings = gate_warnings(&draft, asset_states);
    Ok(AssembledPlan {
        manifest: Manifest::from_draft(draft, quality_gate, warnings),
        graph,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use showrun_core::manifest::{
        AssetSource, AudioPlan, Job, ManifestAsset, ManifestMetadata, MediaType, Scene,
    };
    use showrun_core::status::AssetStatus;
    use showrun_core::types::QueryId;

    fn scene(id: &str, start: i64, duration: i64) -> Scene {
        Scene {
            id: id.to_string(),
            start_at_sec: start,
            duration_seconds: duration,
            purpose: "body".to_string(),
            narration: None,
            visuals: vec!["a1".to_string()],
            music_cue: None,
        }
    }

    fn draft() -> ManifestDraft {
        let mut assets = BTreeMap::new();
        assets.insert(
            "a1".to_string(),
            ManifestAsset {
                media_type: MediaType::Image,
                source: AssetSource::User,
                uri: Some("file:///a1.png".to_string()),
                label: None,
                required: true,
                quality_score: Some(0.8),
            },
        );
        ManifestDraft {
            query_id: QueryId::new_v4(),
            user_id: "user-1".to_string(),
            source_refs: vec![],
            metadata: ManifestMetadata {
                duration_seconds: 60,
                aspect_ratio: "16:9".to_string(),
                platform: "youtube".to_string(),
                language: "en".to_string(),
            },
            scenes: vec![scene("s1", 0, 30), scene("s2", 30, 30)],
            assets,
            audio: AudioPlan::default(),
            jobs: vec![Job {
                id: "render-final".to_string(),
                job_type: "render".to_string(),
                payload: serde_json::json!({}),
                depends_on: vec![],
                result_asset_id: None,
            }],
        }
    }

    fn completed_state(id: &str) -> AssetState {
        AssetState {
            id: id.to_string(),
            status: AssetStatus::Completed,
            progress: 100,
            quality_score: Some(0.8),
            error: None,
        }
    }

    // -- Success --------------------------------------------------------------

    #[test]
    fn sound_draft_assembles_with_passing_gate() {
        let plan = assemble(draft(), &[completed_state("a1")]).unwrap();
        assert_eq!(plan.manifest.scenes.len(), 2);
        assert!(plan.manifest.quality_gate.duration_compliance);
        assert!(plan.manifest.quality_gate.required_assets_ready);
        assert!(plan.manifest.warnings.is_empty());
        assert_eq!(plan.graph.len(), 1);
    }

    #[test]
    fn failed_gate_is_recorded_not_rejected() {
        // Required asset did not complete analysis: the gate fails but the
        // structurally sound draft still assembles.
        let failed = AssetState {
            status: AssetStatus::Failed,
            ..completed_state("a1")
        };
        let plan = assemble(draft(), &[failed]).unwrap();
        assert!(!plan.manifest.quality_gate.required_assets_ready);
        assert!(!plan.manifest.quality_gate.passed());
    }

    #[test]
    fn optional_asset_failure_becomes_warning() {
        let mut d = draft();
        d.assets.get_mut("a1").unwrap().required = false;
        let failed = AssetState {
            status: AssetStatus::Failed,
            ..completed_state("a1")
        };
        let plan = assemble(d, &[failed]).unwrap();
        assert!(plan.manifest.quality_gate.required_assets_ready);
        assert_eq!(plan.manifest.warnings.len(), 1);
        assert!(plan.manifest.warnings[0].contains("a1"));
    }

    // -- Rejection ------------------------------------------------------------

    #[test]
    fn overlapping_scenes_reject_the_draft() {
        let mut d = draft();
        d.scenes[1].start_at_sec = 20;
        let failure = assemble(d, &[completed_state("a1")]).unwrap_err();
        assert!(!failure.timeline.is_empty());
        assert!(failure.references.is_empty());
        assert!(failure.graph.is_empty());
    }

    #[test]
    fn all_validator_classes_report_together() {
        let mut d = draft();
        // Timeline: scenes no longer cover the declared total.
        d.scenes[1].duration_seconds = 10;
        // References: a visual pointing at nothing.
        d.scenes[0].visuals.push("phantom-asset".to_string());
        // Graph: a self-cycle.
        d.jobs[0].depends_on = vec!["render-final".to_string()];

        let failure = assemble(d, &[completed_state("a1")]).unwrap_err();
        assert!(!failure.timeline.is_empty());
        assert!(!failure.references.is_empty());
        assert!(!failure.graph.is_empty());

        let details = failure.to_details();
        assert!(details["timeline"].is_array());
        assert!(details["references"][0]["asset_id"] == "phantom-asset");
        assert!(details["graph"][0]["type"] == "cycle");

        let summary = failure.summary();
        assert!(summary.contains("1 timeline violation(s)"));
        assert!(summary.contains("1 dangling reference(s)"));
        assert!(summary.contains("1 job graph error(s)"));
    }

    #[test]
    fn graph_errors_surface_without_other_violations() {
        let mut d = draft();
        d.jobs.push(Job {
            id: "tts-1".to_string(),
            job_type: "speech-synthesis".to_string(),
            payload: serde_json::json!({}),
            depends_on: vec!["missing-job".to_string()],
            result_asset_id: None,
        });
        let failure = assemble(d, &[completed_state("a1")]).unwrap_err();
        assert!(failure.timeline.is_empty());
        assert!(failure.references.is_empty());
        assert_eq!(failure.graph.len(), 1);
    }
}
