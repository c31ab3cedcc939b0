//! Quality gate evaluation for assembled manifests.
//!
//! The gate is a pair of booleans recorded on every manifest:
//! `durationCompliance` (scene durations sum exactly to the declared
//! total) and `requiredAssetsReady` (every required asset is either a
//! fully analyzed input or has a job producing it). Optional assets that
//! failed analysis downgrade to warnings instead of failing the gate.

use crate::manifest::{AssetSource, ManifestDraft, QualityGate, Scene};
use crate::query::AssetState;
use crate::status::AssetStatus;

// ---------------------------------------------------------------------------
// Gate checks
// ---------------------------------------------------------------------------

/// Exact integer comparison of the scene duration sum against the declared
/// total. Mirrors the timeline validator's final check.
pub fn evaluate_duration_compliance(scenes: &[Scene], declared_total_seconds: i64) -> bool {
    let actual: i64 = scenes.iter().map(|s| s.duration_seconds).sum();
    actual == declared_total_seconds
}

/// Whether every required asset in the draft is accounted for.
///
/// User-sourced required assets must have a completed analysis state.
/// Generated required assets must be produced by some job
/// (`resultAssetId`); they have no analysis state to consult.
pub fn evaluate_required_assets_ready(draft: &ManifestDraft, states: &[AssetState]) -> bool {
    let state_of = |id: &str| states.iter().find(|s| s.id == id);
    let produced = |id: &str| {
        draft
            .jobs
            .iter()
            .any(|j| j.result_asset_id.as_deref() == Some(id))
    };

    draft
        .assets
        .iter()
        .filter(|(_, asset)| asset.required)
        .all(|(id, asset)| match asset.source {
            AssetSource::User => {
                state_of(id).map(|s| s.status == AssetStatus::Completed) == Some(true)
            }
            AssetSource::Generated => produced(id),
        })
}

/// Evaluate both gate checks for a draft.
pub fn evaluate_quality_gate(draft: &ManifestDraft, states: &[AssetState]) -> QualityGate {
    QualityGate {
        duration_compliance: evaluate_duration_compliance(
            &draft.scenes,
            draft.metadata.duration_seconds,
        ),
        required_assets_ready: evaluate_required_assets_ready(draft, states),
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Non-fatal findings recorded on the manifest.
///
/// Optional assets may fail analysis or lack a producer without failing
/// the gate; each such case becomes one warning string.
pub fn gate_warnings(draft: &ManifestDraft, states: &[AssetState]) -> Vec<String> {
    let mut warnings = Vec::new();

    for (id, asset) in &draft.assets {
        if asset.required {
            continue;
        }
        match asset.source {
            AssetSource::User => {
                if let Some(state) = states.iter().find(|s| s.id == *id) {
                    if state.status.is_failure() {
                        warnings.push(format!(
                            "Optional asset '{id}' analysis ended {}; proceeding without it",
                            state.status.as_str()
                        ));
                    }
                }
            }
            AssetSource::Generated => {
                let produced = draft
                    .jobs
                    .iter()
                    .any(|j| j.result_asset_id.as_deref() == Some(id.as_str()));
                if !produced {
                    warnings.push(format!(
                        "Optional asset '{id}' has no job producing it"
                    ));
                }
            }
        }
    }

    warnings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
