//! Referential integrity checks over a manifest draft.
//!
//! Every symbolic reference in the draft (scene visuals, music cues,
//! narration keys, cue assets, job result assets) must resolve to a
//! declared entity. Purely structural, no side effects; run after
//! timeline validation so both error classes report together.

use std::collections::HashSet;

use serde::Serialize;

use crate::manifest::ManifestDraft;

// ---------------------------------------------------------------------------
// Dangling references
// ---------------------------------------------------------------------------

/// One unresolved reference, identifying both the referrer and the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum DanglingReference {
    /// A scene visual points at an undeclared asset.
    SceneVisual { scene_id: String, asset_id: String },
    /// A scene's music cue id is not in the cue map.
    SceneMusicCue { scene_id: String, cue_id: String },
    /// A narration map entry is keyed by an unknown scene id.
    NarrationScene { scene_id: String },
    /// A music cue points at an undeclared asset.
    CueAsset { cue_id: String, asset_id: String },
    /// A job's `resultAssetId` names an undeclared asset.
    JobResultAsset { job_id: String, asset_id: String },
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Check every reference in the draft. Empty result means pass.
///
/// Results are deduplicated and reported in first-encounter order.
pub fn resolve_references(draft: &ManifestDraft) -> Vec<DanglingReference> {
    let scene_ids: HashSet<&str> = draft.scenes.iter().map(|s| s.id.as_str()).collect();
    let asset_ids: HashSet<&str> = draft.assets.keys().map(String::as_str).collect();
    let cue_ids: HashSet<&str> = draft.audio.music_cues.keys().map(String::as_str).collect();

    let mut seen = HashSet::new();
    let mut dangling = Vec::new();
    let mut report = |reference: DanglingReference| {
        if seen.insert(reference.clone()) {
            dangling.push(reference);
        }
    };

    for scene in &draft.scenes {
        for visual in &scene.visuals {
            if !asset_ids.contains(visual.as_str()) {
                report(DanglingReference::SceneVisual {
                    scene_id: scene.id.clone(),
                    asset_id: visual.clone(),
                });
            }
        }
        if let Some(cue_id) = &scene.music_cue {
            if !cue_ids.contains(cue_id.as_str()) {
                report(DanglingReference::SceneMusicCue {
                    scene_id: scene.id.clone(),
                    cue_id: cue_id.clone(),
                });
            }
        }
    }

    for scene_id in draft.audio.narration.keys() {
        if !scene_ids.contains(scene_id.as_str()) {
            report(DanglingReference::NarrationScene {
                scene_id: scene_id.clone(),
            });
        }
    }

    for (cue_id, cue) in &draft.audio.music_cues {
        if let Some(asset_id) = &cue.asset_id {
            if !asset_ids.contains(asset_id.as_str()) {
                report(DanglingReference::CueAsset {
                    cue_id: cue_id.clone(),
                    asset_id: asset_id.clone(),
                });
            }
        }
    }

    for job in &draft.jobs {
        if let Some(asset_id) = &job.result_asset_id {
            if !asset_ids.contains(asset_id.as_str()) {
                report(DanglingReference::JobResultAsset {
                    job_id: job.id.clone(),
                    asset_id: asset_id.clone(),
                });
            }
        }
    }

    dangling
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
