//! Deterministic built-in providers.
//!
//! [`HeuristicAnalyzer`] and [`TemplatePlanner`] make the engine fully
//! runnable without any vendor integration: scores are stable functions
//! of the asset id and the plan is a fixed template over the declared
//! constraints. Hosts swap in real providers through the traits.

use std::collections::BTreeMap;

use async_trait::async_trait;

use showrun_core::manifest::{
    AssetSource, AudioPlan, Job, ManifestAsset, ManifestDraft, ManifestMetadata, MediaType,
    MusicCue, Scene, TtsDefaults, JOB_TYPE_IMAGE_GENERATION, JOB_TYPE_MUSIC_GENERATION,
    JOB_TYPE_RENDER, JOB_TYPE_SPEECH_SYNTHESIS,
};
use showrun_core::query::{InputAsset, Query};

use crate::providers::{
    AnalysisProvider, AssetAnalysis, ManifestPlanner, ProgressReporter, ProviderError,
};

// ---------------------------------------------------------------------------
// HeuristicAnalyzer
// ---------------------------------------------------------------------------

/// Deterministic per-asset analyzer.
///
/// The quality score is a stable hash of the asset id mapped into
/// `0.60..=0.99`, so runs are reproducible in tests and demos.
pub struct HeuristicAnalyzer;

fn stable_score(asset_id: &str) -> f64 {
    let sum: u32 = asset_id.bytes().map(u32::from).sum();
    0.6 + f64::from(sum % 40) / 100.0
}

fn stable_media_duration(asset_id: &str) -> i64 {
    let sum: i64 = asset_id.bytes().map(i64::from).sum();
    5 + sum % 26
}

#[async_trait]
impl AnalysisProvider for HeuristicAnalyzer {
    async fn analyze(
        &self,
        asset: &InputAsset,
        progress: &ProgressReporter,
    ) -> Result<AssetAnalysis, ProviderError> {
        progress.report(20);
        tokio::task::yield_now().await;
        progress.report(60);

        let duration_seconds = match asset.media_type {
            MediaType::Video | MediaType::Audio => Some(stable_media_duration(&asset.id)),
            MediaType::Image => None,
        };
        let quality_score = stable_score(&asset.id);

        progress.report(90);
        Ok(AssetAnalysis {
            asset_id: asset.id.clone(),
            quality_score,
            summary: format!(
                "{} {} asset '{}' scored {quality_score:.2}",
                asset.source.as_str(),
                asset.media_type.as_str(),
                asset.id
            ),
            tags: vec![
                asset.media_type.as_str().to_string(),
                asset.source.as_str().to_string(),
            ],
            duration_seconds,
        })
    }
}

// ---------------------------------------------------------------------------
// TemplatePlanner
// ---------------------------------------------------------------------------

/// Longest scene the template will cut.
const MAX_SCENE_SECONDS: i64 = 15;

/// Hard cap on template scene count.
const MAX_SCENES: i64 = 8;

/// Deterministic template planner.
///
/// Splits the declared duration into contiguous scenes summing exactly to
/// the total, narrates each from the prompt, distributes input visuals
/// round-robin (generating one visual per scene when there are none),
/// lays a single generated music bed, and emits the job graph: one
/// speech-synthesis job per scene, generation jobs for generated assets,
/// and a final render depending on everything else.
pub struct TemplatePlanner;

#[async_trait]
impl ManifestPlanner for TemplatePlanner {
    async fn plan(
        &self,
        query: &Query,
        user_id: &str,
        assets: &[InputAsset],
        analyses: &[AssetAnalysis],
    ) -> Result<ManifestDraft, ProviderError> {
        let total = query.constraints.duration_seconds;
        if total <= 0 {
            return Err(ProviderError::InvalidInput(format!(
                "declared duration must be > 0, got {total}"
            )));
        }

        let scene_count = ((total + MAX_SCENE_SECONDS - 1) / MAX_SCENE_SECONDS).clamp(1, MAX_SCENES);
        let base = total / scene_count;
        let remainder = total % scene_count;

        let prompt = query.prompt.trim();
        let score_of = |asset_id: &str| {
            analyses
                .iter()
                .find(|a| a.asset_id == asset_id)
                .map(|a| a.quality_score)
        };

        let mut asset_map: BTreeMap<String, ManifestAsset> = BTreeMap::new();
        for asset in assets {
            asset_map.insert(
                asset.id.clone(),
                ManifestAsset {
                    media_type: asset.media_type,
                    source: asset.source,
                    uri: asset.uri.clone(),
                    label: asset.label.clone(),
                    required: asset.required,
                    quality_score: score_of(&asset.id),
                },
            );
        }

        let visual_inputs: Vec<&InputAsset> = assets
            .iter()
            .filter(|a| matches!(a.media_type, MediaType::Image | MediaType::Video))
            .collect();

        let mut scenes = Vec::with_capacity(scene_count as usize);
        let mut narration = BTreeMap::new();
        let mut jobs = Vec::new();
        let mut start = 0i64;

        for i in 0..scene_count {
            let n = i + 1;
            let scene_id = format!("scene-{n}");
            let duration = base + if i < remainder { 1 } else { 0 };
            let purpose = if i == 0 {
                "hook"
            } else if i == scene_count - 1 && scene_count > 1 {
                "outro"
            } else {
                "body"
            };
            let text = format!("Part {n} of {scene_count}: {prompt}");

            let visuals = if visual_inputs.is_empty() {
                // No usable inputs: generate one visual per scene.
                let gen_id = format!("gen-visual-scene-{n}");
                asset_map.insert(
                    gen_id.clone(),
                    ManifestAsset {
                        media_type: MediaType::Image,
                        source: AssetSource::Generated,
                        uri: None,
                        label: Some(format!("Generated visual for scene {n}")),
                        required: true,
                        quality_score: None,
                    },
                );
                jobs.push(Job {
                    id: format!("imggen-scene-{n}"),
                    job_type: JOB_TYPE_IMAGE_GENERATION.to_string(),
                    payload: serde_json::json!({
                        "sceneId": scene_id,
                        "prompt": prompt,
                        "aspectRatio": query.constraints.aspect_ratio,
                    }),
                    depends_on: vec![],
                    result_asset_id: Some(gen_id.clone()),
                });
                vec![gen_id]
            } else {
                vec![visual_inputs[(i as usize) % visual_inputs.len()].id.clone()]
            };

            jobs.push(Job {
                id: format!("tts-scene-{n}"),
                job_type: JOB_TYPE_SPEECH_SYNTHESIS.to_string(),
                payload: serde_json::json!({
                    "sceneId": scene_id,
                    "text": text,
                    "language": query.constraints.language,
                }),
                depends_on: vec![],
                result_asset_id: None,
            });

            narration.insert(scene_id.clone(), text.clone());
            scenes.push(Scene {
                id: scene_id,
                start_at_sec: start,
                duration_seconds: duration,
                purpose: purpose.to_string(),
                narration: Some(text),
                visuals,
                music_cue: Some("cue-bed".to_string()),
            });
            start += duration;
        }

        // One generated music bed shared by every scene.
        asset_map.insert(
            "gen-music-bed".to_string(),
            ManifestAsset {
                media_type: MediaType::Audio,
                source: AssetSource::Generated,
                uri: None,
                label: Some("Generated music bed".to_string()),
                required: true,
                quality_score: None,
            },
        );
        jobs.push(Job {
            id: "musicgen-bed".to_string(),
            job_type: JOB_TYPE_MUSIC_GENERATION.to_string(),
            payload: serde_json::json!({
                "mood": "ambient",
                "durationSeconds": total,
            }),
            depends_on: vec![],
            result_asset_id: Some("gen-music-bed".to_string()),
        });
        let mut music_cues = BTreeMap::new();
        music_cues.insert(
            "cue-bed".to_string(),
            MusicCue {
                asset_id: Some("gen-music-bed".to_string()),
                mood: Some("ambient".to_string()),
            },
        );

        // Final render depends on every other job.
        let upstream: Vec<String> = jobs.iter().map(|j| j.id.clone()).collect();
        jobs.push(Job {
            id: "render-final".to_string(),
            job_type: JOB_TYPE_RENDER.to_string(),
            payload: serde_json::json!({
                "format": "mp4",
                "aspectRatio": query.constraints.aspect_ratio,
                "platform": query.constraints.platform,
                "durationSeconds": total,
            }),
            depends_on: upstream,
            result_asset_id: None,
        });

        Ok(ManifestDraft {
            query_id: query.id,
            user_id: user_id.to_string(),
            source_refs: assets.iter().filter_map(|a| a.uri.clone()).collect(),
            metadata: ManifestMetadata {
                duration_seconds: total,
                aspect_ratio: query.constraints.aspect_ratio.clone(),
                platform: query.constraints.platform.clone(),
                language: query.constraints.language.clone(),
            },
            scenes,
            assets: asset_map,
            audio: AudioPlan {
                tts_defaults: TtsDefaults {
                    voice: "default".to_string(),
                    language: query.constraints.language.clone(),
                    speaking_rate: 1.0,
                },
                narration,
                music_cues,
            },
            jobs,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use showrun_core::graph::JobGraph;
    use showrun_core::query::QueryConstraints;
    use showrun_core::references::resolve_references;
    use showrun_core::timeline::validate_timeline;

    fn query(duration: i64) -> Query {
        Query::new(
            "A teaser about tide pools",
            QueryConstraints {
                duration_seconds: duration,
                aspect_ratio: "16:9".to_string(),
                platform: "youtube".to_string(),
                language: "en".to_string(),
            },
        )
    }

    fn image_asset(id: &str) -> InputAsset {
        InputAsset {
            id: id.to_string(),
            media_type: MediaType::Image,
            source: AssetSource::User,
            uri: Some(format!("file:///{id}.png")),
            label: None,
            required: true,
        }
    }

    // -- HeuristicAnalyzer ----------------------------------------------------

    #[tokio::test]
    async fn analyzer_is_deterministic_and_in_range() {
        let (reporter, _rx) = ProgressReporter::channel();
        let a1 = HeuristicAnalyzer
            .analyze(&image_asset("a1"), &reporter)
            .await
            .unwrap();
        let a2 = HeuristicAnalyzer
            .analyze(&image_asset("a1"), &reporter)
            .await
            .unwrap();
        assert_eq!(a1.quality_score, a2.quality_score);
        assert!((0.6..1.0).contains(&a1.quality_score));
        assert_eq!(a1.tags, vec!["image", "user"]);
        assert!(a1.duration_seconds.is_none());
    }

    #[tokio::test]
    async fn analyzer_reports_increasing_progress() {
        let (reporter, mut rx) = ProgressReporter::channel();
        HeuristicAnalyzer
            .analyze(&image_asset("a1"), &reporter)
            .await
            .unwrap();
        let mut reports = Vec::new();
        while let Ok(pct) = rx.try_recv() {
            reports.push(pct);
        }
        assert_eq!(reports, vec![20, 60, 90]);
    }

    #[tokio::test]
    async fn analyzer_measures_duration_for_time_based_media() {
        let (reporter, _rx) = ProgressReporter::channel();
        let mut asset = image_asset("clip-1");
        asset.media_type = MediaType::Video;
        let analysis = HeuristicAnalyzer.analyze(&asset, &reporter).await.unwrap();
        let duration = analysis.duration_seconds.unwrap();
        assert!((5..=30).contains(&duration));
    }

    // -- TemplatePlanner ------------------------------------------------------

    #[tokio::test]
    async fn planned_scene_durations_sum_exactly() {
        for total in [1, 7, 15, 16, 60, 61, 119, 600] {
            let q = query(total);
            let draft = TemplatePlanner.plan(&q, "user-1", &[], &[]).await.unwrap();
            let report = validate_timeline(&draft.scenes, total);
            assert!(
                report.valid,
                "duration {total}: violations {:?}",
                report.violations
            );
        }
    }

    #[tokio::test]
    async fn plan_references_all_resolve() {
        let q = query(60);
        let assets = vec![image_asset("a1"), image_asset("a2")];
        let draft = TemplatePlanner
            .plan(&q, "user-1", &assets, &[])
            .await
            .unwrap();
        assert!(resolve_references(&draft).is_empty());
    }

    #[tokio::test]
    async fn plan_job_graph_is_acyclic_with_render_sink() {
        let q = query(60);
        let draft = TemplatePlanner.plan(&q, "user-1", &[], &[]).await.unwrap();
        let graph = JobGraph::build(&draft.jobs).unwrap();
        let render = graph.index_of("render-final").unwrap();
        assert_eq!(
            graph.dependency_indices(render).len(),
            draft.jobs.len() - 1,
            "render depends on every other job"
        );
        assert_eq!(graph.dependent_indices(render).len(), 0);
    }

    #[tokio::test]
    async fn plan_without_visual_inputs_generates_visuals() {
        let q = query(30);
        let draft = TemplatePlanner.plan(&q, "user-1", &[], &[]).await.unwrap();
        assert!(draft
            .assets
            .keys()
            .any(|id| id.starts_with("gen-visual-scene-")));
        assert!(draft
            .jobs
            .iter()
            .any(|j| j.job_type == JOB_TYPE_IMAGE_GENERATION));
    }

    #[tokio::test]
    async fn plan_with_visual_inputs_uses_them_round_robin() {
        let q = query(60);
        let assets = vec![image_asset("a1"), image_asset("a2")];
        let draft = TemplatePlanner
            .plan(&q, "user-1", &assets, &[])
            .await
            .unwrap();
        assert!(!draft
            .jobs
            .iter()
            .any(|j| j.job_type == JOB_TYPE_IMAGE_GENERATION));
        assert_eq!(draft.scenes[0].visuals, vec!["a1"]);
        assert_eq!(draft.scenes[1].visuals, vec!["a2"]);
        assert_eq!(draft.scenes[2].visuals, vec!["a1"]);
    }

    #[tokio::test]
    async fn plan_carries_analysis_scores_into_asset_map() {
        let q = query(30);
        let assets = vec![image_asset("a1")];
        let analyses = vec![AssetAnalysis {
            asset_id: "a1".to_string(),
            quality_score: 0.87,
            summary: "ok".to_string(),
            tags: vec![],
            duration_seconds: None,
        }];
        let draft = TemplatePlanner
            .plan(&q, "user-1", &assets, &analyses)
            .await
            .unwrap();
        assert_eq!(draft.assets["a1"].quality_score, Some(0.87));
    }

    #[tokio::test]
    async fn plan_narration_covers_every_scene() {
        let q = query(60);
        let draft = TemplatePlanner.plan(&q, "user-1", &[], &[]).await.unwrap();
        for scene in &draft.scenes {
            assert!(draft.audio.narration.contains_key(&scene.id));
            assert!(draft
                .jobs
                .iter()
                .any(|j| j.job_type == JOB_TYPE_SPEECH_SYNTHESIS
                    && j.payload["sceneId"] == scene.id.as_str()));
        }
    }

    #[tokio::test]
    async fn plan_rejects_non_positive_duration() {
        let mut q = query(10);
        q.constraints.duration_seconds = 0;
        assert!(TemplatePlanner.plan(&q, "user-1", &[], &[]).await.is_err());
    }
}
