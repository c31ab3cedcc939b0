//! Production manifest document model and vocabulary.
//!
//! The manifest is the assembled production plan exchanged with dispatch
//! workers: timed scenes, the declared asset map, the audio plan, and the
//! generation job list. Field names follow the camelCase wire format.
//! Enums are closed: unknown `source` / media-type values are rejected at
//! the deserialization boundary instead of being passed through.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::QueryId;

// ---------------------------------------------------------------------------
// Job type constants
// ---------------------------------------------------------------------------

pub const JOB_TYPE_SPEECH_SYNTHESIS: &str = "speech-synthesis";
pub const JOB_TYPE_IMAGE_GENERATION: &str = "image-generation";
pub const JOB_TYPE_VIDEO_GENERATION: &str = "video-generation";
pub const JOB_TYPE_MUSIC_GENERATION: &str = "music-generation";
pub const JOB_TYPE_RENDER: &str = "render";

/// All valid job type strings.
pub const VALID_JOB_TYPES: &[&str] = &[
    JOB_TYPE_SPEECH_SYNTHESIS,
    JOB_TYPE_IMAGE_GENERATION,
    JOB_TYPE_VIDEO_GENERATION,
    JOB_TYPE_MUSIC_GENERATION,
    JOB_TYPE_RENDER,
];

// ---------------------------------------------------------------------------
// Platform constants
// ---------------------------------------------------------------------------

pub const PLATFORM_YOUTUBE: &str = "youtube";
pub const PLATFORM_TIKTOK: &str = "tiktok";
pub const PLATFORM_INSTAGRAM: &str = "instagram";
pub const PLATFORM_GENERIC: &str = "generic";

/// All valid target platforms.
pub const VALID_PLATFORMS: &[&str] = &[
    PLATFORM_YOUTUBE,
    PLATFORM_TIKTOK,
    PLATFORM_INSTAGRAM,
    PLATFORM_GENERIC,
];

// ---------------------------------------------------------------------------
// Entity id format
// ---------------------------------------------------------------------------

/// Scene, asset, cue, and job ids: lowercase alphanumeric with `-`/`_`,
/// 1-64 chars, starting with a letter or digit.
static ENTITY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,63}$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Closed vocabulary enums
// ---------------------------------------------------------------------------

/// Media type of an asset. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// Provenance of an asset. Closed set: anything else (e.g. `"stock"`) is
/// rejected when the document is deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetSource {
    User,
    Generated,
}

impl AssetSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Generated => "generated",
        }
    }
}

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

/// One time-boxed segment of the production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub start_at_sec: i64,
    pub duration_seconds: i64,
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    /// Asset ids rendered during this scene.
    #[serde(default)]
    pub visuals: Vec<String>,
    /// At most one music cue id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_cue: Option<String>,
}

/// A declared asset entry in the manifest's asset map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAsset {
    pub media_type: MediaType,
    pub source: AssetSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Whether failing to produce/analyze this asset fails the whole plan.
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
}

fn default_true() -> bool {
    true
}

/// A music cue in the audio plan, keyed by cue id in [`AudioPlan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicCue {
    /// Declared asset carrying (or to carry) the audio, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

/// Speech synthesis defaults applied to narration without per-scene overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsDefaults {
    pub voice: String,
    pub language: String,
    #[serde(default = "default_speaking_rate")]
    pub speaking_rate: f64,
}

fn default_speaking_rate() -> f64 {
    1.0
}

impl Default for TtsDefaults {
    fn default() -> Self {
        Self {
            voice: "default".to_string(),
            language: "en".to_string(),
            speaking_rate: 1.0,
        }
    }
}

/// The audio plan: TTS defaults, per-scene narration, and the music cue map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioPlan {
    #[serde(default)]
    pub tts_defaults: TtsDefaults,
    /// Narration text keyed by scene id.
    #[serde(default)]
    pub narration: BTreeMap<String, String>,
    /// Music cues keyed by cue id.
    #[serde(default)]
    pub music_cues: BTreeMap<String, MusicCue>,
}

/// Declared production-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetadata {
    pub duration_seconds: i64,
    pub aspect_ratio: String,
    pub platform: String,
    pub language: String,
}

/// One unit of generation work. Payload is opaque to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Asset this job produces, when its output lands in the asset map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_asset_id: Option<String>,
}

/// Quality gate evaluated at assembly time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityGate {
    pub duration_compliance: bool,
    pub required_assets_ready: bool,
}

impl QualityGate {
    /// `true` when both gate checks hold.
    pub fn passed(self) -> bool {
        self.duration_compliance && self.required_assets_ready
    }
}

/// A candidate manifest before validation. Produced by the planner,
/// consumed by the assembler; never exposed to dispatchers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDraft {
    pub query_id: QueryId,
    pub user_id: String,
    #[serde(default)]
    pub source_refs: Vec<String>,
    pub metadata: ManifestMetadata,
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub assets: BTreeMap<String, ManifestAsset>,
    #[serde(default)]
    pub audio: AudioPlan,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// The validated, immutable production plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub query_id: QueryId,
    pub user_id: String,
    #[serde(default)]
    pub source_refs: Vec<String>,
    pub metadata: ManifestMetadata,
    pub scenes: Vec<Scene>,
    pub assets: BTreeMap<String, ManifestAsset>,
    pub audio: AudioPlan,
    pub jobs: Vec<Job>,
    pub quality_gate: QualityGate,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Manifest {
    /// Seal a validated draft with its gate result and non-fatal warnings.
    pub fn from_draft(draft: ManifestDraft, quality_gate: QualityGate, warnings: Vec<String>) -> Self {
        Self {
            query_id: draft.query_id,
            user_id: draft.user_id,
            source_refs: draft.source_refs,
            metadata: draft.metadata,
            scenes: draft.scenes,
            assets: draft.assets,
            audio: draft.audio,
            jobs: draft.jobs,
            quality_gate,
            warnings,
        }
    }
}

// ---------------------------------------------------------------------------
// Aspect ratio parsing
// ---------------------------------------------------------------------------

/// Parse an aspect ratio string like `"16:9"` into `(width, height)` parts.
pub fn parse_aspect_ratio(s: &str) -> Result<(u32, u32), CoreError> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(CoreError::Validation(format!(
            "Invalid aspect ratio '{s}': expected W:H"
        )));
    }
    let w = parts[0]
        .parse::<u32>()
        .map_err(|_| CoreError::Validation(format!("Invalid width in aspect ratio '{s}'")))?;
    let h = parts[1]
        .parse::<u32>()
        .map_err(|_| CoreError::Validation(format!("Invalid height in aspect ratio '{s}'")))?;
    if w == 0 || h == 0 {
        return Err(CoreError::Validation(format!(
            "Aspect ratio parts must be > 0, got '{s}'"
        )));
    }
    Ok((w, h))
}

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// Validate that a job type string is in the known set.
pub fn validate_job_type(job_type: &str) -> Result<(), CoreError> {
    if VALID_JOB_TYPES.contains(&job_type) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown job type '{job_type}'. Valid: {VALID_JOB_TYPES:?}"
        )))
    }
}

/// Validate that a platform string is in the known set.
pub fn validate_platform(platform: &str) -> Result<(), CoreError> {
    if VALID_PLATFORMS.contains(&platform) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown platform '{platform}'. Valid: {VALID_PLATFORMS:?}"
        )))
    }
}

/// Validate an entity id (scene, asset, cue, or job id).
pub fn validate_entity_id(id: &str) -> Result<(), CoreError> {
    if ENTITY_ID_RE.is_match(id) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid entity id '{id}': lowercase alphanumeric plus '-'/'_', max 64 chars"
        )))
    }
}

/// Validate an aspect ratio string format.
pub fn validate_aspect_ratio(s: &str) -> Result<(), CoreError> {
    parse_aspect_ratio(s).map(|_| ())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_json() -> &'static str {
        r#"{
            "id": "scene-1",
            "startAtSec": 0,
            "durationSeconds": 8,
            "purpose": "hook",
            "narration": "Welcome.",
            "visuals": ["asset-1"],
            "musicCue": "cue-1"
        }"#
    }

    // -- Wire format ----------------------------------------------------------

    #[test]
    fn scene_deserializes_camel_case() {
        let scene: Scene = serde_json::from_str(scene_json()).unwrap();
        assert_eq!(scene.id, "scene-1");
        assert_eq!(scene.start_at_sec, 0);
        assert_eq!(scene.duration_seconds, 8);
        assert_eq!(scene.visuals, vec!["asset-1"]);
        assert_eq!(scene.music_cue.as_deref(), Some("cue-1"));
    }

    #[test]
    fn scene_optional_fields_default() {
        let scene: Scene = serde_json::from_str(
            r#"{"id": "s", "startAtSec": 0, "durationSeconds": 5, "purpose": "body"}"#,
        )
        .unwrap();
        assert!(scene.narration.is_none());
        assert!(scene.visuals.is_empty());
        assert!(scene.music_cue.is_none());
    }

    #[test]
    fn job_serializes_type_and_depends_on() {
        let job = Job {
            id: "render-1".to_string(),
            job_type: JOB_TYPE_RENDER.to_string(),
            payload: serde_json::json!({"format": "mp4"}),
            depends_on: vec!["tts-1".to_string()],
            result_asset_id: None,
        };
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"type\":\"render\""));
        assert!(json.contains("\"dependsOn\":[\"tts-1\"]"));
        assert!(!json.contains("resultAssetId"));
    }

    #[test]
    fn job_depends_on_defaults_empty() {
        let job: Job =
            serde_json::from_str(r#"{"id": "j1", "type": "render", "payload": {}}"#).unwrap();
        assert!(job.depends_on.is_empty());
    }

    #[test]
    fn quality_gate_serializes_camel_case() {
        let gate = QualityGate {
            duration_compliance: true,
            required_assets_ready: false,
        };
        let json = serde_json::to_string(&gate).unwrap();
        assert!(json.contains("durationCompliance"));
        assert!(json.contains("requiredAssetsReady"));
        assert!(!gate.passed());
    }

    // -- Closed enums ---------------------------------------------------------

    #[test]
    fn asset_source_rejects_unknown_value() {
        let result: Result<AssetSource, _> = serde_json::from_str("\"stock\"");
        assert!(result.is_err());
    }

    #[test]
    fn asset_source_accepts_user_and_generated() {
        let user: AssetSource = serde_json::from_str("\"user\"").unwrap();
        let generated: AssetSource = serde_json::from_str("\"generated\"").unwrap();
        assert_eq!(user, AssetSource::User);
        assert_eq!(generated, AssetSource::Generated);
    }

    #[test]
    fn media_type_rejects_unknown_value() {
        let result: Result<MediaType, _> = serde_json::from_str("\"document\"");
        assert!(result.is_err());
    }

    #[test]
    fn manifest_asset_required_defaults_true() {
        let asset: ManifestAsset =
            serde_json::from_str(r#"{"mediaType": "image", "source": "user"}"#).unwrap();
        assert!(asset.required);
        assert!(asset.uri.is_none());
    }

    // -- Aspect ratio ---------------------------------------------------------

    #[test]
    fn parse_aspect_ratio_valid() {
        assert_eq!(parse_aspect_ratio("16:9").unwrap(), (16, 9));
        assert_eq!(parse_aspect_ratio("9:16").unwrap(), (9, 16));
    }

    #[test]
    fn parse_aspect_ratio_invalid_format() {
        assert!(parse_aspect_ratio("16x9").is_err());
        assert!(parse_aspect_ratio("16:9:1").is_err());
    }

    #[test]
    fn parse_aspect_ratio_non_numeric() {
        assert!(parse_aspect_ratio("wide:tall").is_err());
    }

    #[test]
    fn parse_aspect_ratio_zero_part() {
        assert!(parse_aspect_ratio("0:9").is_err());
        assert!(parse_aspect_ratio("16:0").is_err());
    }

    // -- Vocabulary validators ------------------------------------------------

    #[test]
    fn validate_job_type_known() {
        assert!(validate_job_type("speech-synthesis").is_ok());
        assert!(validate_job_type("render").is_ok());
    }

    #[test]
    fn validate_job_type_unknown() {
        assert!(validate_job_type("transcode").is_err());
    }

    #[test]
    fn validate_platform_known() {
        assert!(validate_platform("youtube").is_ok());
        assert!(validate_platform("generic").is_ok());
    }

    #[test]
    fn validate_platform_unknown() {
        assert!(validate_platform("vimeo").is_err());
    }

    #[test]
    fn validate_entity_id_valid() {
        assert!(validate_entity_id("scene-1").is_ok());
        assert!(validate_entity_id("tts_intro").is_ok());
        assert!(validate_entity_id("a").is_ok());
    }

    #[test]
    fn validate_entity_id_invalid() {
        assert!(validate_entity_id("").is_err());
        assert!(validate_entity_id("Scene-1").is_err());
        assert!(validate_entity_id("-leading").is_err());
        assert!(validate_entity_id("has space").is_err());
        assert!(validate_entity_id(&"x".repeat(65)).is_err());
    }

    // -- Manifest sealing -----------------------------------------------------

    #[test]
    fn manifest_from_draft_carries_fields() {
        let draft = ManifestDraft {
            query_id: uuid::Uuid::new_v4(),
            user_id: "user-1".to_string(),
            source_refs: vec!["ref-1".to_string()],
            metadata: ManifestMetadata {
                duration_seconds: 60,
                aspect_ratio: "16:9".to_string(),
                platform: PLATFORM_YOUTUBE.to_string(),
                language: "en".to_string(),
            },
            scenes: vec![],
            assets: BTreeMap::new(),
            audio: AudioPlan::default(),
            jobs: vec![],
        };
        let gate = QualityGate {
            duration_compliance: true,
            required_assets_ready: true,
        };
        let manifest = Manifest::from_draft(draft.clone(), gate, vec!["w".to_string()]);
        assert_eq!(manifest.query_id, draft.query_id);
        assert_eq!(manifest.metadata.duration_seconds, 60);
        assert!(manifest.quality_gate.passed());
        assert_eq!(manifest.warnings, vec!["w"]);

        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"qualityGate\""));
        assert!(json.contains("\"userId\""));
        assert!(json.contains("\"sourceRefs\""));
    }
}
