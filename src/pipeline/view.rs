use crate::store::{ObjectDescriptor, Stage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Derive the recording identity from an object key.
///
/// Keys follow `<stage>/<identity>.<ext>`; the identity is the file stem, so
/// `source/rec1.wav` and `transcription/rec1.txt` join on `rec1`. Keys that
/// are bare partition markers or have an empty stem yield `None`.
pub fn identity_from_key(key: &str, stage: Stage) -> Option<String> {
    let rest = key.strip_prefix(stage.prefix())?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    let stem = match rest.rfind('.') {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// Whether a stage output exists for an identity, as of one listing.
///
/// `Unknown` means the partition could not be listed this pass, deliberately
/// distinct from `Absent`, so a transport failure can never read as
/// "processing never started".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum StagePresence {
    Present {
        key: String,
        size: u64,
        last_modified: Option<DateTime<Utc>>,
    },
    Absent,
    Unknown,
}

impl StagePresence {
    pub fn is_present(&self) -> bool {
        matches!(self, StagePresence::Present { .. })
    }

    /// Object key, when the stage output exists.
    pub fn key(&self) -> Option<&str> {
        match self {
            StagePresence::Present { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// One row of the reconciled view: a recording identity and its presence
/// across the three stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEntry {
    pub identity: String,
    pub source: StagePresence,
    pub transcription: StagePresence,
    pub processed: StagePresence,
    /// Downstream output exists with no corresponding source recording.
    /// Reported, but not linked to anything.
    pub orphaned: bool,
}

impl ViewEntry {
    pub fn stage(&self, stage: Stage) -> &StagePresence {
        match stage {
            Stage::Source => &self.source,
            Stage::Transcription => &self.transcription,
            Stage::Processed => &self.processed,
        }
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut StagePresence {
        match stage {
            Stage::Source => &mut self.source,
            Stage::Transcription => &mut self.transcription,
            Stage::Processed => &mut self.processed,
        }
    }
}

/// A partition listing's fate during one refresh pass.
#[derive(Debug)]
pub enum StageListing {
    Listed(Vec<ObjectDescriptor>),
    Failed(String),
}

/// Why a stage degraded to `Unknown` this pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub reason: String,
}

/// Immutable reconciled snapshot across all three stages.
///
/// Rebuilt from scratch on every refresh, never patched incrementally, so
/// out-of-band deletions can not leave stale rows behind. Each snapshot
/// reflects exactly one pass's listings per stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineView {
    pub taken_at: DateTime<Utc>,
    /// Entries sorted by identity.
    pub entries: Vec<ViewEntry>,
    /// Stages that could not be listed this pass.
    pub failures: Vec<StageFailure>,
}

impl PipelineView {
    /// Join three stage listings by recording identity.
    pub fn build(
        source: StageListing,
        transcription: StageListing,
        processed: StageListing,
    ) -> Self {
        let listings = [
            (Stage::Source, source),
            (Stage::Transcription, transcription),
            (Stage::Processed, processed),
        ];

        let mut failures = Vec::new();
        let mut defaults = [StagePresence::Absent, StagePresence::Absent, StagePresence::Absent];
        for (i, (stage, listing)) in listings.iter().enumerate() {
            if let StageListing::Failed(reason) = listing {
                defaults[i] = StagePresence::Unknown;
                failures.push(StageFailure {
                    stage: *stage,
                    reason: reason.clone(),
                });
            }
        }

        let blank = |identity: &str| ViewEntry {
            identity: identity.to_string(),
            source: defaults[0].clone(),
            transcription: defaults[1].clone(),
            processed: defaults[2].clone(),
            orphaned: false,
        };

        let mut entries: BTreeMap<String, ViewEntry> = BTreeMap::new();
        for (stage, listing) in listings {
            let StageListing::Listed(objects) = listing else {
                continue;
            };
            for obj in objects {
                let Some(identity) = identity_from_key(&obj.key, stage) else {
                    continue;
                };
                let entry = entries
                    .entry(identity.clone())
                    .or_insert_with(|| blank(&identity));
                *entry.stage_mut(stage) = StagePresence::Present {
                    key: obj.key,
                    size: obj.size,
                    last_modified: obj.last_modified,
                };
            }
        }

        let source_listed = defaults[0] == StagePresence::Absent;
        let mut entries: Vec<ViewEntry> = entries.into_values().collect();
        for entry in &mut entries {
            // Only call an entry orphaned when the source listing actually
            // succeeded; an Unknown source proves nothing.
            entry.orphaned = source_listed
                && !entry.source.is_present()
                && (entry.transcription.is_present() || entry.processed.is_present());
        }

        Self {
            taken_at: Utc::now(),
            entries,
            failures,
        }
    }

    pub fn entry(&self, identity: &str) -> Option<&ViewEntry> {
        self.entries.iter().find(|e| e.identity == identity)
    }

    pub fn stage_failed(&self, stage: Stage) -> bool {
        self.failures.iter().any(|f| f.stage == stage)
    }
}
