use crate::collision::Substitution;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Snapshot of the whole batch during relocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelocationStatus<'a> {
    #[serde(rename = "files")]
    pub substitutions: Cow<'a, [Substitution]>,
    #[serde(rename = "totalFiles")]
    pub total_substitutions: usize,
    #[serde(rename = "totalRelocated")]
    pub total_relocated: usize,
}

impl<'a> RelocationStatus<'a> {
    pub fn new(substitutions: &'a [Substitution], total_relocated: usize) -> Self {
        Self {
            total_substitutions: substitutions.len(),
            substitutions: Cow::Borrowed(substitutions),
            total_relocated,
        }
    }

    pub fn into_owned(self) -> RelocationStatus<'static> {
        RelocationStatus {
            substitutions: Cow::Owned(self.substitutions.into_owned()),
            total_substitutions: self.total_substitutions,
            total_relocated: self.total_relocated,
        }
    }
}

/// Receives pipeline notifications inline, in emission order. A slow
/// observer blocks the pipeline.
pub trait ProgressObserver {
    fn on_file_found(&mut self, _found: &[Substitution]) {}
    fn on_scan_complete(&mut self, _total: usize) {}
    fn on_relocating(&mut self, _status: &RelocationStatus<'_>) {}
    fn on_relocation_complete(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum ProgressEvent<'a> {
    #[serde(rename = "finding-files")]
    FindingFiles { files: Cow<'a, [Substitution]> },
    #[serde(rename = "finding-complete")]
    FindingComplete { total: usize },
    #[serde(rename = "relocating-files")]
    RelocatingFiles(RelocationStatus<'a>),
    #[serde(rename = "relocating-complete")]
    RelocatingComplete,
}

impl ProgressEvent<'_> {
    pub fn into_owned(self) -> ProgressEvent<'static> {
        match self {
            ProgressEvent::FindingFiles { files } => ProgressEvent::FindingFiles {
                files: Cow::Owned(files.into_owned()),
            },
            ProgressEvent::FindingComplete { total } => ProgressEvent::FindingComplete { total },
            ProgressEvent::RelocatingFiles(status) => {
                ProgressEvent::RelocatingFiles(status.into_owned())
            }
            ProgressEvent::RelocatingComplete => ProgressEvent::RelocatingComplete,
        }
    }
}

/// Collects every notification as an owned [`ProgressEvent`].
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub events: Vec<ProgressEvent<'static>>,
}

impl ProgressObserver for RecordingObserver {
    fn on_file_found(&mut self, found: &[Substitution]) {
        self.events.push(ProgressEvent::FindingFiles {
            files: Cow::Owned(found.to_vec()),
        });
    }

    fn on_scan_complete(&mut self, total: usize) {
        self.events.push(ProgressEvent::FindingComplete { total });
    }

    fn on_relocating(&mut self, status: &RelocationStatus<'_>) {
        self.events
            .push(ProgressEvent::RelocatingFiles(status.clone().into_owned()));
    }

    fn on_relocation_complete(&mut self) {
        self.events.push(ProgressEvent::RelocatingComplete);
    }
}
