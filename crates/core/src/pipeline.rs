use crate::collision::{Substitution, SubstitutionBatch};
use crate::extractor::extract_metadata;
use crate::metadata::ImageMetadata;
use crate::paths::{is_supported_image, join_destination, normalize_path};
use crate::progress::{ProgressObserver, RelocationStatus};
use crate::template::render_path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelocationMode {
    Move,
    #[default]
    Copy,
}

#[derive(Debug, Clone, Default)]
pub struct OrganiseOptions {
    pub start_directories: Vec<PathBuf>,
    pub destination_directory: String,
    pub min_size: u64,
    pub min_width: u32,
    pub min_height: u32,
    pub naming_convention: String,
    pub mode: RelocationMode,
    pub verify_results: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scanning,
    Verify,
    Relocating,
    Complete,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SkipReason {
    #[error("ファイルサイズが小さすぎます: {size} < {min}")]
    TooSmall { size: u64, min: u64 },
    #[error("幅が足りません: {width} < {min}")]
    TooNarrow { width: u32, min: u32 },
    #[error("高さが足りません: {height} < {min}")]
    TooShort { height: u32, min: u32 },
}

#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("移動元ファイルが存在しません: {0}")]
    SourceMissing(PathBuf),
    #[error("移動先に既にファイルがあります: {0}")]
    DestinationExists(PathBuf),
    #[error("移動先に親ディレクトリがありません: {0}")]
    NoParent(PathBuf),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub found: usize,
    pub skipped: usize,
    pub missing_directories: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelocationReport {
    pub relocated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub scan: ScanReport,
    pub relocation: Option<RelocationReport>,
}

/// Owns one run: its options, its substitution batch and where it is in
/// the scan/relocate cycle.
#[derive(Debug)]
pub struct Organiser {
    options: OrganiseOptions,
    batch: SubstitutionBatch,
    state: RunState,
}

impl Organiser {
    pub fn new(options: OrganiseOptions) -> Self {
        Self {
            options,
            batch: SubstitutionBatch::new(),
            state: RunState::Idle,
        }
    }

    pub fn options(&self) -> &OrganiseOptions {
        &self.options
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn substitutions(&self) -> &[Substitution] {
        self.batch.entries()
    }

    /// Scans every start directory into a fresh batch, then relocates it
    /// unless `verify_results` is set.
    pub fn process_images(&mut self, observer: &mut dyn ProgressObserver) -> RunReport {
        self.batch = SubstitutionBatch::new();
        self.state = RunState::Scanning;

        let mut scan = ScanReport::default();
        let directories = self.options.start_directories.clone();
        for dir in &directories {
            if !dir.is_dir() {
                warn!("開始フォルダが存在しません: {}", dir.display());
                scan.missing_directories.push(dir.clone());
                continue;
            }
            info!("フォルダを処理しています: {}", dir.display());
            self.scan_directory(dir, &mut scan, observer);
        }

        scan.found = self.batch.len();
        observer.on_scan_complete(scan.found);
        info!("画像ファイルが{}件見つかりました", scan.found);

        if self.options.verify_results {
            self.state = RunState::Verify;
            return RunReport {
                scan,
                relocation: None,
            };
        }

        let relocation = self.relocate_files(observer);
        RunReport {
            scan,
            relocation: Some(relocation),
        }
    }

    /// Relocates the current batch on demand, typically after a
    /// verify-only scan has been reviewed.
    pub fn verify_relocation(&mut self, observer: &mut dyn ProgressObserver) -> RelocationReport {
        self.relocate_files(observer)
    }

    fn scan_directory(
        &mut self,
        dir: &Path,
        scan: &mut ScanReport,
        observer: &mut dyn ProgressObserver,
    ) {
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let failed = err.path().unwrap_or(dir);
                    warn!("フォルダ走査に失敗しました: {}: {err}", failed.display());
                    continue;
                }
            };
            let path = entry.path();
            if entry.file_type().is_dir() || !is_supported_image(path) {
                debug!("スキップ (フォルダまたは対象外の拡張子): {}", path.display());
                continue;
            }

            let metadata = match extract_metadata(path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    debug!("スキップ (読み込めません): {err:#}");
                    scan.skipped += 1;
                    continue;
                }
            };

            if let Err(reason) = self.check_thresholds(&metadata) {
                debug!("スキップ: {}: {reason}", path.display());
                scan.skipped += 1;
                continue;
            }

            let to = join_destination(
                &normalize_path(&self.options.destination_directory),
                &render_path(&self.options.naming_convention, &metadata),
            );
            self.batch.register(Substitution::new(metadata.file_path, to));
            observer.on_file_found(self.batch.entries());
        }
    }

    fn check_thresholds(&self, metadata: &ImageMetadata) -> Result<(), SkipReason> {
        let options = &self.options;
        if options.min_size > 0 && metadata.file_size < options.min_size {
            return Err(SkipReason::TooSmall {
                size: metadata.file_size,
                min: options.min_size,
            });
        }
        if options.min_width > 0 && metadata.width < options.min_width {
            return Err(SkipReason::TooNarrow {
                width: metadata.width,
                min: options.min_width,
            });
        }
        if options.min_height > 0 && metadata.height < options.min_height {
            return Err(SkipReason::TooShort {
                height: metadata.height,
                min: options.min_height,
            });
        }
        Ok(())
    }

    fn relocate_files(&mut self, observer: &mut dyn ProgressObserver) -> RelocationReport {
        self.state = RunState::Relocating;
        let mut report = RelocationReport::default();
        let mut total_relocated = self.batch.relocated_count();

        for index in 0..self.batch.len() {
            let entry = &self.batch.entries()[index];
            if entry.relocated {
                continue;
            }
            let from = PathBuf::from(&entry.from);
            let to = PathBuf::from(entry.destination());

            match relocate_entry(&from, &to, self.options.mode) {
                Ok(()) => {
                    debug!("{:?}: {} -> {}", self.options.mode, from.display(), to.display());
                    self.batch.mark_relocated(index);
                    total_relocated += 1;
                    report.relocated += 1;
                }
                Err(err) => {
                    warn!("再配置に失敗しました: {err:#}");
                    report.failed += 1;
                }
            }

            observer.on_relocating(&RelocationStatus::new(
                self.batch.entries(),
                total_relocated,
            ));
        }

        self.state = RunState::Complete;
        observer.on_relocation_complete();
        info!(
            "再配置完了: 成功 {}件 / 失敗 {}件",
            report.relocated, report.failed
        );
        report
    }
}

fn relocate_entry(from: &Path, to: &Path, mode: RelocationMode) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if !from.is_file() {
        return Err(RelocateError::SourceMissing(from.to_path_buf()).into());
    }
    if to.exists() {
        return Err(RelocateError::DestinationExists(to.to_path_buf()).into());
    }

    let parent = to
        .parent()
        .ok_or_else(|| RelocateError::NoParent(to.to_path_buf()))?;
    fs::create_dir_all(parent).with_context(|| {
        format!(
            "移動先フォルダを作成できませんでした: {}",
            parent.display()
        )
    })?;

    match mode {
        RelocationMode::Copy => {
            fs::copy(from, to).with_context(|| {
                format!("コピーに失敗しました: {} -> {}", from.display(), to.display())
            })?;
        }
        RelocationMode::Move => move_file(from, to)?,
    }
    Ok(())
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    debug!(
        "リネームできないためコピーで移動します: {} ({rename_err})",
        from.display()
    );

    fs::copy(from, to).with_context(|| {
        format!(
            "移動に失敗しました: {} -> {} (rename: {rename_err})",
            from.display(),
            to.display()
        )
    })?;
    if let Err(err) = fs::remove_file(from) {
        let remove_err = anyhow::Error::from(err).context(format!(
            "移動元ファイルを削除できませんでした: {}",
            from.display()
        ));
        if let Err(rollback_err) = fs::remove_file(to) {
            return Err(remove_err.context(format!(
                "コピー先の削除にも失敗しました: {}: {rollback_err}",
                to.display()
            )));
        }
        return Err(remove_err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif_reader::fixtures::jpeg_with_exif;
    use crate::progress::{NoopObserver, ProgressEvent, RecordingObserver};
    use image::RgbImage;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        RgbImage::new(width, height).save(path).expect("write png");
    }

    fn options(start: &Path, destination: &Path, template: &str) -> OrganiseOptions {
        OrganiseOptions {
            start_directories: vec![start.to_path_buf()],
            destination_directory: destination.to_string_lossy().to_string(),
            naming_convention: template.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn copies_into_rendered_tree_and_reports_progress() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write_png(&src.join("beach").join("IMG_01.png"), 10, 10);
        write_png(&src.join("city").join("IMG_02.png"), 10, 10);
        fs::write(src.join("notes.txt"), b"skip me").expect("write txt");

        let mut organiser = Organiser::new(options(&src, &out, "{parent}"));
        let mut observer = RecordingObserver::default();
        let report = organiser.process_images(&mut observer);

        assert_eq!(report.scan.found, 2);
        assert_eq!(report.relocation, Some(RelocationReport { relocated: 2, failed: 0 }));
        assert_eq!(organiser.state(), RunState::Complete);
        assert!(out.join("beach").join("IMG_01.png").is_file());
        assert!(out.join("city").join("IMG_02.png").is_file());
        assert!(src.join("beach").join("IMG_01.png").is_file(), "copy keeps source");
        assert!(organiser.substitutions().iter().all(|s| s.relocated));

        let names: Vec<&str> = observer
            .events
            .iter()
            .map(|e| match e {
                ProgressEvent::FindingFiles { .. } => "found",
                ProgressEvent::FindingComplete { .. } => "scan-complete",
                ProgressEvent::RelocatingFiles(_) => "relocating",
                ProgressEvent::RelocatingComplete => "complete",
            })
            .collect();
        assert_eq!(
            names,
            vec!["found", "found", "scan-complete", "relocating", "relocating", "complete"]
        );

        match &observer.events[0] {
            ProgressEvent::FindingFiles { files } => assert_eq!(files.len(), 1),
            other => panic!("unexpected event: {other:?}"),
        }
        match &observer.events[4] {
            ProgressEvent::RelocatingFiles(status) => {
                assert_eq!(status.total_substitutions, 2);
                assert_eq!(status.total_relocated, 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn move_mode_removes_source() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        let original = src.join("IMG_01.png");
        write_png(&original, 4, 4);

        let mut opts = options(&src, &out, "moved");
        opts.mode = RelocationMode::Move;
        let mut organiser = Organiser::new(opts);
        organiser.process_images(&mut NoopObserver);

        assert!(!original.exists());
        assert!(out.join("moved").join("IMG_01.png").is_file());
    }

    #[test]
    fn verify_mode_defers_relocation_until_requested() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write_png(&src.join("IMG_01.png"), 4, 4);

        let mut opts = options(&src, &out, "");
        opts.verify_results = true;
        let mut organiser = Organiser::new(opts);
        let mut observer = RecordingObserver::default();
        let report = organiser.process_images(&mut observer);

        assert_eq!(report.relocation, None);
        assert_eq!(organiser.state(), RunState::Verify);
        assert!(!out.exists());
        assert_eq!(
            observer.events.last(),
            Some(&ProgressEvent::FindingComplete { total: 1 })
        );

        let relocation = organiser.verify_relocation(&mut observer);
        assert_eq!(relocation.relocated, 1);
        assert!(out.join("IMG_01.png").is_file());
        assert_eq!(observer.events.last(), Some(&ProgressEvent::RelocatingComplete));

        let again = organiser.verify_relocation(&mut observer);
        assert_eq!(again, RelocationReport::default());
    }

    #[test]
    fn colliding_names_get_suffixes_in_walk_order() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write_png(&src.join("a").join("IMG_01.png"), 4, 4);
        write_png(&src.join("b").join("IMG_01.png"), 4, 4);
        write_png(&src.join("c").join("IMG_01.png"), 4, 4);

        let mut organiser = Organiser::new(options(&src, &out, "all"));
        organiser.process_images(&mut RecordingObserver::default());

        let subs = organiser.substitutions();
        let suffixes: Vec<usize> = subs.iter().map(|s| s.suffix).collect();
        assert_eq!(suffixes, vec![0, 1, 2]);
        assert!(subs[0].from.ends_with("/a/IMG_01.png"));
        assert!(subs[2].from.ends_with("/c/IMG_01.png"));

        let destinations: HashSet<String> = subs.iter().map(|s| s.destination()).collect();
        assert_eq!(destinations.len(), 3);
        for name in ["IMG_01.png", "IMG_01-1.png", "IMG_01-2.png"] {
            assert!(out.join("all").join(name).is_file(), "{name} missing");
        }
    }

    #[test]
    fn thresholds_only_apply_when_positive() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write_png(&src.join("narrow.png"), 100, 300);
        write_png(&src.join("wide.png"), 300, 100);

        let mut opts = options(&src, &out, "");
        opts.verify_results = true;
        opts.min_width = 200;
        let mut organiser = Organiser::new(opts.clone());
        let report = organiser.process_images(&mut RecordingObserver::default());
        assert_eq!(report.scan.found, 1);
        assert_eq!(report.scan.skipped, 1);
        assert!(organiser.substitutions()[0].from.ends_with("/wide.png"));

        opts.min_width = 0;
        opts.min_height = 200;
        let mut organiser = Organiser::new(opts.clone());
        organiser.process_images(&mut RecordingObserver::default());
        assert_eq!(organiser.substitutions().len(), 1);
        assert!(organiser.substitutions()[0].from.ends_with("/narrow.png"));

        opts.min_height = 0;
        let mut organiser = Organiser::new(opts.clone());
        organiser.process_images(&mut RecordingObserver::default());
        assert_eq!(organiser.substitutions().len(), 2);

        opts.min_size = u64::MAX;
        let mut organiser = Organiser::new(opts);
        organiser.process_images(&mut RecordingObserver::default());
        assert!(organiser.substitutions().is_empty());
    }

    #[test]
    fn undecodable_image_fails_dimension_filter_only() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        fs::create_dir_all(&src).expect("create src");
        fs::write(src.join("IMG.jpg"), jpeg_with_exif(Some("2015:06:07 08:09:10"), None))
            .expect("write jpg");

        let mut opts = options(&src, &out, "{year}/{month}");
        opts.verify_results = true;
        let mut organiser = Organiser::new(opts.clone());
        organiser.process_images(&mut RecordingObserver::default());
        let subs = organiser.substitutions();
        assert_eq!(subs.len(), 1);
        assert!(subs[0].to.ends_with("/out/2015/06/IMG.jpg"), "{}", subs[0].to);

        opts.min_width = 1;
        let mut organiser = Organiser::new(opts);
        organiser.process_images(&mut RecordingObserver::default());
        assert!(organiser.substitutions().is_empty());
    }

    #[test]
    fn missing_start_directory_is_reported_and_others_continue() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        let missing = temp.path().join("missing");
        write_png(&src.join("IMG_01.png"), 4, 4);

        let mut opts = options(&src, &out, "");
        opts.start_directories = vec![missing.clone(), src.clone()];
        let mut organiser = Organiser::new(opts);
        let report = organiser.process_images(&mut RecordingObserver::default());

        assert_eq!(report.scan.missing_directories, vec![missing]);
        assert_eq!(report.scan.found, 1);
        assert_eq!(report.relocation.map(|r| r.relocated), Some(1));
    }

    #[test]
    fn failed_entry_does_not_abort_batch() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write_png(&src.join("a.png"), 4, 4);
        write_png(&src.join("b.png"), 4, 4);
        fs::create_dir_all(&out).expect("create out");
        fs::write(out.join("a.png"), b"already here").expect("occupy destination");

        let mut organiser = Organiser::new(options(&src, &out, ""));
        let mut observer = RecordingObserver::default();
        let report = organiser.process_images(&mut observer);

        assert_eq!(report.relocation, Some(RelocationReport { relocated: 1, failed: 1 }));
        let subs = organiser.substitutions();
        assert!(!subs[0].relocated);
        assert!(subs[1].relocated);
        assert_eq!(fs::read(out.join("a.png")).expect("read"), b"already here");
        assert!(out.join("b.png").is_file());

        let relocating = observer
            .events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::RelocatingFiles(_)))
            .count();
        assert_eq!(relocating, 2);
    }

    #[test]
    fn new_run_replaces_previous_batch() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        write_png(&src.join("a.png"), 4, 4);

        let mut opts = options(&src, &out, "");
        opts.verify_results = true;
        let mut organiser = Organiser::new(opts);
        organiser.process_images(&mut NoopObserver);
        organiser.process_images(&mut NoopObserver);
        assert_eq!(organiser.substitutions().len(), 1);
        assert_eq!(organiser.substitutions()[0].suffix, 0);
    }

    #[test]
    fn source_already_at_destination_counts_as_relocated() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("library");
        write_png(&root.join("IMG_01.png"), 4, 4);

        let mut opts = options(&root, &root, "");
        opts.mode = RelocationMode::Move;
        let mut organiser = Organiser::new(opts);
        let report = organiser.process_images(&mut RecordingObserver::default());
        assert_eq!(report.relocation, Some(RelocationReport { relocated: 1, failed: 0 }));
        assert!(root.join("IMG_01.png").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subtree_is_abandoned_and_scan_continues() {
        use crate::paths::base_name;
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().expect("tempdir");
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        let out = temp.path().join("out");
        write_png(&first.join("a_open").join("IMG_01.png"), 4, 4);
        write_png(&first.join("b_locked").join("IMG_02.png"), 4, 4);
        write_png(&first.join("c_open").join("IMG_03.png"), 4, 4);
        write_png(&second.join("IMG_04.png"), 4, 4);

        let locked = first.join("b_locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("lock");
        if fs::read_dir(&locked).is_ok() {
            // Permission bits are not enforced (running as root).
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("unlock");
            return;
        }

        let mut opts = options(&first, &out, "");
        opts.start_directories.push(second.clone());
        opts.verify_results = true;
        let mut organiser = Organiser::new(opts);
        let report = organiser.process_images(&mut NoopObserver);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("unlock");

        let found: HashSet<String> = organiser
            .substitutions()
            .iter()
            .map(|s| base_name(&s.from).to_string())
            .collect();
        let expected: HashSet<String> = ["IMG_01.png", "IMG_03.png", "IMG_04.png"]
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(found, expected);
        assert_eq!(report.scan.found, 3);
        assert!(report.scan.missing_directories.is_empty());
        assert_eq!(organiser.state(), RunState::Verify);
    }
}
