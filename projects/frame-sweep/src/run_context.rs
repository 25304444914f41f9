use crate::config::PipelineConfig;
use crate::run_artifacts::RunSummary;
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const RUN_SUMMARY_FILE: &str = "run.json";

/// Delete `dir` if present and recreate it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {:?}", dir))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    Ok(())
}

/// Recreate the results root with empty raw and processed subtrees.
/// Anything left by a previous run is destroyed.
pub fn prepare_output_tree(config: &PipelineConfig) -> Result<()> {
    reset_dir(&config.results_dir)?;
    reset_dir(&config.raw_dir)?;
    reset_dir(&config.processed_dir)?;
    tracing::info!("Prepared clean output tree at {:?}", config.results_dir);
    Ok(())
}

/// Clear (or create) the raw-frame folder for one video.
pub fn prepare_video_folder(raw_dir: &Path, stem: &str) -> Result<PathBuf> {
    let folder = raw_dir.join(stem);
    reset_dir(&folder)?;
    Ok(folder)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Immediate children of `dir` (sorted by name) that pass `keep`.
/// Unreadable directories are errors.
fn list_children(dir: &Path, keep: impl Fn(&walkdir::DirEntry) -> bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Not a directory: {:?}", dir);
    }

    let mut children = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
        if keep(&entry) {
            children.push(entry.into_path());
        }
    }
    Ok(children)
}

/// Video files directly inside `video_root` whose extension matches
/// `extension` (case-insensitive). Other entries are skipped.
pub fn list_videos(video_root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    list_children(video_root, |e| {
        e.file_type().is_file() && has_extension(e.path(), extension)
    })
    .with_context(|| format!("Failed to read video directory {:?}", video_root))
}

/// Per-video frame folders under the raw root.
pub fn list_frame_dirs(raw_root: &Path) -> Result<Vec<PathBuf>> {
    list_children(raw_root, |e| e.file_type().is_dir())
}

/// Frame images inside one per-video folder.
pub fn list_frames(frame_dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    list_children(frame_dir, |e| {
        e.file_type().is_file() && has_extension(e.path(), extension)
    })
}

/// File name without its extension, used to name per-video folders.
pub fn video_stem(video_path: &Path) -> Result<String> {
    video_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid video name: {:?}", video_path))
}

pub fn write_run_summary(results_dir: &Path, summary: &RunSummary) -> Result<PathBuf> {
    let path = results_dir.join(RUN_SUMMARY_FILE);
    let content = serde_json::to_string_pretty(summary)?;
    fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_reset_dir_removes_stale_content() {
        let root = tempdir().unwrap();
        let dir = root.path().join("raw");
        fs::create_dir_all(dir.join("old_video")).unwrap();
        touch(&dir.join("old_video").join("frame-0.jpg"));

        reset_dir(&dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_list_videos_filters_and_sorts() {
        let root = tempdir().unwrap();
        touch(&root.path().join("b.mp4"));
        touch(&root.path().join("a.MP4"));
        touch(&root.path().join("notes.txt"));
        touch(&root.path().join("clip.mp4.part"));
        fs::create_dir(root.path().join("nested.mp4")).unwrap();

        let videos = list_videos(root.path(), "mp4").unwrap();
        let names: Vec<_> = videos
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.MP4", "b.mp4"]);
    }

    #[test]
    fn test_list_videos_missing_dir_is_an_error() {
        let root = tempdir().unwrap();
        assert!(list_videos(&root.path().join("missing"), "mp4").is_err());
    }

    #[test]
    fn test_list_frame_dirs_skips_files() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("clip_b")).unwrap();
        fs::create_dir(root.path().join("clip_a")).unwrap();
        touch(&root.path().join("stray.jpg"));

        let dirs = list_frame_dirs(root.path()).unwrap();
        assert_eq!(
            dirs,
            vec![root.path().join("clip_a"), root.path().join("clip_b")]
        );
    }

    #[test]
    fn test_video_stem_strips_only_the_extension() {
        assert_eq!(video_stem(Path::new("/v/match.mp4.mp4")).unwrap(), "match.mp4");
        assert_eq!(video_stem(Path::new("game_1.mp4")).unwrap(), "game_1");
    }
}
