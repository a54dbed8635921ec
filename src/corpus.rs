//! Corpus discovery
//!
//! A speech root holds one directory per speaker; audio files are searched
//! recursively below each speaker directory. A noise root holds audio files
//! directly. All listings are sorted so runs are reproducible.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::engine::io::is_audio_file;
use crate::error::{AugmentError, Result};

/// One speech file and the speaker it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    pub speaker: String,
    pub path: PathBuf,
}

fn require_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(AugmentError::Config {
            reason: format!("{} is not a directory", path.display()),
        })
    }
}

/// Speaker directory names directly under `root`, sorted
pub fn speakers(root: &Path) -> Result<Vec<String>> {
    require_dir(root)?;
    let mut names: Vec<String> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

/// Every speech file under `root`, grouped by speaker in sorted order
pub fn speech_files(root: &Path) -> Result<Vec<CorpusEntry>> {
    let mut entries = Vec::new();
    for speaker in speakers(root)? {
        let mut files: Vec<PathBuf> = WalkDir::new(root.join(&speaker))
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path()))
            .map(|entry| entry.path().to_path_buf())
            .collect();
        files.sort();
        entries.extend(files.into_iter().map(|path| CorpusEntry {
            speaker: speaker.clone(),
            path,
        }));
    }
    Ok(entries)
}

/// Audio files directly inside `root`, sorted; subdirectories are ignored
pub fn noise_files(root: &Path) -> Result<Vec<PathBuf>> {
    require_dir(root)?;
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path()))
        .map(|entry| entry.path().to_path_buf())
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_speech_files_sorted_and_recursive() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("p2/b.wav"));
        touch(&root.join("p1/session/z.FLAC"));
        touch(&root.join("p1/a.mp3"));
        touch(&root.join("p1/notes.txt"));
        touch(&root.join("stray.wav"));

        let entries = speech_files(root).unwrap();
        let listed: Vec<(String, String)> = entries
            .iter()
            .map(|e| {
                let rel = e.path.strip_prefix(root).unwrap();
                (e.speaker.clone(), rel.to_string_lossy().into_owned())
            })
            .collect();
        assert_eq!(
            listed,
            vec![
                ("p1".to_string(), "p1/a.mp3".to_string()),
                ("p1".to_string(), "p1/session/z.FLAC".to_string()),
                ("p2".to_string(), "p2/b.wav".to_string()),
            ]
        );
    }

    #[test]
    fn test_noise_files_ignore_subdirectories() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("rain.wav"));
        touch(&dir.path().join("cafe.mp3"));
        touch(&dir.path().join("nested/wind.wav"));

        let files = noise_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["cafe.mp3", "rain.wav"]);
    }

    #[test]
    fn test_missing_root_is_config_error() {
        let dir = tempdir().unwrap();
        let err = speech_files(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, AugmentError::Config { .. }));
    }
}
