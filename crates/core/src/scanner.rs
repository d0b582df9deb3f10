use crate::error::IngestError;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Folder names that hold corpus releases: "DataSet 1", "VOL00010",
/// "dataset9-more-complete" and friends.
pub const DEFAULT_FOLDER_PATTERNS: [&str; 3] =
    [r"^DataSet \d+$", r"(?i)^VOL\d+$", r"(?i)^dataset\d+"];

/// Finds source folders under the corpus root and PDF files beneath them.
pub struct CorpusScanner {
    patterns: Vec<Regex>,
}

impl CorpusScanner {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, IngestError> {
        let patterns = patterns
            .iter()
            .map(|pattern| Regex::new(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn with_default_patterns() -> Result<Self, IngestError> {
        Self::new(&DEFAULT_FOLDER_PATTERNS)
    }

    /// Single-level scan of the root's immediate children for directories
    /// matching a folder pattern. An unreadable root is a startup error;
    /// individual unreadable entries are skipped.
    pub fn find_source_folders(&self, root: &Path) -> Result<Vec<PathBuf>, IngestError> {
        let mut folders = Vec::new();

        for entry in fs::read_dir(root)? {
            let Ok(entry) = entry else { continue };
            let Ok(file_type) = entry.file_type() else { continue };
            if !file_type.is_dir() {
                continue;
            }

            let name = entry.file_name();
            let name = name.to_string_lossy();
            if self.patterns.iter().any(|pattern| pattern.is_match(&name)) {
                folders.push(entry.path());
            }
        }

        folders.sort_unstable();
        Ok(folders)
    }

    /// Every PDF at any depth under the folder. The walk is iterative, so
    /// deeply nested corpora cannot overflow the stack, and unreadable
    /// subtrees are skipped rather than aborting the scan.
    pub fn find_pdfs(&self, folder: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in WalkDir::new(folder).into_iter().filter_map(|item| item.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }

            let is_pdf = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

            if is_pdf {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort_unstable();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::CorpusScanner;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn source_folders_match_release_naming() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path();
        for name in ["DataSet 1", "DataSet 12", "VOL00010", "vol3", "dataset9-more-complete"] {
            fs::create_dir(root.join(name))?;
        }
        fs::create_dir(root.join("unrelated"))?;
        fs::create_dir(root.join("DataSetX"))?;
        File::create(root.join("DataSet 7"))?; // file, not a folder

        let scanner = CorpusScanner::with_default_patterns()?;
        let folders = scanner.find_source_folders(root)?;
        let names: Vec<_> = folders
            .iter()
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()))
            .collect();

        assert_eq!(
            names,
            vec!["DataSet 1", "DataSet 12", "VOL00010", "dataset9-more-complete", "vol3"]
        );
        Ok(())
    }

    #[test]
    fn pdf_discovery_is_recursive_and_case_insensitive(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("a").join("b");
        fs::create_dir_all(&nested)?;

        File::create(base.join("top.pdf")).and_then(|mut f| f.write_all(b"%PDF-1.4"))?;
        File::create(nested.join("deep.PDF")).and_then(|mut f| f.write_all(b"%PDF-1.4"))?;
        File::create(base.join("notes.txt"))?;

        let scanner = CorpusScanner::with_default_patterns()?;
        let files = scanner.find_pdfs(base);

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        }));
        Ok(())
    }

    #[test]
    fn unreadable_root_is_an_error() {
        let scanner = CorpusScanner::with_default_patterns().expect("scanner");
        assert!(scanner.find_source_folders(std::path::Path::new("/nonexistent-root")).is_err());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(CorpusScanner::new(&["["]).is_err());
    }
}
