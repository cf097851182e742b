//! Font discovery and caching.
//!
//! Fonts are located by file name under the configured font directories and
//! the usual system locations. A family matches files whose normalized stem
//! starts with the normalized family name (`"Open Sans"` matches
//! `OpenSans-Bold.ttf`). Directory listings are sorted, so the same machine
//! always picks the same file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fontdue::{Font, FontSettings};
use reel_core::{ReelError, ReelResult};

const MAX_SCAN_DEPTH: usize = 4;

/// Weight at or above which a layer is drawn bold.
pub const BOLD_WEIGHT: u16 = 600;

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/System/Library/Fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("C:\\Windows\\Fonts"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".fonts"));
        dirs.push(home.join(".local/share/fonts"));
    }
    dirs
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone)]
struct FontFile {
    path: PathBuf,
    key: String,
}

/// A font chosen for a family and weight.
#[derive(Clone)]
pub struct ResolvedFont {
    pub font: Arc<Font>,
    /// The face itself is bold, so no synthetic emboldening is needed.
    pub is_bold_face: bool,
}

/// Locates and caches fonts by family name.
pub struct FontBook {
    search_dirs: Vec<PathBuf>,
    default_family: String,
    index: Option<Vec<FontFile>>,
    registered: HashMap<String, Arc<Font>>,
    loaded: HashMap<PathBuf, Arc<Font>>,
}

impl FontBook {
    /// `extra_dirs` are searched before the system font directories.
    pub fn new(extra_dirs: &[PathBuf], default_family: impl Into<String>) -> Self {
        let mut search_dirs = extra_dirs.to_vec();
        search_dirs.extend(system_font_dirs());
        Self {
            search_dirs,
            default_family: default_family.into(),
            index: None,
            registered: HashMap::new(),
            loaded: HashMap::new(),
        }
    }

    /// A font book that only knows explicitly registered fonts.
    pub fn empty() -> Self {
        Self {
            search_dirs: Vec::new(),
            default_family: String::new(),
            index: Some(Vec::new()),
            registered: HashMap::new(),
            loaded: HashMap::new(),
        }
    }

    /// Register a font file under a family name. Registered families win
    /// over discovered files.
    pub fn load_font(&mut self, family: &str, path: &Path) -> ReelResult<()> {
        let font = parse_font(path)?;
        self.registered.insert(normalize(family), Arc::new(font));
        Ok(())
    }

    /// Number of font files found on disk.
    pub fn discovered_count(&mut self) -> usize {
        self.index().len()
    }

    /// Find a font for `family` at `weight`, falling back to the default
    /// family and then to any discovered font.
    pub fn resolve(&mut self, family: &str, weight: u16) -> Option<ResolvedFont> {
        let want_bold = weight >= BOLD_WEIGHT;
        let key = normalize(family);
        if let Some(font) = self.registered.get(&key) {
            return Some(ResolvedFont {
                font: font.clone(),
                is_bold_face: false,
            });
        }

        let default_key = normalize(&self.default_family);
        let picked = {
            let index = self.index();
            pick(index, &key, want_bold)
                .or_else(|| pick(index, &default_key, want_bold))
                .or_else(|| pick(index, "", want_bold))
                .cloned()
        }?;

        let font = match self.loaded.get(&picked.path) {
            Some(f) => f.clone(),
            None => match parse_font(&picked.path) {
                Ok(f) => {
                    let f = Arc::new(f);
                    self.loaded.insert(picked.path.clone(), f.clone());
                    f
                }
                Err(e) => {
                    tracing::warn!("skipping unreadable font: {}", e);
                    if let Some(index) = self.index.as_mut() {
                        index.retain(|f| f.path != picked.path);
                    }
                    return self.resolve(family, weight);
                }
            },
        };
        Some(ResolvedFont {
            font,
            is_bold_face: want_bold && picked.key.contains("bold"),
        })
    }

    fn index(&mut self) -> &Vec<FontFile> {
        let dirs = &self.search_dirs;
        self.index.get_or_insert_with(|| {
            let mut files = Vec::new();
            for dir in dirs {
                scan_dir(dir, 0, &mut files);
            }
            tracing::debug!(count = files.len(), "indexed font files");
            files
        })
    }
}

fn parse_font(path: &Path) -> ReelResult<Font> {
    let data = std::fs::read(path)?;
    Font::from_bytes(data, FontSettings::default())
        .map_err(|e| ReelError::asset(format!("failed to parse font: {}", e), path))
}

fn scan_dir(dir: &Path, depth: usize, out: &mut Vec<FontFile>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            scan_dir(&path, depth + 1, out);
            continue;
        }
        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf"))
            .unwrap_or(false);
        if !is_font {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            out.push(FontFile {
                key: normalize(stem),
                path,
            });
        }
    }
}

/// Best file for a family prefix: upright faces first, then the requested
/// weight, then the shortest name.
fn pick<'a>(files: &'a [FontFile], prefix: &str, want_bold: bool) -> Option<&'a FontFile> {
    files
        .iter()
        .filter(|f| f.key.starts_with(prefix))
        .min_by_key(|f| {
            let slanted = f.key.contains("italic") || f.key.contains("oblique");
            let bold = f.key.contains("bold");
            let weight_miss = if want_bold { !bold } else { bold };
            let not_regular = !want_bold && !f.key.contains("regular");
            (slanted, weight_miss, not_regular, f.key.len(), f.path.clone())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> FontFile {
        FontFile {
            path: PathBuf::from(format!("/fonts/{}", name)),
            key: normalize(name.trim_end_matches(".ttf")),
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Open Sans"), "opensans");
        assert_eq!(normalize("DejaVu-Sans_Bold"), "dejavusansbold");
    }

    #[test]
    fn test_pick_prefers_weight_and_upright() {
        let files = vec![
            file("Inter-BoldItalic.ttf"),
            file("Inter-Bold.ttf"),
            file("Inter-Regular.ttf"),
            file("Inter-Italic.ttf"),
            file("Roboto-Regular.ttf"),
        ];
        assert_eq!(pick(&files, "inter", true).unwrap().key, "interbold");
        assert_eq!(pick(&files, "inter", false).unwrap().key, "interregular");
        assert_eq!(pick(&files, "roboto", true).unwrap().key, "robotoregular");
        assert!(pick(&files, "helvetica", false).is_none());
    }

    #[test]
    fn test_empty_book_resolves_nothing() {
        let mut book = FontBook::empty();
        assert_eq!(book.discovered_count(), 0);
        assert!(book.resolve("Inter", 400).is_none());
    }

    #[test]
    fn test_load_missing_font_fails() {
        let mut book = FontBook::empty();
        assert!(book
            .load_font("Missing", Path::new("/nonexistent/font.ttf"))
            .is_err());
    }
}
