use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A filename normalization applied to a retailer name.
pub type NameVariant = fn(&str) -> String;

pub fn as_is(name: &str) -> String {
    name.to_string()
}

pub fn without_spaces(name: &str) -> String {
    name.replace(' ', "")
}

pub fn spaces_to_underscores(name: &str) -> String {
    name.replace(' ', "_")
}

pub fn slashes_to_underscores(name: &str) -> String {
    name.replace('/', "_")
}

pub fn spaced_slashes_to_underscores(name: &str) -> String {
    name.replace(" / ", "_")
}

pub fn lowercase(name: &str) -> String {
    name.to_lowercase()
}

pub fn lowercase_without_spaces(name: &str) -> String {
    name.replace(' ', "").to_lowercase()
}

pub fn lowercase_without_slashes_or_spaces(name: &str) -> String {
    name.replace('/', "").replace(' ', "").to_lowercase()
}

/// Tried in order; the first existing file wins.
pub const NAME_VARIANTS: [NameVariant; 8] = [
    as_is,
    without_spaces,
    spaces_to_underscores,
    slashes_to_underscores,
    spaced_slashes_to_underscores,
    lowercase,
    lowercase_without_spaces,
    lowercase_without_slashes_or_spaces,
];

pub fn candidate_filenames(retailer: &str) -> Vec<String> {
    NAME_VARIANTS.iter()
        .map(|variant| format!("{}.png", variant(retailer)))
        .collect()
}

/// Finds retailer logos in a directory of PNG files.
///
/// Each candidate is matched exactly first and then case-insensitively
/// against the directory listing, so lookups behave the same on
/// case-sensitive and case-insensitive filesystems.
pub struct LogoResolver {
    dir: PathBuf,
    width: u32,
    // lowercase filename -> actual filename
    listing: HashMap<String, String>,
}

impl LogoResolver {
    pub fn open(dir: &Path, width: u32) -> Self {
        let mut names: Vec<String> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect(),
            Err(e) => {
                warn!("Logo directory {:?} unavailable: {}", dir, e);
                Vec::new()
            }
        };
        // Deterministic pick when several files differ only in case.
        names.sort();

        let mut listing = HashMap::new();
        for name in names {
            listing.entry(name.to_lowercase()).or_insert(name);
        }

        Self { dir: dir.to_path_buf(), width, listing }
    }

    fn locate(&self, filename: &str) -> Option<PathBuf> {
        // A slash would point outside the directory.
        if filename.contains('/') || filename.contains('\\') {
            return None;
        }
        let exact = self.dir.join(filename);
        if exact.is_file() {
            return Some(exact);
        }
        self.listing
            .get(&filename.to_lowercase())
            .map(|actual| self.dir.join(actual))
    }

    /// Raw bytes of the first matching logo.
    pub fn resolve(&self, retailer: &str) -> Option<Vec<u8>> {
        for filename in candidate_filenames(retailer) {
            let Some(path) = self.locate(&filename) else {
                continue;
            };
            match fs::read(&path) {
                Ok(bytes) => {
                    debug!("Logo for '{}' resolved to {:?}", retailer, path);
                    return Some(bytes);
                }
                Err(e) => {
                    warn!("Failed to read logo {:?}: {}", path, e);
                    return None;
                }
            }
        }
        None
    }

    pub fn resolve_base64(&self, retailer: &str) -> Option<String> {
        self.resolve(retailer).map(|bytes| STANDARD.encode(bytes))
    }

    /// An `<img>` tag with the logo inlined as a data URI.
    pub fn img_tag(&self, retailer: &str) -> Option<String> {
        self.resolve_base64(retailer).map(|data| {
            format!(r#"<img src="data:image/png;base64,{}" width="{}">"#, data, self.width)
        })
    }
}
