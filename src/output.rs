use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

/// File name stamp for one run, e.g. `20250131_142501`.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Pretty-print `data` as JSON to `dir/name`, creating `dir` if needed.
pub fn save_json<T: Serialize + ?Sized>(dir: &Path, name: &str, data: &T) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(data)?;
    save_text(dir, name, &json)
}

pub fn save_text(dir: &Path, name: &str, text: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(name);
    std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Saved {}", path.display());
    Ok(path)
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("No data at {}; run 'categorize' first", path.display()))?;
    let data = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    info!("Loaded {}", path.display());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::tree::GENERAL;
    use crate::categorize::{CategoryTree, Categorizer};
    use crate::categorize::patterns::PatternSet;
    use crate::post::Post;

    #[test]
    fn tree_survives_disk_with_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let posts = vec![
            Post { title: "hw9".into(), ..Post::default() },
            Post { title: "hw2".into(), ..Post::default() },
        ];
        let tree = Categorizer::new(PatternSet::default()).categorize(&posts);

        let path = save_json(&dir.path().join("raw"), "categorized.json", &tree).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.find("pset9").unwrap() < text.find("pset2").unwrap());

        let back: CategoryTree = load_json(&path).unwrap();
        assert_eq!(back, tree);
        assert_eq!(back.get("pset2", GENERAL).unwrap()[0].title, "hw2");
    }

    #[test]
    fn missing_file_mentions_path() {
        let err = load_json::<CategoryTree>(Path::new("/nonexistent/x.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/x.json"));
    }

    #[test]
    fn timestamp_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), 15);
        assert_eq!(&ts[8..9], "_");
    }
}
