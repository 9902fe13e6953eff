use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    sequences: HashMap<String, String>,
    blueprints: HashMap<String, BlueprintEntry>,
}

/// A blueprint fixture and the sequence library it compiles against.
#[derive(Debug, Deserialize)]
struct BlueprintEntry {
    spec: String,
    library: String,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod sequences {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.sequences.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&MANIFEST.sequences, "sequence library", name)?;
        read_to_string(rel)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let rel = lookup(&MANIFEST.sequences, "sequence library", name)?;
        super::load_json(rel)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = lookup(&MANIFEST.sequences, "sequence library", name)?;
        Ok(resolve_path(rel))
    }
}

pub mod blueprints {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.blueprints.keys().cloned().collect()
    }

    pub fn spec_json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.blueprints, "blueprint", name)?;
        read_to_string(&entry.spec)
    }

    pub fn spec<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&MANIFEST.blueprints, "blueprint", name)?;
        super::load_json(&entry.spec)
    }

    /// Key of the sequence library fixture the blueprint is compiled against.
    pub fn library(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.blueprints, "blueprint", name)?;
        Ok(entry.library.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_manifest_entry_resolves() {
        for key in sequences::keys() {
            assert!(sequences::path(&key).unwrap().exists(), "missing sequences {key}");
        }
        for key in blueprints::keys() {
            blueprints::spec_json(&key).unwrap();
            let library = blueprints::library(&key).unwrap();
            sequences::json(&library).unwrap();
        }
    }

    #[test]
    fn unknown_names_are_errors() {
        assert!(sequences::json("does-not-exist").is_err());
        assert!(blueprints::spec_json("does-not-exist").is_err());
    }
}
