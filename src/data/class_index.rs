use std::collections::HashMap;
use std::path::Path;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use crate::error::Result;

/// File written at the dataset root mapping id → class name.
pub const CLASS_INDICES_FILE: &str = "class_indices.json";

/// Bidirectional mapping between class-directory names and dense ids.
///
/// Ids follow the lexicographic order of the names, so rebuilding from the
/// same directory listing always yields the same ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIndex {
    names: Vec<String>,
    ids: HashMap<String, usize>,
}

impl ClassIndex {
    pub fn from_names<I, S>(names: I) -> ClassIndex
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        let ids = names.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect();
        ClassIndex { names, ids }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Writes `{"0": "cat", "1": "dog", ...}` with 4-space indentation.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(writer, formatter);
        self.serialize(&mut ser)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<ClassIndex> {
        let file = std::fs::File::open(path)?;
        let raw: HashMap<String, String> = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(ClassIndex::from_names(raw.into_values()))
    }
}

impl Serialize for ClassIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.names.len()))?;
        for (id, name) in self.names.iter().enumerate() {
            map.serialize_entry(&id.to_string(), name)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ClassIndex {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw: HashMap<String, String> = HashMap::deserialize(deserializer)?;
        Ok(ClassIndex::from_names(raw.into_values()))
    }
}
