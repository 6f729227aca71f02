//! # Languages
//!
//! The language table maps short language codes to their display names and
//! the source extensions that identify them, and [`detect_language`] guesses
//! which of them an upload is written in.
//!
//! Declaration order in the table is significant: it breaks ties during
//! detection and the first entry is the default language.

use crate::classify::has_extension;
use crate::common::UploadedEntry;
use crate::context::ExtractionContext;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Opaque key into the [`LanguageTable`], e.g. `"PY"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageId(String);

impl LanguageId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageId {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// One row of the language table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSpec {
    pub code: LanguageId,
    pub display_name: String,
    /// Name the similarity service uses for this language.
    pub moss_name: String,
    /// Source suffixes without the leading dot. Case-sensitive.
    pub extensions: Vec<String>,
}

impl LanguageSpec {
    fn new(code: &str, display_name: &str, moss_name: &str, extensions: &[&str]) -> Self {
        Self {
            code: LanguageId::new(code),
            display_name: display_name.to_string(),
            moss_name: moss_name.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Ordered, read-only table of supported languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTable(Vec<LanguageSpec>);

impl LanguageTable {
    pub fn new(languages: Vec<LanguageSpec>) -> Self {
        Self(languages)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LanguageSpec> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &LanguageId) -> Option<&LanguageSpec> {
        self.0.iter().find(|l| &l.code == id)
    }

    pub fn contains(&self, id: &LanguageId) -> bool {
        self.get(id).is_some()
    }

    /// The first-declared language.
    pub fn first(&self) -> Option<&LanguageId> {
        self.0.first().map(|l| &l.code)
    }

    /// Extensions of one language, or an empty slice for an unknown id.
    pub fn extensions(&self, id: &LanguageId) -> &[String] {
        self.get(id).map(|l| l.extensions.as_slice()).unwrap_or(&[])
    }

    /// Whether `name` carries a source extension of any language.
    pub fn matches_any(&self, name: &str) -> bool {
        self.0.iter().any(|l| has_extension(name, &l.extensions))
    }
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self(vec![
            LanguageSpec::new("PY", "Python", "python", &["py"]),
            LanguageSpec::new("JA", "Java", "java", &["java"]),
            LanguageSpec::new(
                "CP",
                "C++",
                "cc",
                &["C", "cc", "cpp", "cxx", "c++", "h", "H", "hh", "hpp", "hxx", "h++"],
            ),
            LanguageSpec::new("CX", "C", "c", &["c", "h"]),
            LanguageSpec::new("CS", "C#", "csharp", &["cs", "csx"]),
            LanguageSpec::new("JS", "Javascript", "javascript", &["js"]),
            LanguageSpec::new("PL", "Perl", "perl", &["pl", "plx", "pm", "xs", "t", "pod"]),
            LanguageSpec::new("MP", "MIPS assembly", "mips", &["asm", "s"]),
        ])
    }
}

/// Tallies, per language, how many sample names carry one of its extensions
/// and returns the best-scoring language.
///
/// A name may count for several languages (`.h` is both C and C++). Ties go
/// to the first-declared language. When nothing matches, `fallback` is
/// returned.
pub fn detect_language<'a, I>(names: I, table: &LanguageTable, fallback: &LanguageId) -> LanguageId
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tallies = vec![0usize; table.len()];
    for name in names {
        for (i, language) in table.iter().enumerate() {
            if has_extension(name, &language.extensions) {
                tallies[i] += 1;
            }
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for (i, &tally) in tallies.iter().enumerate() {
        if tally == 0 {
            continue;
        }
        match best {
            Some((_, top)) if tally <= top => {}
            _ => best = Some((i, tally)),
        }
    }

    match best.and_then(|(i, _)| table.iter().nth(i)) {
        Some(language) => {
            debug!(language = %language.code, ?tallies, "language detected");
            language.code.clone()
        }
        None => fallback.clone(),
    }
}

/// Detection over an upload: the top-level names plus the contents of the
/// first few archives (bounded by `detection_archive_sample`).
///
/// Archives that fail to unpack are left out of the sample.
pub async fn detect_language_deep(
    entries: &[UploadedEntry],
    ctx: &ExtractionContext,
) -> Result<LanguageId> {
    let config = ctx.config();
    let mut names: Vec<String> = entries.iter().map(|e| e.path().to_string()).collect();

    let archives = entries
        .iter()
        .filter(|e| config.is_archive(e.path()))
        .take(config.detection_archive_sample);
    for archive in archives {
        ctx.check_cancelled()?;
        match ctx.codec().extract_files(archive).await {
            Ok(contents) => names.extend(contents.iter().map(|e| e.path().to_string())),
            Err(e) => {
                warn!(archive = archive.path(), error = %e, "skipping archive in language sample")
            }
        }
    }

    let fallback = config.default_language()?;
    Ok(detect_language(names.iter().map(String::as_str), &config.languages, &fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn py() -> LanguageId {
        LanguageId::new("PY")
    }

    #[test]
    fn python_majority_wins() {
        let table = LanguageTable::default();
        let names = ["a.py", "b.py", "c.py", "Main.java"];
        assert_eq!(detect_language(names, &table, &py()), LanguageId::new("PY"));
    }

    #[test]
    fn overlapping_extension_tie_goes_to_first_declared() {
        let table = LanguageTable::default();
        // `.h` counts for both C++ and C; C++ is declared first.
        assert_eq!(detect_language(["defs.h"], &table, &py()), LanguageId::new("CP"));
        // `.c` tips it towards C.
        assert_eq!(detect_language(["defs.h", "main.c"], &table, &py()), LanguageId::new("CX"));
    }

    #[test]
    fn equal_tallies_pick_table_order() {
        let table = LanguageTable::default();
        let names = ["Main.java", "app.js", "util.py"];
        assert_eq!(detect_language(names, &table, &LanguageId::new("JS")), LanguageId::new("PY"));
    }

    #[test]
    fn empty_sample_returns_fallback() {
        let table = LanguageTable::default();
        let fallback = LanguageId::new("JA");
        assert_eq!(detect_language(Vec::<&str>::new(), &table, &fallback), fallback);
        assert_eq!(detect_language(["README.md"], &table, &fallback), fallback);
    }

    #[test]
    fn extensions_are_case_sensitive() {
        let table = LanguageTable::default();
        assert_eq!(detect_language(["main.C"], &table, &py()), LanguageId::new("CP"));
        assert_eq!(detect_language(["main.PY"], &table, &py()), py());
    }

    #[test]
    fn table_lookups() {
        let table = LanguageTable::default();
        assert_eq!(table.first(), Some(&LanguageId::new("PY")));
        assert_eq!(table.extensions(&LanguageId::new("CS")), ["cs", "csx"]);
        assert!(table.extensions(&LanguageId::new("XX")).is_empty());
        assert!(table.matches_any("lib.pm"));
        assert!(!table.matches_any("notes.txt"));
    }

    #[test]
    fn table_round_trips_through_json() {
        let table = LanguageTable::default();
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.starts_with("[{\"code\":\"PY\""));
        let back: LanguageTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
