use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::datetime::is_valid_date_format;
use crate::error::{DocketError, Result};
use crate::task::{Category, Priority};

pub const DEFAULT_LANGUAGE: &str = "tr";

/// Every user-visible string for one language. Missing keys in a locale
/// file fall back to the English text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub title: String,
    pub add_task: String,
    pub category: String,
    pub priority: String,
    pub date: String,
    pub add: String,
    pub all_categories: String,
    pub all_priorities: String,
    pub search: String,
    pub work: String,
    pub personal: String,
    pub shopping: String,
    pub low: String,
    pub medium: String,
    pub high: String,
    pub total_tasks: String,
    pub completed: String,
    pub pending: String,
    pub change_theme: String,
    pub date_format: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self::english()
    }
}

impl Labels {
    pub fn english() -> Self {
        Self {
            title: "Advanced To-Do List".to_string(),
            add_task: "Add new task".to_string(),
            category: "Select category".to_string(),
            priority: "Priority".to_string(),
            date: "Date".to_string(),
            add: "Add".to_string(),
            all_categories: "All categories".to_string(),
            all_priorities: "All priorities".to_string(),
            search: "Search tasks...".to_string(),
            work: "Work".to_string(),
            personal: "Personal".to_string(),
            shopping: "Shopping".to_string(),
            low: "Low".to_string(),
            medium: "Medium".to_string(),
            high: "High".to_string(),
            total_tasks: "Total Tasks".to_string(),
            completed: "Completed".to_string(),
            pending: "Pending".to_string(),
            change_theme: "Change Theme".to_string(),
            date_format: "%m/%d/%Y".to_string(),
        }
    }

    pub fn turkish() -> Self {
        Self {
            title: "Gelişmiş To-Do List".to_string(),
            add_task: "Yeni görev ekle".to_string(),
            category: "Kategori seç".to_string(),
            priority: "Öncelik".to_string(),
            date: "Tarih".to_string(),
            add: "Ekle".to_string(),
            all_categories: "Tüm kategoriler".to_string(),
            all_priorities: "Tüm öncelikler".to_string(),
            search: "Görev ara...".to_string(),
            work: "İş".to_string(),
            personal: "Kişisel".to_string(),
            shopping: "Alışveriş".to_string(),
            low: "Düşük".to_string(),
            medium: "Orta".to_string(),
            high: "Yüksek".to_string(),
            total_tasks: "Toplam Görev".to_string(),
            completed: "Tamamlanan".to_string(),
            pending: "Bekleyen".to_string(),
            change_theme: "Tema Değiştir".to_string(),
            date_format: "%d.%m.%Y".to_string(),
        }
    }

    pub fn category(&self, category: Category) -> &str {
        match category {
            Category::Work => &self.work,
            Category::Personal => &self.personal,
            Category::Shopping => &self.shopping,
        }
    }

    pub fn priority(&self, priority: Priority) -> &str {
        match priority {
            Priority::Low => &self.low,
            Priority::Medium => &self.medium,
            Priority::High => &self.high,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    languages: BTreeMap<String, Labels>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    pub fn builtin() -> Self {
        let mut languages = BTreeMap::new();
        languages.insert("tr".to_string(), Labels::turkish());
        languages.insert("en".to_string(), Labels::english());
        Self { languages }
    }

    pub fn get(&self, code: &str) -> Option<&Labels> {
        self.languages.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.languages.contains_key(code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(String::as_str)
    }

    pub fn insert(&mut self, code: &str, labels: Labels) {
        self.languages.insert(code.to_string(), labels);
    }

    /// Adds `<code>.toml` files from `dir`, replacing built-in entries with
    /// the same code. Unreadable or malformed files are skipped; a
    /// `date_format` chrono cannot render is replaced by the English one.
    #[instrument(skip(self, dir))]
    pub fn load_dir(&mut self, dir: &Path) -> anyhow::Result<usize> {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "locale directory does not exist; skipping");
            return Ok(0);
        }

        let mut loaded = 0;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
                continue;
            }
            let Some(code) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "failed reading locale file");
                    continue;
                }
            };
            match toml::from_str::<Labels>(&raw) {
                Ok(mut labels) => {
                    if !is_valid_date_format(&labels.date_format) {
                        warn!(
                            file = %path.display(),
                            date_format = %labels.date_format,
                            "unrenderable date_format; using the English pattern"
                        );
                        labels.date_format = Labels::english().date_format;
                    }
                    debug!(code, file = %path.display(), "loaded locale");
                    self.insert(code, labels);
                    loaded += 1;
                }
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "invalid locale file");
                }
            }
        }

        info!(loaded, "locale directory processed");
        Ok(loaded)
    }
}

#[derive(Debug, Clone)]
pub struct Localizer {
    catalog: Catalog,
    current: String,
}

impl Localizer {
    /// Starts in `preferred` when the catalog has it, otherwise in the
    /// default language.
    pub fn new(catalog: Catalog, preferred: Option<&str>) -> Self {
        let current = match preferred {
            Some(code) if catalog.contains(code) => code.to_string(),
            Some(code) => {
                warn!(code, "preferred language unavailable; using default");
                fallback_code(&catalog)
            }
            None => fallback_code(&catalog),
        };
        Self { catalog, current }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn labels(&self) -> &Labels {
        self.catalog
            .get(&self.current)
            .unwrap_or(fallback_labels())
    }

    #[instrument(skip(self))]
    pub fn set_language(&mut self, code: &str) -> Result<()> {
        let code = code.trim();
        if !self.catalog.contains(code) {
            return Err(DocketError::UnknownLanguage(code.to_string()));
        }
        debug!(from = %self.current, to = code, "language changed");
        self.current = code.to_string();
        Ok(())
    }
}

fn fallback_code(catalog: &Catalog) -> String {
    if catalog.contains(DEFAULT_LANGUAGE) {
        DEFAULT_LANGUAGE.to_string()
    } else {
        catalog
            .codes()
            .next()
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_string()
    }
}

fn fallback_labels() -> &'static Labels {
    static ENGLISH: std::sync::OnceLock<Labels> = std::sync::OnceLock::new();
    ENGLISH.get_or_init(Labels::english)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{Catalog, Localizer};
    use crate::error::DocketError;
    use crate::task::Category;

    #[test]
    fn unknown_language_leaves_current_unchanged() {
        let mut localizer = Localizer::new(Catalog::builtin(), Some("en"));
        let err = localizer.set_language("xx").expect_err("xx is unknown");
        assert!(matches!(err, DocketError::UnknownLanguage(code) if code == "xx"));
        assert_eq!(localizer.current(), "en");
        assert_eq!(localizer.labels().title, "Advanced To-Do List");
    }

    #[test]
    fn switching_changes_display_names_only() {
        let mut localizer = Localizer::new(Catalog::builtin(), None);
        assert_eq!(localizer.current(), "tr");
        assert_eq!(localizer.labels().category(Category::Work), "İş");

        localizer.set_language("en").expect("en exists");
        assert_eq!(localizer.labels().category(Category::Work), "Work");
        assert_eq!(Category::Work.as_str(), "work");
    }

    #[test]
    fn locale_files_extend_catalog() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("de.toml"),
            "title = \"Aufgaben\"\nwork = \"Arbeit\"\n",
        )
        .expect("write de");
        fs::write(dir.path().join("broken.toml"), "title = [").expect("write broken");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write txt");

        let mut catalog = Catalog::builtin();
        let loaded = catalog.load_dir(dir.path()).expect("load dir");
        assert_eq!(loaded, 1);

        let de = catalog.get("de").expect("de loaded");
        assert_eq!(de.title, "Aufgaben");
        assert_eq!(de.work, "Arbeit");
        assert_eq!(de.shopping, "Shopping");
        assert!(!catalog.contains("broken"));
    }

    #[test]
    fn unrenderable_date_format_is_replaced() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("de.toml"),
            "title = \"Aufgaben\"\ndate_format = \"%Q\"\n",
        )
        .expect("write de");

        let mut catalog = Catalog::builtin();
        assert_eq!(catalog.load_dir(dir.path()).expect("load dir"), 1);

        let de = catalog.get("de").expect("de loaded");
        assert_eq!(de.title, "Aufgaben");
        assert_eq!(de.date_format, "%m/%d/%Y");
    }
}
