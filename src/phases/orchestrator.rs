//! Orchestrator for a complete pipeline run
//!
//! This module coordinates all stages to provide a clean API for one run. The
//! cache is created here, lent to the `!ext` resolver while fragments are
//! loaded, and saved once after substitution has succeeded.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::cache::CacheStore;
use crate::classify::{classify_all, classify_directory, compare_metadata};
use crate::config::Settings;
use crate::document::ConfigDocument;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::fragments::{Fragment, FragmentParser};
use crate::generate::Generator;
use crate::merge::Merger;
use crate::report::ReconciliationReport;
use crate::tags::ExternalResolver;
use crate::template;
use crate::validate::{validate_document, SchemaValidator};

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: ReconciliationReport,
    /// Final document, including the manifest
    pub document: ConfigDocument,
}

/// Runs the pipeline for one repository.
pub struct Orchestrator<'a> {
    repo_root: PathBuf,
    settings: Settings,
    fetcher: &'a dyn Fetcher,
    validator: &'a dyn SchemaValidator,
    seed: Option<ConfigDocument>,
    cache_path: Option<PathBuf>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        settings: Settings,
        fetcher: &'a dyn Fetcher,
        validator: &'a dyn SchemaValidator,
    ) -> Self {
        let repo_root = repo_root.into();
        let cache_path = settings.cache_path_in(&repo_root);
        Self {
            repo_root,
            settings,
            fetcher,
            validator,
            seed: None,
            cache_path,
        }
    }

    /// Merge `seed` before any fragment.
    pub fn with_seed(mut self, seed: ConfigDocument) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Use `path` for the cache instead of the configured one.
    pub fn with_cache_path(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.cache_path = path;
        }
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run every stage with the current time.
    pub fn run(&self) -> Result<RunOutcome> {
        self.run_at(Utc::now())
    }

    /// Run every stage, using `now` for the `now` template variable.
    ///
    /// Nothing is written to the repository; see [`crate::phases::apply`].
    pub fn run_at(&self, now: DateTime<Utc>) -> Result<RunOutcome> {
        let mut cache = CacheStore::load(
            self.cache_path.clone(),
            self.settings.cache.retention_hours.clone(),
        );

        // Load
        let fragments = self.load_fragments(&mut cache)?;

        // Merge
        let mut merger = match &self.seed {
            Some(seed) => Merger::with_seed(seed.clone(), self.settings.merge.policies()),
            None => Merger::new(self.settings.merge.policies()),
        };
        for fragment in &fragments {
            merger.merge_fragment(fragment)?;
        }
        let mut document = merger.finish();
        info!("Merged {} fragment(s)", fragments.len());

        // Validate, substitute, validate
        validate_document(self.validator, &mut document, true, false)?;
        let siblings = self.settings.load_documents(&self.repo_root)?;
        template::substitute(&mut document, &siblings, now)?;
        validate_document(self.validator, &mut document, false, true)?;
        info!("Document resolved and validated");

        if let Err(e) = cache.save() {
            warn!("Failed to save cache: {}", e);
        }

        // Generate
        let generator = Generator::new(&self.repo_root, self.settings.metadata_path.clone());
        let previous = generator.read_previous()?;
        let mut generated = generator.generate(&mut document, previous.as_ref())?;

        // Classify
        classify_all(&mut generated.files, &self.repo_root)?;
        for directory in &mut generated.directories {
            classify_directory(directory, &self.repo_root);
        }
        let metadata = compare_metadata(&document, previous.as_ref());
        let report = ReconciliationReport::new(metadata, generated.files, generated.directories);
        info!("{}", report.summary());

        Ok(RunOutcome { report, document })
    }

    fn load_fragments(&self, cache: &mut CacheStore) -> Result<Vec<Fragment>> {
        let control_dir = self.settings.control_dir_in(&self.repo_root);
        info!("Loading fragments from {}", control_dir.display());
        let mut parser = FragmentParser::new();
        parser.register(Box::new(ExternalResolver::new(self.fetcher, cache)));
        parser.load_dir(&control_dir, &self.settings.hooks_dir)
    }
}
