//! Startup seeding from local files.

use std::path::Path;

use anyhow::Context;
use stanza_text::scan_dir;
use tracing::{debug, info, warn};

use crate::ingest::{ImportRequest, Synchronizer};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SeedReport {
    pub imported: usize,
    pub failed: usize,
}

/// Import every `.txt` poem under `dir` through the synchronizer.
///
/// A poem that fails to import is logged and counted; only an unreadable
/// directory aborts.
pub fn import_corpus(sync: &Synchronizer, dir: &Path) -> anyhow::Result<SeedReport> {
    let poems =
        scan_dir(dir).with_context(|| format!("failed to scan poems in {}", dir.display()))?;
    let mut report = SeedReport::default();
    for poem in poems {
        let request = ImportRequest {
            content: Some(poem.markup),
            title: Some(poem.title),
            slug: Some(poem.slug),
            category: poem.category,
            ..ImportRequest::default()
        };
        match sync.import(request) {
            Ok(stored) => {
                debug!("seeded {} from {}", stored.slug, poem.path.display());
                report.imported += 1;
            }
            Err(err) => {
                warn!("failed to import {}: {err}", poem.path.display());
                report.failed += 1;
            }
        }
    }
    info!(
        "corpus import from {}: {} imported, {} failed",
        dir.display(),
        report.imported,
        report.failed
    );
    Ok(report)
}
