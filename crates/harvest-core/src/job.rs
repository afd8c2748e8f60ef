//! Crawl jobs
//!
//! Drives one site end to end: frontier discovery, per-root traversal,
//! detail extraction and persistence. Everything runs strictly in sequence on
//! the single tab behind the [`RenderEngine`].
//!
//! Failure policy: a landing page that cannot be loaded aborts the job; a
//! listing page failure or pagination violation abandons that root only; a
//! detail page failure is logged and the item skipped. Filesystem errors are
//! always fatal.

use crate::config::{BookProfile, CatalogProfile};
use crate::extract::{DetailQuery, FrontierQuery, ListingQuery, SectionQuery};
use crate::ledger::{Ledger, LedgerEntry};
use crate::render::RenderEngine;
use crate::sanitize::{item_filename, title_filename};
use crate::store::{OutputStore, OutputUnit};
use crate::walker::{listing_start_url, Paginator};
use crate::{ExtractedContent, HarvestError, HierarchyRoot, Item, Result, Section};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Counters and failures collected over one job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Hierarchy roots visited
    pub roots: usize,
    /// Listing pages fetched
    pub pages: usize,
    /// Units written this run
    pub written: usize,
    /// Units written empty because the content container was missing
    pub empty: usize,
    /// Units skipped because the ledger marks them complete
    pub resumed: usize,
    /// Items or roots skipped for lacking a label or URL
    pub skipped: usize,
    /// Detail pages that failed, as `url: error`
    pub failed_items: Vec<String>,
    /// Roots abandoned part-way, as `label: error`
    pub failed_roots: Vec<String>,
}

impl RunReport {
    /// Fold another job's report into this one
    pub fn merge(&mut self, other: RunReport) {
        self.roots += other.roots;
        self.pages += other.pages;
        self.written += other.written;
        self.empty += other.empty;
        self.resumed += other.resumed;
        self.skipped += other.skipped;
        self.failed_items.extend(other.failed_items);
        self.failed_roots.extend(other.failed_roots);
    }

    /// True when nothing failed
    pub fn is_clean(&self) -> bool {
        self.failed_items.is_empty() && self.failed_roots.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} roots, {} pages, {} written ({} empty), {} resumed, {} skipped, {} failed items, {} failed roots",
            self.roots,
            self.pages,
            self.written,
            self.empty,
            self.resumed,
            self.skipped,
            self.failed_items.len(),
            self.failed_roots.len()
        )
    }
}

/// Output tree plus completion ledger for one job
#[derive(Debug)]
pub struct JobOutput {
    store: OutputStore,
    ledger: Ledger,
}

impl JobOutput {
    /// Open the output under `root`. With `resume` off the ledger is discarded first.
    pub fn open(root: &Path, budget: usize, resume: bool) -> Result<Self> {
        if !resume {
            Ledger::reset(root)?;
        }
        Ok(Self {
            store: OutputStore::new(root, budget),
            ledger: Ledger::open(root)?,
        })
    }

    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// If `url` already completed in `directory`, keep its filename reserved and return it
    fn resume(&mut self, directory: &str, url: &Url) -> Option<String> {
        let done = self.ledger.lookup(directory, url.as_str())?.to_string();
        self.store.registry(directory).reserve(&done);
        Some(done)
    }

    /// Write `content` for `unit` and record it as complete
    fn persist(
        &mut self,
        unit: &OutputUnit,
        url: &Url,
        content: &ExtractedContent,
        report: &mut RunReport,
    ) -> Result<()> {
        let path = self.store.write(unit, content.text())?;
        self.ledger.record(LedgerEntry {
            directory: unit.directory.clone(),
            filename: unit.filename.clone(),
            url: url.to_string(),
        })?;

        report.written += 1;
        if content.is_absent() {
            warn!("No content container at {}, wrote empty {:?}", url, path);
            report.empty += 1;
        } else {
            debug!("Wrote {:?}", path);
        }
        Ok(())
    }
}

/// Filesystem and ledger failures stop the whole job
fn is_fatal(err: &HarvestError) -> bool {
    matches!(err, HarvestError::IoError(_) | HarvestError::JsonError(_))
}

/// Load the landing page and list its hierarchy roots.
///
/// A wait selector that never appears is treated as a missing container:
/// the result is empty and the job simply produces nothing.
pub async fn discover_frontier<E: RenderEngine>(
    engine: &mut E,
    landing: &Url,
    wait: Option<&str>,
    timeout: Duration,
    query: &FrontierQuery,
) -> Result<Vec<HierarchyRoot>> {
    info!("Discovering frontier at {}", landing);
    engine.navigate(landing).await?;

    if let Some(selector) = wait {
        match engine.wait_for_selector(selector, timeout).await {
            Ok(()) => {}
            Err(HarvestError::Timeout { selector, waited }) => {
                warn!(
                    "Frontier container `{}` did not appear within {:?}; nothing to crawl",
                    selector, waited
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        }
    }

    let roots = engine.evaluate(query).await?;
    if roots.is_empty() {
        warn!("No hierarchy roots found at {}", landing);
    } else {
        info!("Found {} hierarchy roots", roots.len());
    }
    Ok(roots)
}

/// Load a detail page and flatten its content container
pub async fn extract_detail<E: RenderEngine>(
    engine: &mut E,
    url: &Url,
    query: &DetailQuery,
) -> Result<ExtractedContent> {
    engine.navigate(url).await?;
    engine.evaluate(query).await
}

/// Load a book section page, wait for its body and render it
pub async fn extract_section<E: RenderEngine>(
    engine: &mut E,
    url: &Url,
    wait: Option<&str>,
    timeout: Duration,
    query: &SectionQuery,
) -> Result<Section> {
    engine.navigate(url).await?;
    if let Some(selector) = wait {
        if let Err(e) = engine.wait_for_selector(selector, timeout).await {
            match e {
                HarvestError::Timeout { .. } => warn!("{} on {}", e, url),
                other => return Err(other),
            }
        }
    }
    engine.evaluate(query).await
}

/// Crawl the drug-class catalog into `output`
pub async fn run_catalog<E: RenderEngine>(
    engine: &mut E,
    profile: &CatalogProfile,
    output: &mut JobOutput,
) -> Result<RunReport> {
    let frontier = FrontierQuery::new(&profile.frontier_selector)?;
    let listing = ListingQuery::new(
        &profile.item_selector,
        &profile.label_selector,
        &profile.key_selector,
        &profile.next_selector,
    )?;
    let detail = DetailQuery::new(&profile.content_selector, &profile.preview_selector)?;
    let landing = Url::parse(&profile.landing_url)?;

    let roots = discover_frontier(
        engine,
        &landing,
        profile.frontier_wait.as_deref(),
        profile.wait_timeout(),
        &frontier,
    )
    .await?;

    let mut report = RunReport::default();
    for root in &roots {
        report.roots += 1;
        let directory = output.store.directory_for(&root.label);
        if directory.is_empty() {
            warn!("Category {:?} has no usable directory name, skipping", root.label);
            report.skipped += 1;
            continue;
        }

        info!("Category {:?} -> {}/", root.label, directory);
        let start = listing_start_url(&root.entry_url, profile.page_size);
        let mut walker = Paginator::new(start, profile.max_pages);

        loop {
            let items = match walker.next_page(engine, &listing).await {
                Ok(Some(items)) => items,
                Ok(None) => break,
                Err(e) => {
                    warn!("Abandoning category {:?}: {}", root.label, e);
                    report.failed_roots.push(format!("{}: {}", root.label, e));
                    break;
                }
            };
            report.pages += 1;

            for item in &items {
                catalog_item(engine, &detail, output, &directory, item, &mut report).await?;
            }
        }
    }

    info!("Catalog done: {}", report);
    Ok(report)
}

async fn catalog_item<E: RenderEngine>(
    engine: &mut E,
    detail: &DetailQuery,
    output: &mut JobOutput,
    directory: &str,
    item: &Item,
    report: &mut RunReport,
) -> Result<()> {
    let Some(candidate) =
        item_filename(&item.display_label, &item.secondary_key, output.store.budget())
    else {
        debug!("Skipping item without a usable label: {:?}", item.display_label);
        report.skipped += 1;
        return Ok(());
    };
    let Some(url) = item.detail_url.as_ref() else {
        warn!("Item {:?} has no detail link, skipping", item.display_label);
        report.skipped += 1;
        return Ok(());
    };

    if let Some(done) = output.resume(directory, url) {
        debug!("Already have {}/{}", directory, done);
        report.resumed += 1;
        return Ok(());
    }

    let unit = output.store.allocate(directory, &candidate);

    match extract_detail(engine, url, detail).await {
        Ok(content) => output.persist(&unit, url, &content, report),
        Err(e) if is_fatal(&e) => Err(e),
        Err(e) => {
            warn!("Failed to extract {} ({}): {}", item.display_label, url, e);
            report.failed_items.push(format!("{}: {}", url, e));
            Ok(())
        }
    }
}

/// Crawl the book's table of contents into `output`
pub async fn run_book<E: RenderEngine>(
    engine: &mut E,
    profile: &BookProfile,
    output: &mut JobOutput,
) -> Result<RunReport> {
    let frontier = FrontierQuery::new(&profile.frontier_selector)?;
    let section = SectionQuery::new(
        &profile.title_selector,
        &profile.body_selector,
        &profile.section_selector,
    )?;
    let landing = Url::parse(&profile.landing_url)?;

    let roots = discover_frontier(
        engine,
        &landing,
        profile.frontier_wait.as_deref(),
        profile.wait_timeout(),
        &frontier,
    )
    .await?;

    let mut report = RunReport::default();
    for root in &roots {
        report.roots += 1;
        let directory = output.store.directory_for(&root.label);
        if directory.is_empty() {
            warn!("Entry {:?} has no usable directory name, skipping", root.label);
            report.skipped += 1;
            continue;
        }

        if let Some(done) = output.resume(&directory, &root.entry_url) {
            debug!("Already have {}/{}", directory, done);
            report.resumed += 1;
            continue;
        }

        let extracted = extract_section(
            engine,
            &root.entry_url,
            profile.content_wait.as_deref(),
            profile.wait_timeout(),
            &section,
        )
        .await;

        match extracted {
            Ok(page) => {
                let budget = output.store.budget();
                let candidate = page
                    .title
                    .as_deref()
                    .and_then(|title| title_filename(title, budget))
                    .or_else(|| title_filename(&root.label, budget));
                let Some(candidate) = candidate else {
                    warn!("Entry {:?} has no usable filename, skipping", root.label);
                    report.skipped += 1;
                    continue;
                };
                let unit = output.store.allocate(&directory, &candidate);
                info!("{:?} -> {}/{}", root.label, unit.directory, unit.filename);
                output.persist(&unit, &root.entry_url, &page.content, &mut report)?;
            }
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => {
                warn!("Failed to extract {} ({}): {}", root.label, root.entry_url, e);
                report
                    .failed_items
                    .push(format!("{}: {}", root.entry_url, e));
            }
        }
    }

    info!("Book done: {}", report);
    Ok(report)
}
