use crate::config::Config;
use crate::constants::MAX_SLUG_ATTEMPTS;
use crate::error::{MigrateError, Result};
use crate::mapper;
use crate::relocator::Relocator;
use crate::slug::next_slug;
use crate::types::{
    ContentType, DestinationPort, MigrationOutcome, NormalizedItem, SourcePort, SourceRecord,
};
use futures::future::join_all;
use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// What to do when the destination rejects a create because the slug is
/// taken. `Skip` pre-checks and preserves existing data; `Suffix` retries
/// with `-2`, `-3`, ... and knowingly produces duplicate content under a new
/// slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    Skip,
    Suffix,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(ConflictPolicy::Skip),
            "suffix" => Ok(ConflictPolicy::Suffix),
            other => Err(format!("unknown conflict policy: {other} (skip|suffix)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub page_size: u32,
    pub batch_size: usize,
    pub request_delay: Duration,
    pub conflict_policy: ConflictPolicy,
    pub reencode_images: bool,
    /// Optional cap on how many source items to walk, for partial runs.
    pub limit: Option<u64>,
}

impl MigrationOptions {
    pub fn from_config(config: &Config, conflict_policy: ConflictPolicy, reencode: bool) -> Self {
        Self {
            page_size: config.page_size,
            batch_size: config.batch_size.max(1),
            request_delay: Duration::from_millis(config.request_delay_ms),
            conflict_policy,
            reencode_images: reencode,
            limit: None,
        }
    }
}

/// Result of one collection run.
#[derive(Debug, Serialize)]
pub struct MigrationRunResult {
    pub run_id: Uuid,
    pub content_type: ContentType,
    pub total_source_items: u64,
    pub outcomes: Vec<MigrationOutcome>,
}

impl MigrationRunResult {
    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Created { .. }))
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Updated { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&MigrationOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Orchestrates one source collection end to end: paginate, map, relocate
/// images, persist, resolve slug conflicts, record outcomes.
pub struct Migration {
    source: Arc<dyn SourcePort>,
    destination: Arc<dyn DestinationPort>,
    relocator: Arc<Relocator>,
    options: MigrationOptions,
}

impl Migration {
    pub fn new(
        source: Arc<dyn SourcePort>,
        destination: Arc<dyn DestinationPort>,
        relocator: Arc<Relocator>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            source,
            destination,
            relocator,
            options,
        }
    }

    /// Migrate every item of one source collection into the destination.
    #[instrument(skip(self), fields(content_type = %content_type))]
    pub async fn run_collection(
        &self,
        content_type: ContentType,
        collection_id: &str,
    ) -> MigrationRunResult {
        counter!("migrate_runs_total", "collection" => content_type.as_str()).increment(1);
        let t_run = std::time::Instant::now();

        let (outcomes, total) = self
            .walk_collection(content_type, collection_id, |record| async move {
                self.process_item(content_type, &record).await
            })
            .await;
        histogram!("migrate_run_duration_seconds", "collection" => content_type.as_str())
            .record(t_run.elapsed().as_secs_f64());
        self.record_outcome_metrics(content_type, &outcomes);

        info!(
            "Run complete for {}: {} outcomes over {} source items",
            content_type,
            outcomes.len(),
            total
        );
        MigrationRunResult {
            run_id: Uuid::new_v4(),
            content_type,
            total_source_items: total,
            outcomes,
        }
    }

    /// Follow-up pass: re-run image relocation for items that already exist
    /// in the destination and PUT the rewritten data back in place.
    #[instrument(skip(self), fields(content_type = %content_type))]
    pub async fn run_relocation_pass(
        &self,
        content_type: ContentType,
        collection_id: &str,
    ) -> MigrationRunResult {
        counter!("migrate_relocation_passes_total", "collection" => content_type.as_str())
            .increment(1);

        let (outcomes, total) = self
            .walk_collection(content_type, collection_id, |record| async move {
                self.process_relocation(content_type, &record).await
            })
            .await;

        self.record_outcome_metrics(content_type, &outcomes);
        MigrationRunResult {
            run_id: Uuid::new_v4(),
            content_type,
            total_source_items: total,
            outcomes,
        }
    }

    /// Paginate the source collection in strictly increasing offsets, running
    /// `handle` over every record in fixed-size concurrent batches, page by
    /// page. A page fetch failure is recorded as a page-level failed outcome;
    /// later pages are still attempted once the collection total is known.
    async fn walk_collection<F, Fut>(
        &self,
        content_type: ContentType,
        collection_id: &str,
        handle: F,
    ) -> (Vec<MigrationOutcome>, u64)
    where
        F: Fn(SourceRecord) -> Fut,
        Fut: std::future::Future<Output = MigrationOutcome>,
    {
        let mut outcomes = Vec::new();
        let mut offset: u64 = 0;
        let mut total: Option<u64> = None;

        loop {
            if let Some(t) = total {
                if offset >= t {
                    break;
                }
            }
            if let Some(limit) = self.options.limit {
                if offset >= limit {
                    break;
                }
            }

            match self
                .source
                .list_items(collection_id, self.options.page_size, offset)
                .await
            {
                Ok(page) => {
                    total = Some(page.pagination.total);
                    if page.items.is_empty() {
                        break;
                    }
                    offset += page.items.len() as u64;

                    // Items within a page run in source order, in small
                    // concurrent batches; one item's failure never aborts its
                    // siblings.
                    for chunk in page.items.chunks(self.options.batch_size) {
                        let batch = join_all(chunk.iter().cloned().map(&handle)).await;
                        outcomes.extend(batch);
                        sleep(self.options.request_delay).await;
                    }
                }
                Err(e) => {
                    warn!("Page fetch failed at offset {}: {}", offset, e);
                    counter!("migrate_page_errors_total", "collection" => content_type.as_str())
                        .increment(1);
                    outcomes.push(MigrationOutcome::Failed {
                        source_id: format!("page@{offset}"),
                        slug: None,
                        error: format!("SourceFetchError: {e}"),
                    });
                    if total.is_none() {
                        // Total unknown until one page succeeds; without it
                        // the scan has no bound, so end this collection's run.
                        break;
                    }
                    offset += self.options.page_size as u64;
                    sleep(self.options.request_delay).await;
                }
            }
        }

        (outcomes, total.unwrap_or(0))
    }

    async fn process_item(
        &self,
        content_type: ContentType,
        record: &SourceRecord,
    ) -> MigrationOutcome {
        match self.try_process_item(content_type, record).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Item {} failed: {}", record.id, e);
                MigrationOutcome::Failed {
                    source_id: record.id.clone(),
                    slug: None,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn try_process_item(
        &self,
        content_type: ContentType,
        record: &SourceRecord,
    ) -> Result<MigrationOutcome> {
        if record.is_archived {
            return Ok(MigrationOutcome::Skipped {
                source_id: record.id.clone(),
                slug: String::new(),
                reason: "archived in source".to_string(),
            });
        }

        let mut item = mapper::map(record, content_type);
        let image_failures = self.relocate_item_images(&mut item).await;

        match self.options.conflict_policy {
            ConflictPolicy::Skip => {
                if self
                    .destination
                    .find_by_slug(content_type, &item.slug)
                    .await?
                    .is_some()
                {
                    debug!("Slug '{}' already exists, skipping", item.slug);
                    return Ok(MigrationOutcome::Skipped {
                        source_id: record.id.clone(),
                        slug: item.slug,
                        reason: "already exists".to_string(),
                    });
                }
                match self.destination.create_item(&item).await {
                    Ok(created) => Ok(MigrationOutcome::Created {
                        source_id: record.id.clone(),
                        slug: item.slug,
                        new_id: created.id.unwrap_or_default(),
                        image_failures,
                    }),
                    // Lost a race with another writer after the pre-check;
                    // skip mode stays data-preserving.
                    Err(MigrateError::SlugConflict { .. }) => Ok(MigrationOutcome::Skipped {
                        source_id: record.id.clone(),
                        slug: item.slug,
                        reason: "already exists".to_string(),
                    }),
                    Err(e) => Err(e),
                }
            }
            ConflictPolicy::Suffix => {
                let mut attempt = 0;
                loop {
                    match self.destination.create_item(&item).await {
                        Ok(created) => {
                            return Ok(MigrationOutcome::Created {
                                source_id: record.id.clone(),
                                slug: item.slug,
                                new_id: created.id.unwrap_or_default(),
                                image_failures,
                            });
                        }
                        Err(MigrateError::SlugConflict { .. }) => {
                            attempt += 1;
                            if attempt >= MAX_SLUG_ATTEMPTS {
                                return Err(MigrateError::SlugConflict { slug: item.slug });
                            }
                            let suffixed = next_slug(&item.slug, attempt);
                            debug!(
                                "Slug '{}' taken, retrying as '{}' (attempt {})",
                                item.slug, suffixed, attempt
                            );
                            item.slug = suffixed;
                            sleep(self.options.request_delay).await;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }

    async fn process_relocation(
        &self,
        content_type: ContentType,
        record: &SourceRecord,
    ) -> MigrationOutcome {
        match self.try_process_relocation(content_type, record).await {
            Ok(outcome) => outcome,
            Err(e) => MigrationOutcome::Failed {
                source_id: record.id.clone(),
                slug: None,
                error: e.to_string(),
            },
        }
    }

    async fn try_process_relocation(
        &self,
        content_type: ContentType,
        record: &SourceRecord,
    ) -> Result<MigrationOutcome> {
        let mapped = mapper::map(record, content_type);
        let Some(existing) = self
            .destination
            .find_by_slug(content_type, &mapped.slug)
            .await?
        else {
            return Ok(MigrationOutcome::Skipped {
                source_id: record.id.clone(),
                slug: mapped.slug,
                reason: "not present in destination".to_string(),
            });
        };

        let id = existing.id.clone().ok_or_else(|| MigrateError::Api {
            message: format!("destination item '{}' has no id", existing.slug),
        })?;
        let mut item = existing;
        let before = item.data.clone();
        let image_failures = self.relocate_item_images(&mut item).await;

        if item.data == before {
            return Ok(MigrationOutcome::Skipped {
                source_id: record.id.clone(),
                slug: item.slug,
                reason: "no external images".to_string(),
            });
        }

        let updated = self.destination.update_item(&id, &item).await?;
        Ok(MigrationOutcome::Updated {
            source_id: record.id.clone(),
            slug: item.slug,
            id: updated.id.unwrap_or(id),
            image_failures,
        })
    }

    /// Relocate every image field in the item's data, rewriting URLs in
    /// place. Failures keep the original URL and are reported back, never
    /// propagated.
    async fn relocate_item_images(&self, item: &mut NormalizedItem) -> Vec<String> {
        let content_type = item.content_type;
        let slug = item.slug.clone();
        let mut failures = Vec::new();

        for (source_field, data_key) in mapper::image_fields(content_type) {
            let url = item
                .data
                .get(data_key)
                .and_then(|image| image.get("url"))
                .and_then(Value::as_str)
                .map(String::from);
            let Some(url) = url else { continue };

            match self
                .relocator
                .relocate(
                    &url,
                    content_type,
                    &slug,
                    source_field,
                    self.options.reencode_images,
                )
                .await
            {
                Ok(new_url) => {
                    item.data[data_key]["url"] = json!(new_url);
                }
                Err(failure) => {
                    warn!("Image relocation failed for {}: {}", data_key, failure);
                    counter!("migrate_image_failures_total", "collection" => content_type.as_str())
                        .increment(1);
                    failures.push(format!("{data_key}: {failure}"));
                }
            }
        }
        failures
    }

    fn record_outcome_metrics(&self, content_type: ContentType, outcomes: &[MigrationOutcome]) {
        let mut created = 0u64;
        let mut updated = 0u64;
        let mut skipped = 0u64;
        let mut failed = 0u64;
        for outcome in outcomes {
            match outcome {
                MigrationOutcome::Created { .. } => created += 1,
                MigrationOutcome::Updated { .. } => updated += 1,
                MigrationOutcome::Skipped { .. } => skipped += 1,
                MigrationOutcome::Failed { .. } => failed += 1,
            }
        }
        counter!("migrate_items_created_total", "collection" => content_type.as_str())
            .increment(created);
        counter!("migrate_items_updated_total", "collection" => content_type.as_str())
            .increment(updated);
        counter!("migrate_items_skipped_total", "collection" => content_type.as_str())
            .increment(skipped);
        counter!("migrate_items_failed_total", "collection" => content_type.as_str())
            .increment(failed);
    }
}
