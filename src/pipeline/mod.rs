//! Extraction pipeline.
//!
//! One run walks a fixed sequence of states:
//!
//! `Idle -> CacheResolved -> Filtered -> Enriched -> Sorted -> Exported -> Done`
//!
//! Any stage failure moves the run to `Failed` and aborts it. Nothing is
//! retried, and the output file is only written once the rows are sorted.

pub mod export;

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use hashbrown::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheAction, RegionalCache};
use crate::error::ExtractError;
use crate::models::{BoundingRegion, EnrichedPlace, Query};
use crate::radius::{select_within_radius, PlaceSpatialIndex, RadiusMatch};
use crate::source::PlaceSource;
use crate::taxonomy::{classify, MasterCategory};

/// Number of nearest places kept on the report
pub const REPORT_NEAREST: usize = 10;

/// Stage that produced a transition or a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    ResolveCache,
    Filter,
    Enrich,
    Sort,
    Export,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::ResolveCache => "resolve_cache",
            PipelineStage::Filter => "filter",
            PipelineStage::Enrich => "enrich",
            PipelineStage::Sort => "sort",
            PipelineStage::Export => "export",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    CacheResolved,
    Filtered,
    Enriched,
    Sorted,
    Exported,
    Done,
    Failed { stage: PipelineStage, reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }
}

/// A failure tagged with the stage it came from
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct StageError {
    pub stage: PipelineStage,
    #[source]
    pub error: ExtractError,
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub output_path: PathBuf,
    pub cache_action: CacheAction,
    /// Places held by the regional snapshot the run read from
    pub snapshot_size: usize,
    pub row_count: usize,
    /// Count per master category, largest first
    pub categories: Vec<(MasterCategory, usize)>,
    /// Closest places, nearest first
    pub nearest: Vec<EnrichedPlace>,
}

impl ExtractionReport {
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }
}

/// Runs one query against a cache and a dataset source
pub struct Pipeline<'a, S: PlaceSource> {
    cache: &'a RegionalCache,
    source: &'a S,
    region: &'a BoundingRegion,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl<'a, S: PlaceSource> Pipeline<'a, S> {
    pub fn new(cache: &'a RegionalCache, source: &'a S, region: &'a BoundingRegion) -> Self {
        Self {
            cache,
            source,
            region,
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Every state visited so far, starting with `Idle`
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    fn advance(&mut self, next: PipelineState) {
        debug!("Pipeline {:?} -> {:?}", self.state, next);
        self.state = next.clone();
        self.history.push(next);
    }

    fn fail(&mut self, stage: PipelineStage, error: ExtractError) -> StageError {
        self.advance(PipelineState::Failed {
            stage,
            reason: error.to_string(),
        });
        StageError { stage, error }
    }

    pub async fn run(&mut self, query: &Query) -> Result<ExtractionReport, StageError> {
        if self.state != PipelineState::Idle {
            return Err(StageError {
                stage: PipelineStage::ResolveCache,
                error: ExtractError::InvalidInput("pipeline has already run".to_string()),
            });
        }
        if query.source_ref != self.source.reference() {
            let error = ExtractError::InvalidInput(format!(
                "query source '{}' does not match pipeline source '{}'",
                query.source_ref,
                self.source.reference()
            ));
            return Err(self.fail(PipelineStage::ResolveCache, error));
        }

        // Idle -> CacheResolved
        let (snapshot, cache_action) = match self
            .cache
            .get_regional_subset(self.source, self.region, query.force_reload)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => return Err(self.fail(PipelineStage::ResolveCache, e)),
        };
        let records = match snapshot.records() {
            Ok(records) => records,
            Err(e) => return Err(self.fail(PipelineStage::ResolveCache, e)),
        };
        let snapshot_size = records.len();
        info!(
            "Loaded {} places from cache ({})",
            snapshot_size, cache_action
        );
        self.advance(PipelineState::CacheResolved);

        // CacheResolved -> Filtered
        let index = PlaceSpatialIndex::build(records);
        if index.skipped() > 0 {
            debug!("Skipped {} cached places with invalid coordinates", index.skipped());
        }
        info!(
            "Searching for places within {}km of ({}, {})",
            query.radius_km, query.target.lat, query.target.lon
        );
        let matches = select_within_radius(
            &index,
            query.target.lat,
            query.target.lon,
            query.radius_km,
        );
        self.advance(PipelineState::Filtered);

        // Filtered -> Enriched
        let mut places = enrich(matches);
        self.advance(PipelineState::Enriched);

        // Enriched -> Sorted
        sort_places(&mut places);
        self.advance(PipelineState::Sorted);

        // Sorted -> Exported
        if places.is_empty() {
            warn!(
                "No places found within {}km of ({}, {}); writing header-only export",
                query.radius_km, query.target.lat, query.target.lon
            );
        }
        if let Err(e) = export::write_csv(query.output_path(), &places) {
            return Err(self.fail(PipelineStage::Export, e));
        }
        info!("Saved {} places to {}", places.len(), query.output_path().display());
        self.advance(PipelineState::Exported);

        let report = ExtractionReport {
            output_path: query.output_path().to_path_buf(),
            cache_action,
            snapshot_size,
            row_count: places.len(),
            categories: category_breakdown(&places),
            nearest: places.iter().take(REPORT_NEAREST).cloned().collect(),
        };
        self.advance(PipelineState::Done);
        Ok(report)
    }
}

/// Classify each match and attach its distance
pub fn enrich(matches: Vec<RadiusMatch>) -> Vec<EnrichedPlace> {
    matches
        .into_iter()
        .map(|m| {
            let category = classify(
                m.record.primary_category.as_deref(),
                &m.record.alternate_categories,
            );
            EnrichedPlace::new(m.record, category, m.distance_km)
        })
        .collect()
}

/// Nearest first; equal distances ordered by id
pub fn sort_places(places: &mut [EnrichedPlace]) {
    places.sort_by(|a, b| compare_places(a, b));
}

fn compare_places(a: &EnrichedPlace, b: &EnrichedPlace) -> Ordering {
    a.distance_km
        .total_cmp(&b.distance_km)
        .then_with(|| a.id().cmp(b.id()))
}

/// Count per master category, largest first, ties in taxonomy order
pub fn category_breakdown(places: &[EnrichedPlace]) -> Vec<(MasterCategory, usize)> {
    let mut counts: HashMap<MasterCategory, usize> = HashMap::new();
    for place in places {
        *counts.entry(place.master_category).or_insert(0) += 1;
    }

    let mut breakdown: Vec<(MasterCategory, usize)> = counts.into_iter().collect();
    breakdown.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    breakdown
}
