//! Drives one run: bounded fan-out, collection, publish-or-skip

use std::collections::HashSet;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::fetcher::{FetchOutcome, LocationFetcher};
use crate::models::{Location, ResultTable};
use crate::openweather::WeatherProvider;
use crate::sink::OutputSink;
use crate::{AirsheetError, Result};

pub const DEFAULT_CONCURRENCY: usize = 15;
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct FetchOrchestrator<P> {
    fetcher: LocationFetcher<P>,
    sink: Box<dyn OutputSink>,
    concurrency: usize,
    publish: bool,
}

impl<P: WeatherProvider> FetchOrchestrator<P> {
    pub fn new(fetcher: LocationFetcher<P>, sink: Box<dyn OutputSink>) -> Self {
        Self {
            fetcher,
            sink,
            concurrency: DEFAULT_CONCURRENCY,
            publish: true,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn fetcher(&self) -> &LocationFetcher<P> {
        &self.fetcher
    }

    /// Skip the sink and only report what would have been published
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.publish = !dry_run;
        self
    }

    /// Fetch every location and publish the result, stamped with the time
    /// the run started.
    pub async fn run(&self, locations: &[Location]) -> Result<ResultTable> {
        self.run_at(locations, Local::now().naive_local()).await
    }

    #[instrument(skip(self, locations), fields(locations = locations.len()))]
    pub async fn run_at(
        &self,
        locations: &[Location],
        started_at: NaiveDateTime,
    ) -> Result<ResultTable> {
        if locations.is_empty() {
            return Err(AirsheetError::config("Location list is empty"));
        }

        let started = Instant::now();
        let last_updated = started_at.format(TIMESTAMP_FORMAT).to_string();
        let unique = dedup(locations);
        if unique.len() < locations.len() {
            debug!(
                duplicates = locations.len() - unique.len(),
                "Collapsed repeated locations"
            );
        }

        // Each slot takes the next location as soon as it finishes; rows are
        // put back in input order afterwards.
        let last_updated = last_updated.as_str();
        let mut indexed: Vec<(usize, FetchOutcome)> =
            stream::iter(unique.iter().copied().enumerate())
                .map(|(index, location)| async move {
                    (index, self.fetcher.fetch(location, last_updated).await)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        indexed.sort_unstable_by_key(|(index, _)| *index);
        let outcomes: Vec<FetchOutcome> =
            indexed.into_iter().map(|(_, outcome)| outcome).collect();

        let requested = outcomes.len();
        let table = ResultTable::new(
            outcomes
                .into_iter()
                .filter_map(FetchOutcome::into_record)
                .collect(),
        );

        info!(
            requested,
            fetched = table.len(),
            skipped = requested - table.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            key_usage = ?self.fetcher.key_pool().snapshot(),
            "Fetch phase finished"
        );

        if table.is_empty() {
            warn!("No location could be fetched, leaving published data untouched");
            return Ok(table);
        }

        if !self.publish {
            info!(sink = %self.sink.describe(), "Dry run, not publishing");
            return Ok(table);
        }

        self.sink.publish(&table).await?;
        info!(sink = %self.sink.describe(), rows = table.len(), "Snapshot published");
        Ok(table)
    }
}

fn dedup(locations: &[Location]) -> Vec<&Location> {
    let mut seen = HashSet::new();
    locations
        .iter()
        .filter(|location| seen.insert(location.identity()))
        .collect()
}
