//! Cursor pagination strategies over the admin log API.
//!
//! Two structurally different endpoint families are driven through one
//! interface: the time-cursor family only understands "everything since T",
//! so ordering and page capping happen client-side; the offset-cursor
//! family returns an opaque `next_offset` token and is trusted for both.
//!
//! A paginator produces a lazy, finite, non-restartable sequence of pages.
//! Per the two-phase checkpoint design, each page carries the new cursor
//! back to the worker — the strategy never touches persistence itself.

use crate::checkpoint::CursorCheckpoint;
use crate::source::{AdminLogSource, LogType, PageQuery};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// One fetched page of records.
///
/// `checkpoint` is the cursor to persist once this page is in flight;
/// `None` when the fetch did not produce a new cursor (offset-cursor
/// responses without a `next_offset`).
#[derive(Clone, Debug)]
pub struct Page {
    pub events: Vec<Value>,
    pub checkpoint: Option<CursorCheckpoint>,
}

/// A lazy, finite sequence of pages. `Ok(None)` signals exhaustion: a fetch
/// returned zero records and the pass is over.
#[async_trait]
pub trait Paginator: Send {
    async fn next_page(&mut self) -> Result<Option<Page>>;
}

/// Which pagination strategy a log type uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaginationKind {
    TimeCursor,
    OffsetCursor,
}

impl LogType {
    pub fn pagination(&self) -> PaginationKind {
        match self {
            LogType::Administration | LogType::Offline => PaginationKind::TimeCursor,
            LogType::Authentication | LogType::Telephony => PaginationKind::OffsetCursor,
        }
    }
}

/// Resolves the strategy for a log type once, at worker pass start.
pub fn build_paginator(
    log_type: LogType,
    source: Arc<dyn AdminLogSource>,
    checkpoint: &CursorCheckpoint,
    limit: usize,
) -> Box<dyn Paginator> {
    match log_type.pagination() {
        PaginationKind::TimeCursor => Box::new(TimeCursorPaginator::new(
            source,
            log_type,
            checkpoint.min_time,
            limit,
        )),
        PaginationKind::OffsetCursor => Box::new(OffsetCursorPaginator::new(
            source,
            log_type,
            checkpoint.min_time,
            checkpoint.next_offset.clone(),
            limit,
        )),
    }
}

/// Strategy for sources with no native pagination.
///
/// Each step fetches everything since the cursor, sorts ascending by the
/// record's intrinsic `timestamp` field, and returns at most `limit`
/// records oldest-first; the overflow is picked up on the next step because
/// the new cursor derives from the returned page, not the full fetch.
///
/// The cursor advances to the last returned timestamp + 1. Records sharing
/// that exact timestamp beyond the page cap can therefore be skipped; the
/// source offers no tie-breaking key to do better.
pub struct TimeCursorPaginator {
    source: Arc<dyn AdminLogSource>,
    log_type: LogType,
    min_time: i64,
    limit: usize,
}

impl TimeCursorPaginator {
    pub fn new(
        source: Arc<dyn AdminLogSource>,
        log_type: LogType,
        min_time: Option<i64>,
        limit: usize,
    ) -> Self {
        Self {
            source,
            log_type,
            min_time: min_time.unwrap_or(0),
            limit,
        }
    }
}

/// Intrinsic timestamp of a record; records without one sort first.
fn event_timestamp(event: &Value) -> i64 {
    event
        .get("timestamp")
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

#[async_trait]
impl Paginator for TimeCursorPaginator {
    async fn next_page(&mut self) -> Result<Option<Page>> {
        let mut events = self
            .source
            .fetch_since(self.log_type, self.min_time)
            .await?;

        events.sort_by_key(event_timestamp);
        events.truncate(self.limit);

        let last = match events.last() {
            Some(event) => event,
            None => return Ok(None),
        };

        self.min_time = event_timestamp(last) + 1;

        Ok(Some(Page {
            events,
            checkpoint: Some(CursorCheckpoint {
                min_time: Some(self.min_time),
                next_offset: None,
            }),
        }))
    }
}

/// Strategy for sources with an opaque `next_offset` token.
///
/// The first step queries by `min_time`; once the source hands back a
/// `next_offset`, subsequent steps resume from it. Ordering and capping are
/// delegated to the source. The sequence ends on the first empty page,
/// whether or not an offset accompanied it.
pub struct OffsetCursorPaginator {
    source: Arc<dyn AdminLogSource>,
    log_type: LogType,
    min_time: Option<i64>,
    next_offset: Option<String>,
    limit: usize,
}

impl OffsetCursorPaginator {
    pub fn new(
        source: Arc<dyn AdminLogSource>,
        log_type: LogType,
        min_time: Option<i64>,
        next_offset: Option<String>,
        limit: usize,
    ) -> Self {
        Self {
            source,
            log_type,
            min_time,
            next_offset,
            limit,
        }
    }
}

#[async_trait]
impl Paginator for OffsetCursorPaginator {
    async fn next_page(&mut self) -> Result<Option<Page>> {
        let query = match &self.next_offset {
            Some(offset) => PageQuery::from_offset(offset.clone(), self.limit),
            None => PageQuery::from_min_time(self.min_time, self.limit),
        };

        let response = self.source.fetch_page(self.log_type, query).await?;

        let mut checkpoint = None;
        if let Some(offset) = response.next_offset {
            self.next_offset = Some(offset.clone());
            checkpoint = Some(CursorCheckpoint {
                min_time: None,
                next_offset: Some(offset),
            });
        }

        if response.items.is_empty() {
            return Ok(None);
        }

        Ok(Some(Page {
            events: response.items,
            checkpoint,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PageResponse;
    use serde_json::json;
    use std::sync::Mutex;

    /// In-memory source: `fetch_since` filters a fixed event list,
    /// `fetch_page` replays scripted responses.
    struct FakeSource {
        events: Mutex<Vec<Value>>,
        pages: Mutex<Vec<PageResponse>>,
        queries: Mutex<Vec<PageQuery>>,
    }

    impl FakeSource {
        fn with_events(timestamps: &[i64]) -> Self {
            let events = timestamps
                .iter()
                .map(|ts| json!({"timestamp": ts, "action": "login"}))
                .collect();
            Self {
                events: Mutex::new(events),
                pages: Mutex::new(Vec::new()),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn with_pages(pages: Vec<PageResponse>) -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                pages: Mutex::new(pages),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AdminLogSource for FakeSource {
        async fn fetch_since(&self, _log_type: LogType, min_time: i64) -> Result<Vec<Value>> {
            let events = self.events.lock().unwrap();
            Ok(events
                .iter()
                .filter(|e| event_timestamp(e) >= min_time)
                .cloned()
                .collect())
        }

        async fn fetch_page(&self, _log_type: LogType, query: PageQuery) -> Result<PageResponse> {
            self.queries.lock().unwrap().push(query);
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(PageResponse {
                    items: vec![],
                    next_offset: None,
                });
            }
            Ok(pages.remove(0))
        }
    }

    #[tokio::test]
    async fn test_time_cursor_sorts_caps_and_advances() {
        // Events arrive out of order; limit 2 keeps the two oldest
        let source = Arc::new(FakeSource::with_events(&[105, 100, 101]));
        let mut paginator =
            TimeCursorPaginator::new(source, LogType::Administration, None, 2);

        let page = paginator.next_page().await.unwrap().unwrap();
        let timestamps: Vec<i64> = page.events.iter().map(event_timestamp).collect();
        assert_eq!(timestamps, vec![100, 101]);
        assert_eq!(
            page.checkpoint,
            Some(CursorCheckpoint {
                min_time: Some(102),
                next_offset: None,
            })
        );

        // Re-fetch from 102 drains the overflow
        let page = paginator.next_page().await.unwrap().unwrap();
        let timestamps: Vec<i64> = page.events.iter().map(event_timestamp).collect();
        assert_eq!(timestamps, vec![105]);
        assert_eq!(page.checkpoint.unwrap().min_time, Some(106));

        // Nothing new: exhaustion
        assert!(paginator.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_time_cursor_resumes_from_checkpoint() {
        let source = Arc::new(FakeSource::with_events(&[100, 101, 105]));
        let mut paginator =
            TimeCursorPaginator::new(source, LogType::Offline, Some(101), 10);

        let page = paginator.next_page().await.unwrap().unwrap();
        let timestamps: Vec<i64> = page.events.iter().map(event_timestamp).collect();
        assert_eq!(timestamps, vec![101, 105]);
    }

    #[tokio::test]
    async fn test_offset_cursor_adopts_offset_and_terminates() {
        let source = Arc::new(FakeSource::with_pages(vec![
            PageResponse {
                items: vec![json!({"timestamp": 1}), json!({"timestamp": 2})],
                next_offset: Some("o1".to_string()),
            },
            // Terminal page: empty items even though a prior offset existed
            PageResponse {
                items: vec![],
                next_offset: None,
            },
        ]));

        let mut paginator = OffsetCursorPaginator::new(
            Arc::clone(&source) as Arc<dyn AdminLogSource>,
            LogType::Authentication,
            Some(1_700_000_000),
            None,
            1000,
        );

        let page = paginator.next_page().await.unwrap().unwrap();
        assert_eq!(page.events.len(), 2);
        assert_eq!(
            page.checkpoint,
            Some(CursorCheckpoint {
                min_time: None,
                next_offset: Some("o1".to_string()),
            })
        );

        assert!(paginator.next_page().await.unwrap().is_none());

        // First query went by min_time, second resumed from the offset
        let queries = source.queries.lock().unwrap();
        assert_eq!(queries[0].min_time, Some(1_700_000_000));
        assert_eq!(queries[1].next_offset.as_deref(), Some("o1"));
    }

    #[tokio::test]
    async fn test_offset_cursor_page_without_offset_has_no_checkpoint() {
        let source = Arc::new(FakeSource::with_pages(vec![PageResponse {
            items: vec![json!({"timestamp": 1})],
            next_offset: None,
        }]));

        let mut paginator =
            OffsetCursorPaginator::new(source, LogType::Telephony, None, None, 1000);

        let page = paginator.next_page().await.unwrap().unwrap();
        assert!(page.checkpoint.is_none());
    }

    #[test]
    fn test_factory_resolves_variant_by_log_type() {
        assert_eq!(
            LogType::Administration.pagination(),
            PaginationKind::TimeCursor
        );
        assert_eq!(LogType::Offline.pagination(), PaginationKind::TimeCursor);
        assert_eq!(
            LogType::Authentication.pagination(),
            PaginationKind::OffsetCursor
        );
        assert_eq!(
            LogType::Telephony.pagination(),
            PaginationKind::OffsetCursor
        );
    }
}
