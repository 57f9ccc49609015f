// src/ops/fetch.rs

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::runtime::Handle;

use crate::client::Parse;
use crate::error::ObjectError;
use crate::query::{ParseQuery, SortKey};
use crate::queue::CancellationFlag;

/// Hard ceiling a Parse server puts on a single page of results.
pub const MAX_PAGE_SIZE: u64 = 1000;

/// Page size applied when the caller does not choose one.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Terminal state of a fetch operation: the mapped error, if any, and
/// the objects accumulated before it occurred.
pub type FetchResult<T> = (Option<ObjectError>, Vec<T>);

/// Completion callback for a fetch operation.
pub type FetchCompletion<T> = Box<dyn FnOnce(Option<ObjectError>, Vec<T>) + Send + 'static>;

/// Paging inputs for a fetch. `page == 0` requests every matching
/// object; any other page addresses a single window of `page_size`.
#[derive(Debug, Clone)]
pub struct FetchParams {
    pub include_keys: Vec<String>,
    pub page_size: u64,
    pub page: u32,
    pub order_by: Vec<SortKey>,
    /// Overrides the façade's default cache policy when set.
    pub cache_policy: Option<crate::query::CachePolicy>,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            include_keys: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            page: 1,
            order_by: Vec::new(),
            cache_policy: None,
        }
    }
}

/// One skip/limit window of a paging plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageWindow {
    pub skip: u64,
    pub limit: u64,
}

/// Computes the windows needed to download `count` objects under the
/// page-size ceiling. A count within one page yields a single window
/// sized exactly to it; larger counts split into `ceil(count / max)`
/// full-size windows, the backend trimming the final short page.
pub(crate) fn page_plan(count: u64, max_page_size: u64) -> Vec<PageWindow> {
    if count <= max_page_size {
        return vec![PageWindow {
            skip: 0,
            limit: count,
        }];
    }
    let number_of_calls = count.div_ceil(max_page_size);
    (0..number_of_calls)
        .map(|call| PageWindow {
            skip: call * max_page_size,
            limit: max_page_size,
        })
        .collect()
}

/// Downloads the objects of a class from a Parse server, stitching
/// paginated responses into one ordered collection.
///
/// The operation checks its cancellation flag before every network
/// round trip; once cancelled it issues no further calls and never
/// invokes its completion callback. On a backend failure mid-plan the
/// pages accumulated so far are kept and returned alongside the mapped
/// error.
pub struct FetchOperation<T> {
    query: ParseQuery,
    page_size: u64,
    page: u32,
    completion: Option<FetchCompletion<T>>,
    completion_context: Option<Handle>,
    cancellation: CancellationFlag,
}

impl<T> FetchOperation<T>
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    pub fn new(query: ParseQuery) -> Self {
        Self {
            query,
            page_size: DEFAULT_PAGE_SIZE,
            page: 1,
            completion: None,
            completion_context: None,
            cancellation: CancellationFlag::new(),
        }
    }

    /// Applies paging, ordering and include-key parameters.
    pub fn with_params(mut self, params: FetchParams) -> Self {
        self.page_size = params.page_size.clamp(1, MAX_PAGE_SIZE);
        self.page = params.page;
        if !params.order_by.is_empty() {
            self.query.order_by(&params.order_by);
        }
        if !params.include_keys.is_empty() {
            let keys: Vec<&str> = params.include_keys.iter().map(String::as_str).collect();
            self.query.include(&keys);
        }
        if let Some(policy) = params.cache_policy {
            self.query.set_cache_policy(policy);
        }
        self
    }

    /// Sets the completion callback and the runtime handle it is
    /// delivered on. With no handle the callback runs on the worker's
    /// runtime.
    pub fn on_complete(mut self, context: Option<Handle>, completion: FetchCompletion<T>) -> Self {
        self.completion = Some(completion);
        self.completion_context = context;
        self
    }

    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Whether the client cache holds a result for the first page
    /// window this operation would request. Fetch-all plans resolve
    /// their windows only after the count round trip, so for those this
    /// reflects the full-size first window.
    pub fn has_cached_result(&self, client: &Parse) -> bool {
        client.has_cached_result(&self.first_window_query())
    }

    fn first_window_query(&self) -> ParseQuery {
        let mut query = self.query.clone();
        match self.page {
            0 => query.skip(0).limit(MAX_PAGE_SIZE),
            page => query
                .skip(self.page_size * (u64::from(page) - 1))
                .limit(self.page_size),
        };
        query
    }

    /// Executes the fetch. Returns `None` when cancelled; the caller
    /// (the operation queue) then reports nothing.
    pub(crate) async fn run(mut self, client: Arc<Parse>) -> Option<FetchResult<T>> {
        if self.cancellation.is_cancelled() {
            return None;
        }

        let (error, objects) = if self.page == 0 {
            self.fetch_all(&client).await?
        } else {
            self.fetch_single_page(&client).await?
        };

        // Cancellation may have landed during the final round trip.
        if self.cancellation.is_cancelled() {
            return None;
        }

        log::info!(
            "Fetch operation for class {} finished with {} objects",
            self.query.class_name(),
            objects.len()
        );

        if let Some(completion) = self.completion.take() {
            let context = self
                .completion_context
                .clone()
                .unwrap_or_else(Handle::current);
            let callback_objects = objects.clone();
            context.spawn(async move { completion(error, callback_objects) });
        }

        Some((error, objects))
    }

    /// Fetch-all mode: a count round trip sizes the paging plan, then
    /// the windows are fetched sequentially in increasing skip order so
    /// the accumulated collection preserves the backend's sort order.
    async fn fetch_all(&mut self, client: &Parse) -> Option<FetchResult<T>> {
        let count = match client.count(&self.query).await {
            Ok(count) => count,
            Err(error) => return Some((Some(ObjectError::from_parse(&error)), Vec::new())),
        };

        let mut accumulated: Vec<T> = Vec::new();
        for window in page_plan(count, MAX_PAGE_SIZE) {
            if self.cancellation.is_cancelled() {
                return None;
            }
            let mut window_query = self.query.clone();
            window_query.skip(window.skip).limit(window.limit);
            match client.find::<T>(&window_query).await {
                Ok(mut page) => accumulated.append(&mut page),
                Err(error) => {
                    return Some((Some(ObjectError::from_parse(&error)), accumulated));
                }
            }
        }
        Some((None, accumulated))
    }

    /// Single-page mode: one fetch at `skip = page_size * (page - 1)`.
    async fn fetch_single_page(&mut self, client: &Parse) -> Option<FetchResult<T>> {
        let skip = self.page_size * (u64::from(self.page) - 1);
        self.query.skip(skip).limit(self.page_size);

        if self.cancellation.is_cancelled() {
            return None;
        }
        match client.find::<T>(&self.query).await {
            Ok(objects) => Some((None, objects)),
            Err(error) => Some((Some(ObjectError::from_parse(&error)), Vec::new())),
        }
    }
}
