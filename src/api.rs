// src/api.rs

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::runtime::Handle;

use crate::client::Parse;
use crate::ops::fetch::{FetchCompletion, FetchOperation, FetchParams, FetchResult};
use crate::ops::login::{LoginCompletion, LoginKind, LoginOperation, LoginResult};
use crate::query::{CachePolicy, ParseQuery};
use crate::queue::{OperationQueue, TaskHandle};
use crate::social::SocialProvider;

/// Entry point for queued Parse operations.
///
/// Owns the REST client, the operation queue and a default cache
/// policy applied to fetches that do not choose their own. Every call
/// constructs an operation, enqueues it, and returns the task's handle;
/// awaiting the handle is the synchronous mode and blocks only on that
/// task.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use parse_ops::{CachePolicy, FetchParams, Parse, ParseObject, ParseOps, ParseQuery};
/// # use parse_ops::ParseError;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), ParseError> {
/// let client = Arc::new(Parse::new("http://localhost:1338/parse", "appId", None)?);
/// let ops = ParseOps::with_cache_policy(client, CachePolicy::CacheElseNetwork);
///
/// let handle = ops.fetch_objects::<ParseObject>(
///     ParseQuery::new("Monument"),
///     FetchParams { page: 0, ..FetchParams::default() },
///     None,
///     None,
/// );
/// if let Some((error, monuments)) = handle.wait().await {
///     assert!(error.is_none());
///     println!("downloaded {} monuments", monuments.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct ParseOps {
    client: Arc<Parse>,
    queue: OperationQueue,
    cache_policy: CachePolicy,
    social_provider: Option<Arc<dyn SocialProvider>>,
}

impl ParseOps {
    /// Creates a façade with the default cache policy
    /// ([`CachePolicy::IgnoreCache`]). Must be called within a tokio
    /// runtime; the operation queue spawns its dispatcher onto it.
    pub fn new(client: Arc<Parse>) -> Self {
        Self::with_cache_policy(client, CachePolicy::default())
    }

    /// Creates a façade whose fetches default to the given cache policy.
    pub fn with_cache_policy(client: Arc<Parse>, cache_policy: CachePolicy) -> Self {
        Self::with_queue(client, OperationQueue::parse_queue(), cache_policy)
    }

    /// Creates a façade running its operations on the given queue.
    /// Callers sharing one scheduler across several façades, or needing
    /// a different concurrency bound, construct the queue themselves.
    pub fn with_queue(
        client: Arc<Parse>,
        queue: OperationQueue,
        cache_policy: CachePolicy,
    ) -> Self {
        Self {
            client,
            queue,
            cache_policy,
            social_provider: None,
        }
    }

    /// Wires in the social identity provider used by
    /// [`LoginKind::Facebook`] logins.
    pub fn set_social_provider(&mut self, provider: Arc<dyn SocialProvider>) {
        self.social_provider = Some(provider);
    }

    pub fn client(&self) -> &Arc<Parse> {
        &self.client
    }

    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    /// Performs a login against the Parse server.
    ///
    /// The completion callback, when given, is dispatched on `context`
    /// (the worker's runtime when `None`). The returned handle yields
    /// the same `(error, user, extra_info)` triple.
    pub fn login(
        &self,
        kind: LoginKind,
        context: Option<Handle>,
        completion: Option<LoginCompletion>,
    ) -> TaskHandle<LoginResult> {
        let mut operation = LoginOperation::new(kind);
        if let Some(provider) = &self.social_provider {
            operation = operation.with_provider(provider.clone());
        }
        if let Some(completion) = completion {
            operation = operation.on_complete(context, completion);
        }

        let client = self.client.clone();
        self.queue.submit(operation.run(client))
    }

    /// Retrieves objects of a class from the Parse server as a queued
    /// operation.
    ///
    /// `params.page == 0` downloads every matching object through the
    /// paginated plan; `page >= 1` addresses one window. The query's
    /// cache policy is the façade default unless `params.cache_policy`
    /// overrides it. Cancelling the returned handle stops the operation
    /// at its next checkpoint, in which case it reports nothing and
    /// `wait()` yields `None`.
    pub fn fetch_objects<T>(
        &self,
        query: ParseQuery,
        params: FetchParams,
        context: Option<Handle>,
        completion: Option<FetchCompletion<T>>,
    ) -> TaskHandle<FetchResult<T>>
    where
        T: DeserializeOwned + Clone + Send + 'static,
    {
        let mut params = params;
        if params.cache_policy.is_none() {
            params.cache_policy = Some(self.cache_policy);
        }

        let mut operation = FetchOperation::new(query).with_params(params);
        if let Some(completion) = completion {
            operation = operation.on_complete(context, completion);
        }

        let cancellation = operation.cancellation_flag();
        let client = self.client.clone();
        self.queue
            .submit_with_cancellation(operation.run(client), cancellation)
    }
}
