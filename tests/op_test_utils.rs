// Shared helpers for the operation integration tests.

pub mod shared {
    use std::sync::Arc;

    use serde::Deserialize;
    use serde_json::{json, Value};

    use parse_ops::{OperationQueue, Parse, ParseOps};

    /// Object type used by the fetch tests.
    #[derive(Debug, Clone, PartialEq, Deserialize)]
    pub struct Monument {
        #[serde(rename = "objectId")]
        pub object_id: String,
        pub name: Option<String>,
        pub index: i64,
    }

    pub fn setup_client(server_url: &str) -> Arc<Parse> {
        let _ = env_logger::builder().is_test(true).try_init();
        Arc::new(Parse::new(server_url, "testAppId", Some("testClientKey")).expect("client"))
    }

    /// Façade on a single-worker queue so tests can control scheduling.
    pub fn setup_ops(client: Arc<Parse>) -> ParseOps {
        ParseOps::with_queue(
            client,
            OperationQueue::new("TestOperationsQueue", 1),
            Default::default(),
        )
    }

    /// A `results` body of `count` monuments indexed from `start`.
    pub fn monuments_body(start: i64, count: i64) -> String {
        let results: Vec<Value> = (start..start + count)
            .map(|index| {
                json!({
                    "objectId": format!("mon-{}", index),
                    "name": format!("Monument {}", index),
                    "index": index,
                })
            })
            .collect();
        json!({ "results": results }).to_string()
    }

    pub fn count_body(count: u64) -> String {
        json!({ "results": [], "count": count }).to_string()
    }
}
