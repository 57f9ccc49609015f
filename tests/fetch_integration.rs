mod op_test_utils;

#[cfg(test)]
mod fetch_tests {
    use super::op_test_utils::shared::*;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use mockito::Matcher;
    use parse_ops::{FetchParams, ObjectError, SortKey};

    fn query_match(pairs: &[(&str, &str)]) -> Matcher {
        Matcher::AllOf(
            pairs
                .iter()
                .map(|(key, value)| Matcher::UrlEncoded(key.to_string(), value.to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn fetch_all_within_one_page_issues_one_fetch_with_limit_count() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_client(&server.url());
        let ops = setup_ops(client);

        let count_mock = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(query_match(&[("limit", "0"), ("count", "1")]))
            .with_body(count_body(42))
            .expect(1)
            .create_async()
            .await;
        let page_mock = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(query_match(&[("limit", "42"), ("skip", "0")]))
            .with_body(monuments_body(0, 42))
            .expect(1)
            .create_async()
            .await;

        let handle = ops.fetch_objects::<Monument>(
            parse_ops::ParseQuery::new("Monument"),
            FetchParams {
                page: 0,
                ..FetchParams::default()
            },
            None,
            None,
        );

        let (error, monuments) = handle.wait().await.expect("operation should report");
        assert!(error.is_none());
        assert_eq!(monuments.len(), 42);

        count_mock.assert_async().await;
        page_mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_all_2500_records_takes_three_ordered_pages() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_client(&server.url());
        let ops = setup_ops(client);

        let count_mock = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(query_match(&[("limit", "0"), ("count", "1")]))
            .with_body(count_body(2500))
            .expect(1)
            .create_async()
            .await;
        let first_page = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(query_match(&[("limit", "1000"), ("skip", "0")]))
            .with_body(monuments_body(0, 1000))
            .expect(1)
            .create_async()
            .await;
        let second_page = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(query_match(&[("limit", "1000"), ("skip", "1000")]))
            .with_body(monuments_body(1000, 1000))
            .expect(1)
            .create_async()
            .await;
        let third_page = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(query_match(&[("limit", "1000"), ("skip", "2000")]))
            .with_body(monuments_body(2000, 500))
            .expect(1)
            .create_async()
            .await;

        let handle = ops.fetch_objects::<Monument>(
            parse_ops::ParseQuery::new("Monument"),
            FetchParams {
                page: 0,
                ..FetchParams::default()
            },
            None,
            None,
        );

        let (error, monuments) = handle.wait().await.expect("operation should report");
        assert!(error.is_none());
        assert_eq!(monuments.len(), 2500);
        // Pages were appended in request order, preserving the sort.
        for (position, monument) in monuments.iter().enumerate() {
            assert_eq!(monument.index, position as i64);
        }

        count_mock.assert_async().await;
        first_page.assert_async().await;
        second_page.assert_async().await;
        third_page.assert_async().await;
    }

    #[tokio::test]
    async fn single_page_mode_applies_skip_and_limit_without_a_count() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_client(&server.url());
        let ops = setup_ops(client);

        let count_mock = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(query_match(&[("count", "1")]))
            .with_body(count_body(0))
            .expect(0)
            .create_async()
            .await;
        let page_mock = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(query_match(&[
                ("limit", "100"),
                ("skip", "100"),
                ("order", "index,-name"),
                ("include", "owner"),
            ]))
            .with_body(monuments_body(100, 100))
            .expect(1)
            .create_async()
            .await;

        let handle = ops.fetch_objects::<Monument>(
            parse_ops::ParseQuery::new("Monument"),
            FetchParams {
                page: 2,
                page_size: 100,
                order_by: vec![SortKey::ascending("index"), SortKey::descending("name")],
                include_keys: vec!["owner".to_string()],
                ..FetchParams::default()
            },
            None,
            None,
        );

        let (error, monuments) = handle.wait().await.expect("operation should report");
        assert!(error.is_none());
        assert_eq!(monuments.len(), 100);
        assert_eq!(monuments[0].index, 100);

        count_mock.assert_async().await;
        page_mock.assert_async().await;
    }

    #[tokio::test]
    async fn failing_page_keeps_accumulated_pages_and_maps_the_error() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_client(&server.url());
        let ops = setup_ops(client);

        let _count_mock = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(query_match(&[("limit", "0"), ("count", "1")]))
            .with_body(count_body(1500))
            .create_async()
            .await;
        let _first_page = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(query_match(&[("limit", "1000"), ("skip", "0")]))
            .with_body(monuments_body(0, 1000))
            .create_async()
            .await;
        let _second_page = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(query_match(&[("limit", "1000"), ("skip", "1000")]))
            .with_status(500)
            .with_body(r#"{"code":1,"error":"internal error"}"#)
            .create_async()
            .await;

        let handle = ops.fetch_objects::<Monument>(
            parse_ops::ParseQuery::new("Monument"),
            FetchParams {
                page: 0,
                ..FetchParams::default()
            },
            None,
            None,
        );

        let (error, monuments) = handle.wait().await.expect("operation should report");
        assert_eq!(error, Some(ObjectError::Unknown));
        assert_eq!(monuments.len(), 1000);
    }

    #[tokio::test]
    async fn completion_callback_receives_the_result() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_client(&server.url());
        let ops = setup_ops(client);

        let _page_mock = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(query_match(&[("limit", "100"), ("skip", "0")]))
            .with_body(monuments_body(0, 3))
            .create_async()
            .await;

        let (sender, receiver) = tokio::sync::oneshot::channel();
        let handle = ops.fetch_objects::<Monument>(
            parse_ops::ParseQuery::new("Monument"),
            FetchParams::default(),
            None,
            Some(Box::new(move |error, monuments| {
                let _ = sender.send((error, monuments));
            })),
        );

        let (error, monuments) = handle.wait().await.expect("operation should report");
        let (callback_error, callback_monuments) =
            receiver.await.expect("callback should be invoked");
        assert!(error.is_none());
        assert!(callback_error.is_none());
        assert_eq!(monuments, callback_monuments);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_calls_back_or_touches_the_network() {
        let mut server = mockito::Server::new_async().await;
        let client = setup_client(&server.url());
        let ops = setup_ops(client);

        let network_mock = server
            .mock("GET", "/parse/classes/Monument")
            .match_query(Matcher::Any)
            .with_body(monuments_body(0, 1))
            .expect(0)
            .create_async()
            .await;

        // Occupy the single worker so the fetch cannot start until released.
        let (release, blocker) = tokio::sync::oneshot::channel::<()>();
        let _blocker_handle = ops.queue().submit(async move {
            let _ = blocker.await;
            Some(())
        });

        let callback_invoked = Arc::new(AtomicBool::new(false));
        let callback_flag = callback_invoked.clone();
        let handle = ops.fetch_objects::<Monument>(
            parse_ops::ParseQuery::new("Monument"),
            FetchParams::default(),
            None,
            Some(Box::new(move |_, _| {
                callback_flag.store(true, Ordering::SeqCst);
            })),
        );

        handle.cancel();
        assert!(handle.is_cancelled());
        let _ = release.send(());

        assert_eq!(handle.wait().await, None);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!callback_invoked.load(Ordering::SeqCst));
        network_mock.assert_async().await;
    }
}
