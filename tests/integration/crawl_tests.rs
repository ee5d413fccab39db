//! Scheduler driven against a mock server with the reqwest transport

use reqwest::Method;
use ripple_crawl::config::{parse_config, Config};
use ripple_crawl::crawler::{Callback, Fetched, JobOptions, Params, ReqwestTransport, Scheduler, Submitter};
use ripple_crawl::document::{content, value};
use ripple_crawl::{ContentKind, CrawlError, FetchError};
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with the given limits and the monitor switched off
fn create_test_config(concurrency: usize, tries: u32) -> Config {
    parse_config(&format!(
        r#"
        [scheduler]
        concurrency = {}
        tries = {}

        [transport]
        timeout-ms = 5000

        [monitor]
        enabled = false
        "#,
        concurrency, tries
    ))
    .expect("Failed to parse test config")
}

fn scheduler(config: &Config) -> Scheduler<ReqwestTransport> {
    let transport = ReqwestTransport::new(config.transport.clone()).expect("Failed to build transport");
    Scheduler::new(config, transport)
}

async fn mount_html(mock_server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(mock_server)
        .await;
}

/// Logs titles into `titles` and follows links until `max_depth`
fn follow(max_depth: usize, titles: Rc<RefCell<Vec<(usize, String)>>>) -> Callback {
    Callback::result_only(move |submitter: &mut Submitter, fetched: Fetched| {
        let doc = fetched.into_document().expect("Expected a parsed document");
        let title = doc.first_content("title").unwrap_or_default();
        titles.borrow_mut().push((submitter.depth(), title));

        if submitter.depth() >= max_depth {
            return;
        }

        let base = doc.url().expect("Document should carry its URL").clone();
        for link in doc.find("a@href").expect("Selector should translate") {
            let target = base.join(value(&link).unwrap()).unwrap();
            submitter.submit(
                submitter.depth() + 1,
                Method::GET,
                target,
                Params::None,
                follow(max_depth, Rc::clone(&titles)),
                JobOptions::default(),
            );
        }
    })
}

#[tokio::test]
async fn test_full_crawl_follows_links_depth_first() {
    let mock_server = MockServer::start().await;

    mount_html(
        &mock_server,
        "/",
        r#"<html><head><title>Home</title></head><body>
        <a href="/page1">Page 1</a>
        <a href="page2">Page 2</a>
        </body></html>"#,
    )
    .await;
    mount_html(
        &mock_server,
        "/page1",
        r#"<html><head><title>Page 1</title></head><body><a href="/deep">Deep</a></body></html>"#,
    )
    .await;
    mount_html(
        &mock_server,
        "/page2",
        r#"<html><head><title>Page 2</title></head><body>Content 2</body></html>"#,
    )
    .await;
    mount_html(
        &mock_server,
        "/deep",
        r#"<html><head><title>Deep</title></head><body>Bottom</body></html>"#,
    )
    .await;

    let config = create_test_config(1, 1);
    let mut scheduler = scheduler(&config);
    let titles = Rc::new(RefCell::new(Vec::new()));

    scheduler.submit(
        0,
        Method::GET,
        Url::parse(&format!("{}/", mock_server.uri())).unwrap(),
        Params::None,
        follow(2, Rc::clone(&titles)),
        JobOptions::default(),
    );

    let stats = scheduler.run().await;
    assert_eq!(stats.total_dispatched, 4);
    assert_eq!(stats.succeeded, 4);
    assert_eq!(stats.exhausted, 0);

    // The first link takes the slot its parent freed; /deep then outranks the queued sibling
    assert_eq!(
        *titles.borrow(),
        vec![
            (0, "Home".to_string()),
            (1, "Page 1".to_string()),
            (2, "Deep".to_string()),
            (1, "Page 2".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_xml_and_html_are_routed_by_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<?xml version="1.0"?>
            <rss><channel>
              <item><title>One</title><link>https://example.com/1</link></item>
              <item><title>Two</title><link>https://example.com/2</link></item>
            </channel></rss>"#,
            "application/rss+xml",
        ))
        .mount(&mock_server)
        .await;
    mount_html(
        &mock_server,
        "/page",
        r#"<html><body><ul><li class="entry">A</li><li class="entry">B</li></ul></body></html>"#,
    )
    .await;

    let config = create_test_config(2, 1);
    let mut scheduler = scheduler(&config);
    let seen: Rc<RefCell<Vec<(ContentKind, Vec<String>)>>> = Rc::new(RefCell::new(Vec::new()));

    for (route, selector) in [("/feed", "item > title"), ("/page", "li.entry")] {
        let sink = Rc::clone(&seen);
        scheduler.submit(
            0,
            Method::GET,
            Url::parse(&format!("{}{}", mock_server.uri(), route)).unwrap(),
            Params::None,
            Callback::result_only(move |_, fetched| {
                let doc = fetched.into_document().unwrap();
                let found = doc
                    .find(selector)
                    .unwrap()
                    .iter()
                    .map(content)
                    .collect();
                sink.borrow_mut().push((doc.kind(), found));
            }),
            JobOptions::default(),
        );
    }

    scheduler.run().await;

    let mut seen = seen.borrow().clone();
    seen.sort_by_key(|(kind, _)| kind.to_string());
    assert_eq!(
        seen,
        vec![
            (ContentKind::Html, vec!["A".to_string(), "B".to_string()]),
            (ContentKind::Xml, vec!["One".to_string(), "Two".to_string()]),
        ]
    );
}

#[tokio::test]
async fn test_empty_body_is_retried_until_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/html"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(5, 3);
    let mut scheduler = scheduler(&config);
    let errors: Rc<RefCell<Vec<CrawlError>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);

    scheduler.submit(
        0,
        Method::GET,
        Url::parse(&format!("{}/empty", mock_server.uri())).unwrap(),
        Params::None,
        Callback::with_error(move |_, result| match result {
            Ok(_) => panic!("An empty document must not be delivered"),
            Err(error) => sink.borrow_mut().push(error),
        }),
        JobOptions::default(),
    );

    let stats = scheduler.run().await;
    assert_eq!(stats.total_dispatched, 3);
    assert_eq!(stats.exhausted, 1);

    let errors = errors.borrow();
    assert_eq!(errors.len(), 3);
    assert!(errors
        .iter()
        .all(|e| matches!(e.fetch_error(), Some(FetchError::EmptyDocument))));
    assert!(!errors[0].is_exhausted());
    assert!(errors[2].is_exhausted());
}

#[tokio::test]
async fn test_raw_option_skips_parsing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{\"ok\":true}", "application/json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(1, 3);
    let mut scheduler = scheduler(&config);
    let bodies = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&bodies);

    scheduler.submit(
        0,
        Method::GET,
        Url::parse(&format!("{}/data", mock_server.uri())).unwrap(),
        Params::None,
        Callback::result_only(move |_, fetched| {
            let response = fetched.raw().expect("Expected the raw response");
            sink.borrow_mut().push(response.text().into_owned());
        }),
        JobOptions::default().raw(),
    );

    scheduler.run().await;
    assert_eq!(*bodies.borrow(), vec!["{\"ok\":true}".to_string()]);
}
