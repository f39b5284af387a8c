use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Datelike, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use portfolio_monitor::sources::aggregator::AggregatorProvider;
use portfolio_monitor::sources::direct::DirectSiteProvider;
use portfolio_monitor::sources::index_api::{EtfHoldingsProvider, IndexPageProvider};
use portfolio_monitor::sources::mailbox::MailboxProvider;
use portfolio_monitor::sources::{FetchOutcome, SourceParams, SourceProvider};

const DISCLOSURE_CSV: &str = "Name of the Instrument,ISIN,% to Net Assets\n\
    Reliance Industries Limited,INE002A01018,6.52\n\
    Tata Consultancy Services Ltd.,INE467B01029,5.24\n\
    Grand Total,,100.0\n";

fn params(pairs: &[(&str, &str)]) -> SourceParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

async fn mount_csv(server: &MockServer, at: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(DISCLOSURE_CSV))
        .mount(server)
        .await;
}

fn expect_holdings(outcome: FetchOutcome) -> Vec<(String, f64)> {
    match outcome {
        FetchOutcome::Holdings(fetched) => fetched.holdings,
        other => panic!("expected holdings, got {other:?}"),
    }
}

#[tokio::test]
async fn aggregator_picks_current_month_file_and_parses_it() {
    let server = MockServer::start().await;

    let month_label = Utc::now().format("%B %Y");
    let listing = format!(
        r#"<html><body>
            <a href="/files/current.csv">Flexi Cap Portfolio {month_label}</a>
            <a href="/files/ancient.csv">Flexi Cap Portfolio January 2019</a>
        </body></html>"#
    );
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing))
        .mount(&server)
        .await;
    mount_csv(&server, "/files/current.csv").await;

    let provider = AggregatorProvider::new();
    let outcome = provider
        .attempt(&params(&[(
            "listing_url",
            &format!("{}/listing", server.uri()),
        )]))
        .await
        .unwrap();

    let (fetched, date) = match outcome {
        FetchOutcome::Holdings(f) => (f.holdings, f.disclosure_date),
        other => panic!("expected holdings, got {other:?}"),
    };
    assert_eq!(fetched[0], ("RELIANCE INDUSTRIES".to_string(), 6.52));
    assert_eq!(fetched.len(), 2);

    let today = Utc::now().date_naive();
    let disclosed = date.unwrap();
    assert_eq!((disclosed.year(), disclosed.month()), (today.year(), today.month()));
}

#[tokio::test]
async fn aggregator_with_no_links_reports_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>maintenance</body></html>"))
        .mount(&server)
        .await;

    let provider = AggregatorProvider::new();
    let outcome = provider
        .attempt(&params(&[(
            "listing_url",
            &format!("{}/listing", server.uri()),
        )]))
        .await
        .unwrap();
    assert_eq!(outcome, FetchOutcome::NotFound);
}

#[tokio::test]
async fn aggregator_http_error_is_a_hard_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let provider = AggregatorProvider::new();
    let result = provider
        .attempt(&params(&[(
            "listing_url",
            &format!("{}/listing", server.uri()),
        )]))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn direct_site_follows_scheme_link_and_downloads() {
    let server = MockServer::start().await;
    let page = r#"<html><body>
        <a href="/downloads/other-scheme.csv">Other Scheme Portfolio</a>
        <a href="/downloads/flexi-cap.csv">Flexi Cap Portfolio</a>
    </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/portfolio"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    mount_csv(&server, "/downloads/flexi-cap.csv").await;

    let provider = DirectSiteProvider::new();
    let outcome = provider
        .attempt(&params(&[
            ("portfolio_url", &format!("{}/portfolio", server.uri())),
            ("scheme_name", "flexi cap"),
        ]))
        .await
        .unwrap();

    let holdings = expect_holdings(outcome);
    assert_eq!(holdings.len(), 2);
    assert_eq!(holdings[1].0, "TATA CONSULTANCY SERVICES");
}

#[tokio::test]
async fn mailbox_search_finds_link_in_email_body() {
    let server = MockServer::start().await;

    let email_html = format!(
        r#"<html><body><p>Dear investor,</p>
           <a href="{}/files/disclosure.csv">Download portfolio</a></body></html>"#,
        server.uri()
    );
    let encoded = URL_SAFE_NO_PAD.encode(email_html.as_bytes());

    Mock::given(method("GET"))
        .and(path("/users/me/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"messages": [{"id": "m1"}]}"#),
        )
        .mount(&server)
        .await;
    // 2024-12-01T00:00:00Z in epoch milliseconds.
    let message = format!(
        r#"{{"internalDate": "1733011200000",
            "payload": {{"mimeType": "multipart/alternative",
                         "parts": [{{"mimeType": "text/plain", "body": {{"data": ""}}}},
                                   {{"mimeType": "text/html", "body": {{"data": "{encoded}"}}}}]}}}}"#
    );
    Mock::given(method("GET"))
        .and(path("/users/me/messages/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(message))
        .mount(&server)
        .await;
    mount_csv(&server, "/files/disclosure.csv").await;

    let provider = MailboxProvider::with_base_url(Some("test-token".to_string()), server.uri());
    let outcome = provider
        .attempt(&params(&[("amc_name", "Example AMC")]))
        .await
        .unwrap();

    let (holdings, date) = match outcome {
        FetchOutcome::Holdings(f) => (f.holdings, f.disclosure_date),
        other => panic!("expected holdings, got {other:?}"),
    };
    assert_eq!(holdings.len(), 2);
    assert_eq!(
        date,
        chrono::NaiveDate::from_ymd_opt(2024, 12, 1)
    );
}

#[tokio::test]
async fn mailbox_without_token_skips_without_error() {
    let provider = MailboxProvider::new(None);
    let outcome = provider
        .attempt(&params(&[("amc_name", "Example AMC")]))
        .await
        .unwrap();
    assert_eq!(outcome, FetchOutcome::NotFound);
}

#[tokio::test]
async fn mailbox_with_no_matching_emails_reports_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let provider = MailboxProvider::with_base_url(Some("test-token".to_string()), server.uri());
    let outcome = provider
        .attempt(&params(&[("amc_name", "Example AMC")]))
        .await
        .unwrap();
    assert_eq!(outcome, FetchOutcome::NotFound);
}

#[tokio::test]
async fn index_page_scrapes_constituent_table() {
    let server = MockServer::start().await;
    let page = r#"<html><body>
        <table id="constituents">
          <tr><th>Symbol</th><th>Company</th></tr>
          <tr><td>RELIANCE</td><td>Reliance Industries</td></tr>
          <tr><td>tcs</td><td>Tata Consultancy Services</td></tr>
        </table>
    </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/index"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let provider = IndexPageProvider::new();
    let outcome = provider
        .attempt(&params(&[(
            "page_url",
            &format!("{}/index", server.uri()),
        )]))
        .await
        .unwrap();

    match outcome {
        FetchOutcome::Constituents(set) => {
            assert!(set.contains("RELIANCE"));
            assert!(set.contains("TCS"));
            assert_eq!(set.len(), 2);
        }
        other => panic!("expected constituents, got {other:?}"),
    }
}

#[tokio::test]
async fn etf_holdings_harvests_tickers_from_nested_json() {
    let server = MockServer::start().await;
    let payload = r#"{"fund": {"holdings": [
        {"ticker": "NVDA", "weight": 8.1},
        {"ticker": "amd", "weight": 4.4},
        {"name": "cash", "weight": 0.2}
    ]}}"#;
    Mock::given(method("GET"))
        .and(path("/holdings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(payload)
                .insert_header("content-type", "application/json"),
        )
        .mount(&server)
        .await;

    let provider = EtfHoldingsProvider::new();
    let outcome = provider
        .attempt(&params(&[(
            "holdings_url",
            &format!("{}/holdings", server.uri()),
        )]))
        .await
        .unwrap();

    match outcome {
        FetchOutcome::Constituents(set) => {
            assert_eq!(
                set.into_iter().collect::<Vec<_>>(),
                vec!["AMD".to_string(), "NVDA".to_string()]
            );
        }
        other => panic!("expected constituents, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_required_param_is_a_config_error() {
    let provider = AggregatorProvider::new();
    let result = provider.attempt(&HashMap::new()).await;
    assert!(result.is_err());
}
