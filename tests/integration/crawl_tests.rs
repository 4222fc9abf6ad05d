//! Integration tests for the HTTP path
//!
//! These tests use wiremock to serve marketplace pages and run the real
//! fetcher, the built-in adapters and the SQLite backend end to end.

use souk_harvest::config::{parse_config, Config};
use souk_harvest::output::RunStatus;
use souk_harvest::Orchestrator;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches requests without a query string
struct NoQuery;

impl Match for NoQuery {
    fn matches(&self, request: &Request) -> bool {
        request.url.query().is_none()
    }
}

/// Creates a config with one site served by `server`, stored in SQLite under `dir`
fn create_test_config(server: &MockServer, site: &str, dir: &Path) -> Config {
    parse_config(&format!(
        r#"
[crawler]
max-concurrent-fetches = 4
fetch-timeout-secs = 5
item-timeout-secs = 10

[user-agent]
name = "TestBot"
version = "1.0.0"

[output]
backend = "sqlite"
database-path = "{}"

[[site]]
base-url = "{}"
{}
"#,
        dir.join("harvest.db").display(),
        server.uri(),
        site
    ))
    .expect("Failed to parse test config")
}

async fn mount_html(server: &MockServer, mock: wiremock::MockBuilder, body: &str) {
    mock.respond_with(
        ResponseTemplate::new(200)
            .set_body_string(body.to_string())
            .insert_header("content-type", "text/html"),
    )
    .mount(server)
    .await;
}

#[tokio::test]
async fn test_coinafrique_site_end_to_end() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_html(
        &server,
        Mock::given(method("GET")).and(path("/")),
        r#"<ul>
          <li class="category gtm-category-bar center"><a href="/">Toutes</a></li>
          <li class="category gtm-category-bar center"><a href="/categorie/telephones">Téléphones</a></li>
        </ul>"#,
    )
    .await;

    mount_html(
        &server,
        Mock::given(method("GET"))
            .and(path("/categorie/telephones"))
            .and(NoQuery),
        r#"<div class="card"><a class="card-image ad__card-image" href="/annonce/iphone-1"></a></div>
           <div class="card"><a class="card-image ad__card-image" href="/annonce/tecno-2"></a></div>"#,
    )
    .await;

    mount_html(
        &server,
        Mock::given(method("GET"))
            .and(path("/categorie/telephones"))
            .and(query_param("page", "2")),
        "<div class=\"cards\"></div>",
    )
    .await;

    for (slug, title, price) in [("iphone-1", "iPhone 11", "200 000 CFA"), ("tecno-2", "Tecno Spark", "60 000 CFA")] {
        mount_html(
            &server,
            Mock::given(method("GET")).and(path(format!("/annonce/{}", slug))),
            &format!(
                r#"<div class="ad__info__box-priceAndTitle">
                     <h1 class="title-ad">{title}</h1><p class="price">{price}</p>
                   </div>
                   <div class="details-characteristics"><ul>
                     <li><span>Etat</span><span class="qt">Occasion</span></li>
                   </ul></div>"#
            ),
        )
        .await;
    }

    let config = create_test_config(&server, "id = \"coinafrique\"\nadapter = \"coinafrique\"", dir.path());
    let orchestrator = Orchestrator::from_config(config).expect("Failed to create orchestrator");

    let run = orchestrator.run_once(&[]).await.expect("Run failed");
    assert_eq!(run.status, RunStatus::Completed);

    let site = run.site("coinafrique").unwrap();
    assert_eq!(site.categories, 1);
    assert_eq!(site.pages, 2);
    assert_eq!(site.records_written, 2);

    let mut records = orchestrator
        .with_storage(|s| s.load_records().unwrap())
        .unwrap();
    records.sort_by(|a, b| a.title.cmp(&b.title));
    assert_eq!(records[0].title, "iPhone 11");
    assert_eq!(records[0].price.as_deref(), Some("200 000 CFA"));
    assert_eq!(records[0].category, "Téléphones");
    assert_eq!(
        records[0].attributes.get("Etat").map(String::as_str),
        Some("Occasion")
    );
    assert_eq!(records[1].url, format!("{}/annonce/tecno-2", server.uri()));
}

#[tokio::test]
async fn test_iliko_stops_on_page_of_known_products() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_html(
        &server,
        Mock::given(method("GET")).and(path("/categories")),
        r#"<div class="card-header mb-2 p-2 side-category-bar"
                onclick="location.href='/category/12'">Electroménager</div>"#,
    )
    .await;

    // Page 2 repeats page 1, which ends the walk for this adapter
    let listing = r#"
        <div class="single-product-details"><div class="text-left"><a href="/product/frigo-1">Frigo</a></div></div>
        <div class="single-product-details"><div class="text-left"><a href="/product/fer-2">Fer</a></div></div>"#;
    for page in ["1", "2"] {
        mount_html(
            &server,
            Mock::given(method("GET"))
                .and(path("/products"))
                .and(query_param("id", "12"))
                .and(query_param("page", page)),
            listing,
        )
        .await;
    }
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    for slug in ["frigo-1", "fer-2"] {
        mount_html(
            &server,
            Mock::given(method("GET")).and(path(format!("/product/{}", slug))),
            &format!(
                r#"<div class="details"><span class="h5">Produit {slug}</span>
                   <span class="h3 font-weight-normal text-accent">15 000 FCFA</span>
                   <strike>18 000 FCFA</strike></div>"#
            ),
        )
        .await;
    }

    let config = create_test_config(&server, "id = \"iliko\"\nadapter = \"iliko\"", dir.path());
    let orchestrator = Orchestrator::from_config(config).expect("Failed to create orchestrator");

    let run = orchestrator.run_once(&[]).await.expect("Run failed");
    let site = run.site("iliko").unwrap();
    assert_eq!(site.pages, 2);
    assert_eq!(site.items_new, 2);
    assert_eq!(site.items_duplicate, 2);
    assert_eq!(site.records_written, 2);

    let records = orchestrator
        .with_storage(|s| s.load_records().unwrap())
        .unwrap();
    assert!(records
        .iter()
        .all(|r| r.original_price.as_deref() == Some("18 000 FCFA")));
}

#[tokio::test]
async fn test_item_server_errors_are_retried_next_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_html(
        &server,
        Mock::given(method("GET")).and(path("/")),
        r#"<nav><a class="cat" href="/shop/all">Tout</a></nav>"#,
    )
    .await;
    mount_html(
        &server,
        Mock::given(method("GET")).and(path("/shop/all")).and(NoQuery),
        r#"<a class="item" href="/p/ok">ok</a><a class="item" href="/p/flaky">flaky</a>"#,
    )
    .await;
    mount_html(
        &server,
        Mock::given(method("GET"))
            .and(path("/shop/all"))
            .and(query_param("page", "2")),
        "<p>Aucun résultat</p>",
    )
    .await;
    mount_html(
        &server,
        Mock::given(method("GET")).and(path("/p/ok")),
        "<h1>Chaise</h1>",
    )
    .await;

    // Fetch failures are not recorded as seen, so the item is requested by both runs
    Mock::given(method("GET"))
        .and(path("/p/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let site = r#"id = "meubles"
adapter = "selectors"

[site.selectors]
category-link = "a.cat"
item-link = "a.item"
title = "h1"
"#;
    let config = create_test_config(&server, site, dir.path());
    let orchestrator = Orchestrator::from_config(config).expect("Failed to create orchestrator");

    let first = orchestrator.run_once(&[]).await.expect("Run failed");
    let summary = first.site("meubles").unwrap();
    assert_eq!(summary.records_written, 1);
    assert_eq!(summary.items_fetch_failed, 1);

    let second = orchestrator.run_once(&[]).await.expect("Run failed");
    let summary = second.site("meubles").unwrap();
    assert_eq!(summary.items_duplicate, 1);
    assert_eq!(summary.items_fetch_failed, 1);
    assert_eq!(summary.records_written, 0);

    let runs = orchestrator.with_storage(|s| s.load_runs().unwrap()).unwrap();
    assert_eq!(runs.len(), 2);
}

#[tokio::test]
async fn test_mtn_records_come_from_shop_front() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<div class="product-card-container product-item-card col-lg-3 col-6">
                         <a class="product-card shawdow-card h-100" href="/produit/modem">
                           <div class="product-card-details"><h3>Modem 4G</h3></div>
                           <div class="product-card-pricing"><span class="woocommerce-Price-amount">20 000 FCFA</span></div>
                         </a>
                       </div>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Product pages are never visited
    Mock::given(method("GET"))
        .and(path("/produit/modem"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, "id = \"mtn\"\nadapter = \"mtn\"", dir.path());
    let orchestrator = Orchestrator::from_config(config).expect("Failed to create orchestrator");

    let run = orchestrator.run_once(&[]).await.expect("Run failed");
    let site = run.site("mtn").unwrap();
    assert_eq!(site.categories, 1);
    assert_eq!(site.pages, 1);
    assert_eq!(site.records_written, 1);

    let records = orchestrator
        .with_storage(|s| s.load_records().unwrap())
        .unwrap();
    assert_eq!(records[0].title, "Modem 4G");
    assert_eq!(records[0].price.as_deref(), Some("20 000 FCFA"));
    assert_eq!(records[0].category, "Boutique");
}
