//! End-to-end runs of the orchestrator over fixture shops

use crate::common::{config, orchestrator, shop_site, MapFetcher, Shop};
use souk_harvest::output::RunStatus;
use souk_harvest::storage::{FileStorage, SqliteStorage, Storage};
use souk_harvest::{AdapterRegistry, HarvestError, Orchestrator};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_second_run_finds_nothing_new() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones"]);
    shop.category_with_items("phones", &[&["a", "b", "c"], &["d", "e"], &[]]);

    let orchestrator = orchestrator(config(&[shop_site("shop", "shop.test", false)], 50), &fetcher, dir.path());

    let first = orchestrator.run_once(&[]).await.unwrap();
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(first.items_new(), 5);
    assert_eq!(first.records_written(), 5);

    let second = orchestrator.run_once(&[]).await.unwrap();
    assert_eq!(second.items_new(), 0);
    assert_eq!(second.items_duplicate(), 5);
    assert_eq!(second.records_written(), 0);

    // Item pages are fetched once across both runs
    assert_eq!(fetcher.hits(&shop.item_url("a")), 1);

    let rows = orchestrator.with_storage(|s| s.load_records().unwrap()).unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.scrape_date.is_some()));
}

#[tokio::test]
async fn test_same_url_is_new_for_another_site() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones"]);
    shop.category_with_items("phones", &[&["a", "b", "c"], &[]]);

    let sites = [
        shop_site("alpha", "shop.test", false),
        shop_site("beta", "shop.test", false),
    ];
    let orchestrator = orchestrator(config(&sites, 50), &fetcher, dir.path());

    let alpha = orchestrator.run_once(&ids(&["alpha"])).await.unwrap();
    assert_eq!(alpha.items_new(), 3);

    let beta = orchestrator.run_once(&ids(&["beta"])).await.unwrap();
    assert_eq!(beta.site("beta").unwrap().items_new, 3);
    assert_eq!(beta.items_duplicate(), 0);

    let rows = orchestrator.with_storage(|s| s.load_records().unwrap()).unwrap();
    assert_eq!(rows.iter().filter(|r| r.site == "alpha").count(), 3);
    assert_eq!(rows.iter().filter(|r| r.site == "beta").count(), 3);
}

#[tokio::test]
async fn test_parse_failures_drop_only_their_items() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones"]);
    shop.listing("phones", 1, &["a", "b", "c", "d", "e"]);
    shop.listing("phones", 2, &[]);
    for slug in ["a", "c", "e"] {
        shop.item(slug);
    }
    for slug in ["b", "d"] {
        shop.broken_item(slug);
    }

    let orchestrator = orchestrator(config(&[shop_site("shop", "shop.test", false)], 50), &fetcher, dir.path());
    let run = orchestrator.run_once(&[]).await.unwrap();

    let site = run.site("shop").unwrap();
    assert_eq!(site.records_written, 3);
    assert_eq!(site.items_parse_failed, 2);
    assert_eq!(run.item_failures(), 2);
    assert_eq!(run.site_failures(), 0);

    let rows = orchestrator.with_storage(|s| s.load_records().unwrap()).unwrap();
    assert_eq!(rows.len(), 3);

    let log = orchestrator.with_storage(|s| s.read_log().unwrap()).unwrap();
    assert!(log.iter().any(|line| line.contains("2 parse failed")));
    assert!(log.iter().any(|line| line.contains("2 item failures")));

    // Unparsable items are remembered and not fetched again
    orchestrator.run_once(&[]).await.unwrap();
    assert_eq!(fetcher.hits(&shop.item_url("b")), 1);
}

#[tokio::test]
async fn test_walk_stops_on_empty_page() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones"]);
    shop.category_with_items("phones", &[&["a", "b", "c"], &["d", "e"], &[]]);

    let orchestrator = orchestrator(config(&[shop_site("shop", "shop.test", false)], 50), &fetcher, dir.path());
    let run = orchestrator.run_once(&[]).await.unwrap();

    let site = run.site("shop").unwrap();
    assert_eq!(site.pages, 3);
    assert_eq!(site.categories_failed, 0);
    assert_eq!(fetcher.hits(&shop.url("/c/phones?page=4")), 0);
}

#[tokio::test]
async fn test_walk_stops_at_page_cap() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones"]);
    shop.category_with_items("phones", &[&["a", "b"], &["c", "d"], &["e", "f"], &["g"]]);

    let orchestrator = orchestrator(config(&[shop_site("shop", "shop.test", false)], 2), &fetcher, dir.path());
    let run = orchestrator.run_once(&[]).await.unwrap();

    let site = run.site("shop").unwrap();
    assert_eq!(site.pages, 2);
    assert_eq!(site.records_written, 4);
    assert_eq!(fetcher.hits(&shop.url("/c/phones?page=3")), 0);
}

#[tokio::test]
async fn test_dataset_rows_add_up_across_runs() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones"]);
    shop.listing("phones", 2, &[]);

    let orchestrator = orchestrator(config(&[shop_site("shop", "shop.test", false)], 50), &fetcher, dir.path());

    // Each run lists everything so far plus a disjoint set of new items
    let batches: [&[&str]; 3] = [&["a1", "a2"], &["b1", "b2", "b3"], &["c1"]];
    let mut listed: Vec<&str> = Vec::new();
    for batch in batches {
        for slug in batch {
            shop.item(slug);
        }
        listed = batch.iter().copied().chain(listed).collect();
        shop.listing("phones", 1, &listed);

        let run = orchestrator.run_once(&[]).await.unwrap();
        assert_eq!(run.records_written(), batch.len());
    }

    let rows = orchestrator.with_storage(|s| s.load_records().unwrap()).unwrap();
    assert_eq!(rows.len(), 6);
}

#[tokio::test]
async fn test_ledger_entries_skip_known_items() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones"]);
    shop.category_with_items("phones", &[&["u1", "u2", "u3"], &[]]);

    {
        let mut storage = FileStorage::open(dir.path()).unwrap();
        storage.append_seen("shop", &[shop.item_url("u2")]).unwrap();
    }

    let orchestrator = orchestrator(config(&[shop_site("shop", "shop.test", false)], 50), &fetcher, dir.path());
    let run = orchestrator.run_once(&[]).await.unwrap();

    let site = run.site("shop").unwrap();
    assert_eq!(site.items_new, 2);
    assert_eq!(site.items_duplicate, 1);
    assert_eq!(fetcher.hits(&shop.item_url("u2")), 0);

    let mut titles: Vec<String> = orchestrator
        .with_storage(|s| s.load_records().unwrap())
        .unwrap()
        .into_iter()
        .map(|r| r.title)
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["Item u1", "Item u3"]);

    let mut seen: Vec<String> = orchestrator
        .with_storage(|s| s.load_seen().unwrap())
        .unwrap()
        .into_iter()
        .filter(|(site, _)| site == "shop")
        .map(|(_, url)| url)
        .collect();
    seen.sort();
    assert_eq!(
        seen,
        vec![shop.item_url("u1"), shop.item_url("u2"), shop.item_url("u3")]
    );
}

#[tokio::test]
async fn test_discovery_failure_skips_only_that_site() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    // x.test serves nothing at all
    let y = Shop::new(&fetcher, "y.test");
    y.categories(&["phones"]);
    y.category_with_items("phones", &[&["a", "b"], &[]]);

    let sites = [
        shop_site("x", "x.test", false),
        shop_site("y", "y.test", false),
    ];
    let orchestrator = orchestrator(config(&sites, 50), &fetcher, dir.path());
    let run = orchestrator.run_once(&[]).await.unwrap();

    assert_eq!(run.status, RunStatus::CompletedWithErrors);
    assert_eq!(run.site_failures(), 1);
    assert!(run.site("x").unwrap().discovery_error.is_some());
    assert_eq!(run.site("y").unwrap().records_written, 2);

    let rows = orchestrator.with_storage(|s| s.load_records().unwrap()).unwrap();
    assert!(rows.iter().all(|r| r.site == "y"));
    assert_eq!(rows.len(), 2);

    let log = orchestrator.with_storage(|s| s.read_log().unwrap()).unwrap();
    assert_eq!(
        log.iter().filter(|l| l.contains("discovery failed")).count(),
        1
    );
    assert!(log.iter().any(|l| l.contains("1 site failures")));
}

#[tokio::test]
async fn test_failed_listing_page_ends_only_its_category() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones", "shoes"]);
    shop.category_with_items("phones", &[&["p1", "p2"]]);
    fetcher.status(&shop.url("/c/phones?page=2"), 503);
    shop.category_with_items("shoes", &[&["s1"], &[]]);

    let orchestrator = orchestrator(config(&[shop_site("shop", "shop.test", false)], 50), &fetcher, dir.path());
    let run = orchestrator.run_once(&[]).await.unwrap();

    let site = run.site("shop").unwrap();
    assert_eq!(site.categories, 2);
    assert_eq!(site.categories_failed, 1);
    assert_eq!(site.records_written, 3);
    assert!(!site.site_failed());
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_duplicate_page_policy() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    for host in ["stop.test", "scan.test"] {
        let shop = Shop::new(&fetcher, host);
        shop.categories(&["phones"]);
        shop.category_with_items("phones", &[&["a", "b"], &["c"], &[]]);
    }

    let sites = [
        shop_site("stop", "stop.test", true),
        shop_site("scan", "scan.test", false),
    ];
    let orchestrator = orchestrator(config(&sites, 50), &fetcher, dir.path());
    orchestrator.run_once(&[]).await.unwrap();

    let second = orchestrator.run_once(&[]).await.unwrap();
    assert_eq!(second.site("stop").unwrap().pages, 1);
    assert_eq!(second.site("scan").unwrap().pages, 3);
    assert_eq!(second.items_new(), 0);
}

#[tokio::test]
async fn test_overlapping_run_is_rejected() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::with_delay(Duration::from_millis(40));
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones"]);
    shop.category_with_items("phones", &[&["a", "b"], &[]]);

    let orchestrator = orchestrator(config(&[shop_site("shop", "shop.test", false)], 50), &fetcher, dir.path());

    let (first, (second, reset)) = tokio::join!(orchestrator.run_once(&[]), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        (orchestrator.run_once(&ids(&["shop"])).await, orchestrator.reset())
    });

    assert_eq!(first.unwrap().records_written(), 2);
    assert!(matches!(
        second,
        Err(HarvestError::RunInProgress { ref sites }) if sites == &ids(&["shop"])
    ));
    assert!(matches!(reset, Err(HarvestError::RunInProgress { .. })));

    // The claim is released once the first run returns
    let third = orchestrator.run_once(&[]).await.unwrap();
    assert_eq!(third.items_duplicate(), 2);
}

#[tokio::test]
async fn test_reset_empties_dataset_ledger_and_log() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones"]);
    shop.category_with_items("phones", &[&["a", "b", "c"], &[]]);

    let orchestrator = orchestrator(config(&[shop_site("shop", "shop.test", false)], 50), &fetcher, dir.path());
    orchestrator.run_once(&[]).await.unwrap();

    orchestrator.reset().unwrap();
    orchestrator
        .with_storage(|s| {
            assert!(s.load_records().unwrap().is_empty());
            assert!(s.load_seen().unwrap().is_empty());
            assert!(s.read_log().unwrap().is_empty());
            assert!(s.load_runs().unwrap().is_empty());
        })
        .unwrap();

    let again = orchestrator.run_once(&[]).await.unwrap();
    assert_eq!(again.items_new(), 3);
}

#[tokio::test]
async fn test_ledger_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones"]);
    shop.category_with_items("phones", &[&["a", "b"], &[]]);

    let first = orchestrator(config(&[shop_site("shop", "shop.test", false)], 50), &fetcher, dir.path());
    assert_eq!(first.run_once(&[]).await.unwrap().items_new(), 2);
    drop(first);

    let reopened = orchestrator(config(&[shop_site("shop", "shop.test", false)], 50), &fetcher, dir.path());
    let run = reopened.run_once(&[]).await.unwrap();
    assert_eq!(run.items_new(), 0);
    assert_eq!(run.items_duplicate(), 2);

    let runs = reopened.with_storage(|s| s.load_runs().unwrap()).unwrap();
    assert_eq!(runs.len(), 2);
}

#[tokio::test]
async fn test_unknown_site_names_are_reported() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::new();
    let orchestrator = orchestrator(config(&[shop_site("shop", "shop.test", false)], 50), &fetcher, dir.path());

    let run = orchestrator.run_once(&ids(&["jumia"])).await.unwrap();
    assert!(run.sites.is_empty());
    assert_eq!(run.unknown_sites, ids(&["jumia"]));
    assert_eq!(fetcher.hits("https://shop.test/categories"), 0);
}

#[tokio::test]
async fn test_second_orchestrator_on_same_storage_is_rejected() {
    let dir = TempDir::new().unwrap();
    let fetcher = MapFetcher::with_delay(Duration::from_millis(40));
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones"]);
    shop.category_with_items("phones", &[&["a", "b", "c"], &[]]);

    // Two drivers with their own storage handles, as two processes would have
    let sites = [shop_site("shop", "shop.test", false)];
    let first = orchestrator(config(&sites, 50), &fetcher, dir.path());
    let second = orchestrator(config(&sites, 50), &fetcher, dir.path());

    let (a, (b, reset)) = tokio::join!(first.run_once(&[]), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        (second.run_once(&[]).await, second.reset())
    });

    let outcomes = [&a, &b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(HarvestError::RunInProgress { sites }) if sites == &ids(&["shop"])
    )));
    assert!(matches!(reset, Err(HarvestError::RunInProgress { .. })));

    // Nothing was written twice
    let rows = FileStorage::open(dir.path()).unwrap().load_records().unwrap();
    assert_eq!(rows.len(), 3);
    let ledger = FileStorage::open(dir.path()).unwrap().load_seen().unwrap();
    assert_eq!(ledger.len(), 3);

    // Once the first run is over the second driver may proceed
    let later = second.run_once(&[]).await.unwrap();
    assert_eq!(later.items_duplicate(), 3);
}

#[tokio::test]
async fn test_runs_from_two_orchestrators_are_both_recorded() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("harvest.db");
    let fetcher = MapFetcher::new();
    let shop = Shop::new(&fetcher, "shop.test");
    shop.categories(&["phones"]);
    shop.category_with_items("phones", &[&["a"], &[]]);

    let driver = || {
        Orchestrator::new(
            config(&[shop_site("shop", "shop.test", false)], 50),
            AdapterRegistry::with_builtin(),
            Arc::new(fetcher.clone()),
            Box::new(SqliteStorage::new(&db).unwrap()),
        )
    };

    // Fresh drivers started within the same second
    let first = driver().run_once(&[]).await.unwrap();
    let second = driver().run_once(&[]).await.unwrap();
    assert_ne!(first.run_id, second.run_id);

    let runs = SqliteStorage::new(&db).unwrap().load_runs().unwrap();
    let recorded: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(recorded.len(), 2);
    assert!(recorded.contains(&first.run_id.as_str()));
    assert!(recorded.contains(&second.run_id.as_str()));
}
