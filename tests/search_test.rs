mod helpers;

use helpers::{entry, test_ledger};
use ledger::entries::search::SearchOptions;
use ledger::entries::types::{EntryType, Importance};

fn seeded() -> helpers::TestLedger {
    let ledger = test_ledger();
    ledger.db.insert_many(
        "s1",
        &[
            entry(EntryType::Learning, "Trailing whitespace breaks the snapshot tests", Importance::Medium),
            entry(EntryType::Decision, "Trim trailing newlines in the formatter", Importance::High),
            entry(EntryType::Constraint, "Never commit generated files", Importance::High),
        ],
    );
    ledger.db.insert_many(
        "s2",
        &[entry(EntryType::Learning, "trailing slash matters for rsync", Importance::Low)],
    );
    ledger
}

#[test]
fn prefix_matching_is_on_by_default() {
    let ledger = seeded();
    let hits = ledger.db.search("trail", &SearchOptions::default());
    assert_eq!(hits.len(), 3);

    let exact = SearchOptions {
        prefix_match: false,
        ..SearchOptions::default()
    };
    assert!(ledger.db.search("trail", &exact).is_empty());
    assert_eq!(ledger.db.search("trailing", &exact).len(), 3);
}

#[test]
fn explicit_wildcards_and_negation_pass_through() {
    let ledger = seeded();
    let exact = SearchOptions {
        prefix_match: false,
        ..SearchOptions::default()
    };
    assert_eq!(ledger.db.search("gen*", &exact).len(), 1);
    assert_eq!(ledger.db.search("trailing NOT rsync", &exact).len(), 2);
}

#[test]
fn filters_narrow_ranked_results() {
    let ledger = seeded();
    let options = SearchOptions {
        session_id: Some("s1".into()),
        importance: Some(Importance::High),
        ..SearchOptions::default()
    };
    let hits = ledger.db.search("trailing", &options);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entry.entry.entry_type, EntryType::Decision);
    assert_eq!(hits[0].entry.session_id, "s1");
}

#[test]
fn results_are_ranked_and_limited() {
    let ledger = test_ledger();
    ledger.db.insert_many(
        "s",
        &[
            entry(EntryType::Learning, "cache cache cache invalidation", Importance::Low),
            entry(EntryType::Learning, "the cache layer wraps the database client", Importance::Low),
            entry(EntryType::Learning, "cache", Importance::Low),
        ],
    );
    let options = SearchOptions {
        limit: 2,
        ..SearchOptions::default()
    };
    let hits = ledger.db.search("cache", &options);
    assert_eq!(hits.len(), 2);
    assert!(hits[0].score >= hits[1].score);
}

#[test]
fn deleted_sessions_disappear_from_search() {
    let ledger = seeded();
    assert_eq!(ledger.db.delete_session("s1"), 3);
    let hits = ledger.db.search("trailing", &SearchOptions::default());
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entry.session_id, "s2");
}

#[test]
fn empty_query_returns_nothing() {
    let ledger = seeded();
    assert!(ledger.db.search("   ", &SearchOptions::default()).is_empty());
}

#[test]
fn dash_prefixed_tokens_still_search() {
    let ledger = test_ledger();
    ledger.db.insert_many(
        "s",
        &[
            entry(EntryType::Learning, "use trailing commas with --force flag", Importance::Low),
            entry(EntryType::Learning, "trailing slash matters for rsync", Importance::Low),
        ],
    );
    let exact = SearchOptions {
        prefix_match: false,
        ..SearchOptions::default()
    };
    assert_eq!(ledger.db.search("trailing", &exact).len(), 2);
    assert_eq!(ledger.db.search("trailing -rsync", &exact).len(), 1);
    assert_eq!(ledger.db.search("--force", &exact).len(), 1);
    assert_eq!(ledger.db.search("commas --force", &SearchOptions::default()).len(), 1);
}
