mod helpers;

use helpers::{at_minute, entry, test_ledger};
use ledger::config::RestorationConfig;
use ledger::entries::types::{Entry, EntryType, Importance};
use ledger::restore::{RestorationEngine, NO_CONTEXT};

#[test]
fn tier2_is_bounded_and_most_recent() {
    let ledger = test_ledger();
    let learnings: Vec<Entry> = (0..50)
        .map(|i| at_minute(entry(EntryType::Learning, &format!("learning {i}"), Importance::Low), i))
        .collect();
    ledger.db.insert_many("s", &learnings);

    let tier2 = ledger.db.query_tier2("s", 5, 10, 5);
    let contents: Vec<&str> = tier2.learnings.iter().map(|e| e.entry.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["learning 49", "learning 48", "learning 47", "learning 46", "learning 45"]
    );
}

#[test]
fn tier1_returns_every_guideline_and_plan() {
    let ledger = test_ledger();
    let mut entries = Vec::new();
    for i in 0..40 {
        entries.push(at_minute(entry(EntryType::Guideline, &format!("guideline {i}"), Importance::Low), i));
    }
    for i in 0..3 {
        entries.push(at_minute(entry(EntryType::ImplementationPlan, &format!("plan {i}"), Importance::Medium), i));
    }
    for i in 0..20 {
        entries.push(at_minute(entry(EntryType::Decision, &format!("decision {i}"), Importance::High), i));
    }
    ledger.db.insert_many("s", &entries);

    let tier1 = ledger.db.query_tier1("s", 10);
    assert_eq!(tier1.guidelines.len(), 40);
    assert_eq!(tier1.implementation_plans.len(), 3);
    assert_eq!(tier1.decisions.len(), 10);
    assert_eq!(tier1.decisions[0].entry.content, "decision 19");
}

#[test]
fn medium_and_high_decisions_land_in_different_tiers() {
    let ledger = test_ledger();
    ledger.db.insert_many(
        "s",
        &[
            entry(EntryType::Decision, "high one", Importance::High),
            entry(EntryType::Decision, "medium one", Importance::Medium),
            entry(EntryType::Decision, "low one", Importance::Low),
        ],
    );
    let engine = RestorationEngine::new(ledger.db.clone(), RestorationConfig::default());
    let payload = engine.restore("s");
    assert_eq!(payload.tier1.decisions.len(), 1);
    assert_eq!(payload.tier1.decisions[0].entry.content, "high one");
    assert_eq!(payload.tier2.decisions.len(), 1);
    assert_eq!(payload.tier2.decisions[0].entry.content, "medium one");
    assert_eq!(payload.len(), 2);
}

#[test]
fn sessions_are_isolated() {
    let ledger = test_ledger();
    ledger.db.insert("other", &entry(EntryType::Guideline, "not mine", Importance::High));
    let engine = RestorationEngine::new(ledger.db.clone(), RestorationConfig::default());
    assert_eq!(engine.render("mine"), NO_CONTEXT);
    assert!(engine.render("other").contains("not mine"));
}

#[test]
fn restores_what_was_flushed() {
    let ledger = test_ledger();
    ledger.buffer.append_many(
        "s",
        &[
            entry(EntryType::Guideline, "Use cargo nextest", Importance::Medium),
            entry(EntryType::FileEdit, "src/buffer/mod.rs", Importance::Low),
        ],
    );
    // Nothing restored before the flush
    let engine = RestorationEngine::new(ledger.db.clone(), RestorationConfig::default());
    assert!(engine.restore("s").is_empty());

    assert!(ledger.buffer.flush_sync("s").success);
    let text = engine.render("s");
    assert!(text.contains("Use cargo nextest"));
    assert!(text.contains("src/buffer/mod.rs"));
}
