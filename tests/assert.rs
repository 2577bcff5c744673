mod common;

use std::{cell::RefCell, rc::Rc};

use common::{CaptureSink, sink_ref};
use indexmap::IndexMap;
use jspy_host::{
    AssertEngine, AssertLedger, AssertRecord, Reporter, Value,
    assert::Operand,
    value::VARIADIC,
};

fn engine() -> (AssertEngine, Rc<CaptureSink>) {
    let sink = CaptureSink::new();
    let reporter = Rc::new(Reporter::new(sink_ref(&sink)));
    let ledger = Rc::new(RefCell::new(AssertLedger::new()));
    (AssertEngine::new(ledger, reporter), sink)
}

fn records(engine: &AssertEngine) -> Vec<AssertRecord> {
    engine.ledger().borrow().records().to_vec()
}

fn data(entries: &[(&str, Value)]) -> Value {
    Value::map(
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<IndexMap<_, _>>(),
    )
}

#[test]
fn chain_records_success_and_first_failure() {
    let (engine, _sink) = engine();
    let first = engine.chain("check", Value::int(5));
    first
        .equal(Value::int(5), Value::int(5))
        .expect("equal runs")
        .greater_than(Value::int(6), Value::int(5))
        .expect("greater_than runs");

    let second = engine.chain("check2", Value::int(5));
    second
        .equal(Value::int(5), Value::int(5))
        .expect("equal runs")
        .greater_than(Value::int(4), Value::int(5))
        .expect("greater_than runs");

    let records = records(&engine);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "check");
    assert!(records[0].success);
    assert_eq!(records[1].name, "check2");
    assert!(!records[1].success);
    assert_eq!(
        records[1].description.as_deref(),
        Some("[2] - '4' is not greater than '5'")
    );
    assert!(!second.status());
    assert_eq!(second.step(), 2);
}

#[test]
fn lazy_field_access_decides_the_record() {
    let (engine, _sink) = engine();
    let field_a = || Operand::lazy(|data| Ok(data.get("a").cloned().unwrap_or_else(Value::null)));
    engine
        .chain("check", data(&[("a", Value::int(1))]))
        .equal(field_a(), Value::int(1))
        .expect("equal runs");
    engine
        .chain("check2", data(&[("a", Value::int(1))]))
        .equal(field_a(), Value::int(2))
        .expect("equal runs");

    assert_eq!(
        records(&engine),
        vec![
            AssertRecord {
                name: "check".to_string(),
                success: true,
                description: None,
            },
            AssertRecord {
                name: "check2".to_string(),
                success: false,
                description: Some("[1] - Expected '1', received '2'".to_string()),
            },
        ]
    );
}

#[test]
fn failure_is_sticky_across_later_passing_steps() {
    let (engine, _sink) = engine();
    let chain = engine.chain("sticky", Value::null());
    chain
        .is_true(Value::bool(false))
        .expect("is_true runs")
        .is_true(Value::bool(true))
        .expect("is_true runs")
        .equal(Value::string("a"), Value::string("b"))
        .expect("equal runs");

    let records = records(&engine);
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(
        records[0].description.as_deref(),
        Some("[1] - Value 'false' is not true")
    );
    assert_eq!(chain.message().as_deref(), Some("[1] - Value 'false' is not true"));
}

#[test]
fn failed_record_is_not_overwritten_by_a_later_chain() {
    let (engine, _sink) = engine();
    engine
        .chain("shared", Value::null())
        .not_equal(Value::int(1), Value::int(1))
        .expect("not_equal runs");
    engine
        .chain("shared", Value::null())
        .equal(Value::int(1), Value::int(1))
        .expect("equal runs");

    let records = records(&engine);
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(
        records[0].description.as_deref(),
        Some("[1] - Expected '1' is the same as received '1'")
    );
}

#[test]
fn ledger_upsert_keeps_one_record_per_name() {
    let mut ledger = AssertLedger::new();
    ledger.upsert("a", true, None);
    ledger.upsert("a", true, None);
    ledger.upsert("b", false, Some("broken".to_string()));
    ledger.upsert("b", true, None);

    assert_eq!(ledger.len(), 2);
    assert!(ledger.get("a").is_some_and(|record| record.success));
    assert_eq!(
        ledger.get("b").and_then(|record| record.description.clone()),
        Some("broken".to_string())
    );
    assert_eq!((ledger.passed(), ledger.failed()), (1, 1));
}

#[test]
fn condition_form_always_appends() {
    let (engine, sink) = engine();
    assert!(engine.assert("flag", Value::bool(true)).is_none());
    assert!(engine.assert("flag", Value::bool(false)).is_none());
    assert!(engine.assert("chain", Value::int(1)).is_some());

    let records = records(&engine);
    assert_eq!(records.len(), 2);
    assert!(records[0].success);
    assert!(!records[1].success);
    assert!(sink.contains("success | flag"));
    assert!(sink.contains("fail    | flag"));
}

#[test]
fn lazy_operands_resolve_against_data_context() {
    let (engine, _sink) = engine();
    let payload = data(&[("count", Value::int(3)), ("label", Value::string("ok"))]);
    let chain = engine.chain("lazy", payload);

    let count = Value::native("count", 1, |args| {
        Ok(args[0].get("count").cloned().unwrap_or_else(Value::null))
    });
    chain
        .equal(Value::int(3), count)
        .expect("equal runs")
        .equal(
            Operand::lazy(|data| Ok(data.get("label").cloned().unwrap_or_else(Value::null))),
            Value::string("ok"),
        )
        .expect("equal runs")
        .between(
            Operand::lazy(|data| Ok(data.get("count").cloned().unwrap_or_else(Value::null))),
            Value::int(1),
            Value::float(3.0),
        )
        .expect("between runs");

    assert!(chain.status());
    assert_eq!(chain.step(), 4);
    assert!(records(&engine)[0].success);
}

#[test]
fn operand_errors_propagate() {
    let (engine, _sink) = engine();
    let failing = Value::native("failing", VARIADIC, |_| {
        Err(jspy_host::HostError::runtime("boom"))
    });
    let result = engine
        .chain("errors", Value::null())
        .equal(Value::int(1), failing)
        .map(|_| ());
    assert!(result.is_err());
}

#[test]
fn comparison_messages_describe_the_failing_step() {
    let (engine, _sink) = engine();
    let chain = engine.chain("ranges", Value::null());
    chain
        .less_or_equal_than(Value::int(2), Value::int(3))
        .expect("less_or_equal_than runs")
        .in_range(Value::int(10), Value::int(1), Value::int(5))
        .expect("in_range runs");

    assert_eq!(
        chain.message().as_deref(),
        Some("[2] - '10' is NOT in range of 1 and 5")
    );
}

#[test]
fn show_asserts_renders_a_table() {
    let (engine, sink) = engine();
    engine.condition("first", true);
    engine
        .chain("second", Value::null())
        .is_false(Value::bool(true))
        .expect("is_false runs");
    engine.show_asserts();

    let table = sink.lines().last().cloned().expect("table was written");
    let rows: Vec<&str> = table.lines().collect();
    assert_eq!(rows.len(), 6);
    assert!(rows[1].contains("(index)") && rows[1].contains("status"));
    assert!(rows[3].contains("success") && rows[3].contains("first"));
    assert!(rows[4].contains("fail"));
    assert!(rows[4].contains("second: [1] - Value 'true' is not false"));
}

#[test]
fn reporter_skips_consecutive_duplicates() {
    let sink = CaptureSink::new();
    let reporter = Reporter::new(sink_ref(&sink));
    reporter.report(jspy_host::log::ActivityLevel::Info, "same");
    reporter.report(jspy_host::log::ActivityLevel::Info, "same");
    reporter.report(jspy_host::log::ActivityLevel::Info, "other");
    reporter.report(jspy_host::log::ActivityLevel::Info, "same");

    let lines = sink.lines();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("| ") && lines[0].ends_with("| info    | same"));
}
