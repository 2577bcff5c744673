//! Script assertions: a flat condition form and a fluent chain form, both
//! recorded in one name-keyed ledger per evaluation.

use std::{cell::RefCell, cmp::Ordering, rc::Rc};

use crate::{
    error::Result,
    log::{ActivityLevel, Reporter},
    value::Value,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertRecord {
    pub name: String,
    pub success: bool,
    pub description: Option<String>,
}

impl AssertRecord {
    pub fn status_label(&self) -> &'static str {
        if self.success { "success" } else { "fail" }
    }

    pub fn label(&self) -> String {
        match &self.description {
            Some(description) if !description.is_empty() => {
                format!("{}: {description}", self.name)
            }
            _ => self.name.clone(),
        }
    }
}

/// Assertion outcomes in append order. A failed record never turns back into a
/// success while the ledger lives.
#[derive(Debug, Default)]
pub struct AssertLedger {
    records: Vec<AssertRecord>,
}

pub type LedgerRef = Rc<RefCell<AssertLedger>>;

impl AssertLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: AssertRecord) {
        self.records.push(record);
    }

    pub fn upsert(&mut self, name: &str, success: bool, description: Option<String>) {
        match self.records.iter_mut().find(|record| record.name == name) {
            Some(existing) if existing.success => {
                existing.success = success;
                existing.description = description;
            }
            Some(_) => {}
            None => self.records.push(AssertRecord {
                name: name.to_string(),
                success,
                description,
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AssertRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    pub fn records(&self) -> &[AssertRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn passed(&self) -> usize {
        self.records.iter().filter(|record| record.success).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.passed()
    }

    /// Renders an index/status/assert table.
    pub fn render_table(&self) -> String {
        let header = ["(index)", "status", "assert"];
        let rows: Vec<[String; 3]> = self
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                [
                    index.to_string(),
                    record.status_label().to_string(),
                    record.label(),
                ]
            })
            .collect();

        let mut widths = header.map(|title| title.chars().count());
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let rule = |left: &str, middle: &str, right: &str| {
            let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("{left}{}{right}", segments.join(middle))
        };
        let line = |cells: [&str; 3]| {
            let padded: Vec<String> = cells
                .iter()
                .zip(widths)
                .map(|(cell, width)| {
                    let pad = width - cell.chars().count();
                    format!(" {cell}{} ", " ".repeat(pad))
                })
                .collect();
            format!("│{}│", padded.join("│"))
        };

        let mut out = vec![rule("┌", "┬", "┐"), line(header), rule("├", "┼", "┤")];
        for row in &rows {
            out.push(line([row[0].as_str(), row[1].as_str(), row[2].as_str()]));
        }
        out.push(rule("└", "┴", "┘"));
        out.join("\n")
    }
}

/// A comparison operand. Callables are resolved against the chain's data
/// context right before the comparison runs.
pub enum Operand<'a> {
    Value(Value),
    Lazy(Box<dyn FnOnce(&Value) -> Result<Value> + 'a>),
}

impl<'a> Operand<'a> {
    pub fn lazy(resolve: impl FnOnce(&Value) -> Result<Value> + 'a) -> Self {
        Self::Lazy(Box::new(resolve))
    }

    fn resolve(self, data: &Value) -> Result<Value> {
        match self {
            Self::Value(value) => match value.as_function() {
                Some(function) => function.call(std::slice::from_ref(data)),
                None => Ok(value),
            },
            Self::Lazy(resolve) => resolve(data),
        }
    }
}

impl From<Value> for Operand<'_> {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

struct ChainState {
    name: String,
    data: Value,
    step: usize,
    status: bool,
    message: Option<String>,
}

/// Fluent assertion group. Each passing step advances the step counter; the
/// first failing step freezes the status and its message.
#[derive(Clone)]
pub struct AssertChain {
    state: Rc<RefCell<ChainState>>,
    ledger: LedgerRef,
    reporter: Rc<Reporter>,
}

impl AssertChain {
    fn new(name: &str, data: Value, ledger: LedgerRef, reporter: Rc<Reporter>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ChainState {
                name: name.to_string(),
                data,
                step: 1,
                status: true,
                message: None,
            })),
            ledger,
            reporter,
        }
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    pub fn status(&self) -> bool {
        self.state.borrow().status
    }

    pub fn message(&self) -> Option<String> {
        self.state.borrow().message.clone()
    }

    pub fn step(&self) -> usize {
        self.state.borrow().step
    }

    pub fn equal<'a>(
        &self,
        expected: impl Into<Operand<'a>>,
        received: impl Into<Operand<'a>>,
    ) -> Result<&Self> {
        self.check(
            vec![expected.into(), received.into()],
            |v| v[0] == v[1],
            |v| format!("Expected '{}', received '{}'", v[0], v[1]),
        )
    }

    pub fn not_equal<'a>(
        &self,
        expected: impl Into<Operand<'a>>,
        received: impl Into<Operand<'a>>,
    ) -> Result<&Self> {
        self.check(
            vec![expected.into(), received.into()],
            |v| v[0] != v[1],
            |v| format!("Expected '{}' is the same as received '{}'", v[0], v[1]),
        )
    }

    pub fn is_true<'a>(&self, value: impl Into<Operand<'a>>) -> Result<&Self> {
        self.check(
            vec![value.into()],
            |v| v[0].as_bool() == Some(true),
            |v| format!("Value '{}' is not true", v[0]),
        )
    }

    pub fn is_false<'a>(&self, value: impl Into<Operand<'a>>) -> Result<&Self> {
        self.check(
            vec![value.into()],
            |v| v[0].as_bool() == Some(false),
            |v| format!("Value '{}' is not false", v[0]),
        )
    }

    pub fn greater_than<'a>(
        &self,
        left: impl Into<Operand<'a>>,
        right: impl Into<Operand<'a>>,
    ) -> Result<&Self> {
        self.check(
            vec![left.into(), right.into()],
            |v| v[0].compare(&v[1]) == Some(Ordering::Greater),
            |v| format!("'{}' is not greater than '{}'", v[0], v[1]),
        )
    }

    pub fn greater_or_equal_than<'a>(
        &self,
        left: impl Into<Operand<'a>>,
        right: impl Into<Operand<'a>>,
    ) -> Result<&Self> {
        self.check(
            vec![left.into(), right.into()],
            |v| v[0].compare(&v[1]).is_some_and(Ordering::is_ge),
            |v| format!("'{}' is not greater (or equal) than '{}'", v[0], v[1]),
        )
    }

    pub fn less_than<'a>(
        &self,
        left: impl Into<Operand<'a>>,
        right: impl Into<Operand<'a>>,
    ) -> Result<&Self> {
        self.check(
            vec![left.into(), right.into()],
            |v| v[0].compare(&v[1]) == Some(Ordering::Less),
            |v| format!("'{}' is not lesser than '{}'", v[0], v[1]),
        )
    }

    pub fn less_or_equal_than<'a>(
        &self,
        left: impl Into<Operand<'a>>,
        right: impl Into<Operand<'a>>,
    ) -> Result<&Self> {
        self.check(
            vec![left.into(), right.into()],
            |v| v[0].compare(&v[1]).is_some_and(Ordering::is_le),
            |v| format!("'{}' is not lesser (or equal) than '{}'", v[0], v[1]),
        )
    }

    pub fn between<'a>(
        &self,
        value: impl Into<Operand<'a>>,
        min: impl Into<Operand<'a>>,
        max: impl Into<Operand<'a>>,
    ) -> Result<&Self> {
        self.check(
            vec![value.into(), min.into(), max.into()],
            |v| {
                v[0].compare(&v[1]).is_some_and(Ordering::is_ge)
                    && v[0].compare(&v[2]).is_some_and(Ordering::is_le)
            },
            |v| format!("'{}' is NOT in range of {} and {}", v[0], v[1], v[2]),
        )
    }

    pub fn in_range<'a>(
        &self,
        value: impl Into<Operand<'a>>,
        min: impl Into<Operand<'a>>,
        max: impl Into<Operand<'a>>,
    ) -> Result<&Self> {
        self.between(value, min, max)
    }

    fn check(
        &self,
        operands: Vec<Operand<'_>>,
        predicate: impl FnOnce(&[Value]) -> bool,
        describe: impl FnOnce(&[Value]) -> String,
    ) -> Result<&Self> {
        let data = self.state.borrow().data.clone();
        let values = operands
            .into_iter()
            .map(|operand| operand.resolve(&data))
            .collect::<Result<Vec<_>>>()?;
        let passed = predicate(&values);

        let mut state = self.state.borrow_mut();
        if passed {
            self.reporter.report(ActivityLevel::Success, &state.name);
            if state.status {
                state.step += 1;
                self.ledger.borrow_mut().upsert(&state.name, true, None);
            }
            return Ok(self);
        }

        let message = format!("[{}] - {}", state.step, describe(&values));
        self.reporter
            .report(ActivityLevel::Fail, &format!("{} : {message}", state.name));
        if state.status {
            state.status = false;
            self.ledger
                .borrow_mut()
                .upsert(&state.name, false, Some(message.clone()));
            state.message = Some(message);
        }
        Ok(self)
    }
}

/// Entry point behind the `assert` host function.
#[derive(Clone)]
pub struct AssertEngine {
    ledger: LedgerRef,
    reporter: Rc<Reporter>,
}

impl AssertEngine {
    pub fn new(ledger: LedgerRef, reporter: Rc<Reporter>) -> Self {
        Self { ledger, reporter }
    }

    pub fn ledger(&self) -> &LedgerRef {
        &self.ledger
    }

    /// Appends one record immediately.
    pub fn condition(&self, name: &str, success: bool) {
        let level = if success {
            ActivityLevel::Success
        } else {
            ActivityLevel::Fail
        };
        self.reporter.report(level, name);
        self.ledger.borrow_mut().push(AssertRecord {
            name: name.to_string(),
            success,
            description: None,
        });
    }

    pub fn chain(&self, name: &str, data: Value) -> AssertChain {
        AssertChain::new(
            name,
            data,
            Rc::clone(&self.ledger),
            Rc::clone(&self.reporter),
        )
    }

    /// Booleans take the condition form; any other value starts a chain over it.
    pub fn assert(&self, name: &str, data: Value) -> Option<AssertChain> {
        match data.as_bool() {
            Some(success) => {
                self.condition(name, success);
                None
            }
            None => Some(self.chain(name, data)),
        }
    }

    pub fn show_asserts(&self) {
        let table = self.ledger.borrow().render_table();
        self.reporter.sink().info(&table);
    }
}
