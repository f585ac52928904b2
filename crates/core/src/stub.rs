//! Stub reader for tests and examples
//!
//! Emulates a reader with an inserted card through a table of simulated
//! hex command/response pairs and a configurable selection outcome.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::Error;
use crate::reader::CardReader;
use crate::selection::{ReaderCommand, ReaderResponse, SelectionResult, SelectionScenario};

/// A reader emulation backed by canned responses
#[derive(Debug)]
pub struct StubReader {
    name: String,
    state: Mutex<StubState>,
}

#[derive(Debug, Default)]
struct StubState {
    card_present: bool,
    selection: Option<SelectionResult>,
    simulated: HashMap<String, String>,
}

impl StubReader {
    /// Create a stub reader with no card inserted
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(StubState::default()),
        }
    }

    /// Set whether a card is present
    pub fn with_card_present(self, present: bool) -> Self {
        self.state.lock().card_present = present;
        self
    }

    /// Configure the outcome of selection scenarios
    pub fn with_selection_result(self, result: SelectionResult) -> Self {
        self.state.lock().selection = Some(result);
        self
    }

    /// Register a simulated command/response pair (hex encoded)
    pub fn with_simulated_command(self, command: &str, response: &str) -> Self {
        self.state
            .lock()
            .simulated
            .insert(canonical_hex(command), response.to_owned());
        self
    }

    /// Simulate a card insertion
    pub fn insert_card(&self) {
        self.state.lock().card_present = true;
    }

    /// Simulate a card removal
    pub fn remove_card(&self) {
        self.state.lock().card_present = false;
    }
}

fn canonical_hex(data: &str) -> String {
    match hex::decode(data) {
        Ok(bytes) => hex::encode_upper(bytes),
        Err(_) => data.to_uppercase(),
    }
}

impl CardReader for StubReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_card_present(&self) -> Result<bool, Error> {
        Ok(self.state.lock().card_present)
    }

    fn process_selection(&self, _scenario: &SelectionScenario) -> Result<SelectionResult, Error> {
        let state = self.state.lock();
        if !state.card_present {
            return Err(Error::reader(format!("no card present in {}", self.name)));
        }
        Ok(state
            .selection
            .clone()
            .unwrap_or_else(SelectionResult::no_match))
    }

    fn transmit(&self, command: &ReaderCommand) -> Result<ReaderResponse, Error> {
        let state = self.state.lock();
        if !state.card_present {
            return Err(Error::reader(format!("no card present in {}", self.name)));
        }
        state
            .simulated
            .get(&canonical_hex(command.as_hex()))
            .map(|response| ReaderResponse::new(response.clone()))
            .ok_or_else(|| {
                Error::reader(format!(
                    "unexpected command {} on {}",
                    command.as_hex(),
                    self.name
                ))
            })
    }
}
