//! Reader capability trait
//!
//! A [`CardReader`] is the opaque capability through which the protocol layer
//! drives a physical reader: report presence, run a selection scenario,
//! execute raw commands. Implementations wrap the actual card transport; the
//! protocol layer never deals with APDU framing or protocol activation.

use std::fmt;

use tracing::{debug, trace};

use crate::error::Error;
use crate::selection::{ReaderCommand, ReaderResponse, SelectionResult, SelectionScenario};

/// Capability trait for a local card reader
pub trait CardReader: Send + Sync + fmt::Debug {
    /// Name the reader is registered under
    fn name(&self) -> &str;

    /// Whether a card is currently present
    fn is_card_present(&self) -> Result<bool, Error>;

    /// Run a selection scenario against the inserted card
    fn process_selection(&self, scenario: &SelectionScenario) -> Result<SelectionResult, Error>;

    /// Execute one raw command and return the raw response
    ///
    /// Card operations are inherently sequential per reader; callers issue
    /// commands one at a time.
    fn transmit(&self, command: &ReaderCommand) -> Result<ReaderResponse, Error>;

    /// Execute a batch of commands in order, stopping at the first failure
    fn transmit_all(&self, commands: &[ReaderCommand]) -> Result<Vec<ReaderResponse>, Error> {
        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            trace!(reader = self.name(), command = command.as_hex(), "transmitting");
            let response = self.transmit(command);
            if let Err(e) = &response {
                debug!(reader = self.name(), error = %e, "transmission failed");
            }
            responses.push(response?);
        }
        Ok(responses)
    }
}
