//! One session's path from raw text to a tagged result

use crate::command::executor::{ActionResult, Dispatcher};
use crate::core::types::{SessionId, Utterance};
use crate::llm::context::SessionContext;
use crate::llm::extractor::IntentExtractor;
use crate::llm::parser::Intent;
use tracing::{debug, info, warn};

/// Extractor, dispatcher and the session history they share
///
/// `handle` takes `&mut self`, so a session never has two commands in flight.
pub struct Assistant {
    extractor: IntentExtractor,
    dispatcher: Dispatcher,
    context: SessionContext,
    session: SessionId,
}

impl Assistant {
    pub fn new(extractor: IntentExtractor, dispatcher: Dispatcher, history_len: usize) -> Self {
        Self {
            extractor,
            dispatcher,
            context: SessionContext::new(history_len),
            session: SessionId::new(),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Wrap raw input as an utterance of this session
    pub fn utterance(&self, text: &str) -> Utterance {
        Utterance::new(self.session, text)
    }

    /// Extract, dispatch and record one utterance
    ///
    /// Errors never escape: a failed extraction becomes an unsuccessful
    /// result and is not recorded in the history.
    pub async fn handle(&mut self, utterance: Utterance) -> ActionResult {
        info!(utterance = %utterance.id(), text = utterance.text(), "handling utterance");
        let intent = match self.extractor.extract(&utterance, &self.context).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!(utterance = %utterance.id(), error = %e, "extraction failed");
                return ActionResult::from_error(utterance.id(), &e);
            }
        };
        self.handle_intent(utterance, intent).await
    }

    /// Dispatch and record an intent the caller already knows
    ///
    /// Used by front-end shortcuts that need no model call.
    pub async fn handle_intent(&mut self, utterance: Utterance, intent: Intent) -> ActionResult {
        debug!(utterance = %utterance.id(), action = %intent.action, "dispatching");
        let result = self.dispatcher.dispatch(&utterance, &intent).await;
        self.context.record(utterance, intent, &result);
        result
    }

    /// Convenience for callers holding plain text
    pub async fn handle_text(&mut self, text: &str) -> ActionResult {
        let utterance = self.utterance(text);
        self.handle(utterance).await
    }
}
