use futures::{ stream, StreamExt };

use crate::config::prompt::{ PromptSelection, PromptSelector };
use crate::llm::chat::CompletionRouter;
use crate::llm::BackendKind;
use crate::models::chat::{ ChatMessage, GenerationParams, Turn };
use crate::models::stream::{ Fragment, FragmentStream };

pub const EMERGENCY_WARNING: &str = "⚠️ **POTENTIAL EMERGENCY DETECTED**... \n\n";

/// A consultation ready to be sent to the active backend.
#[derive(Debug, Clone)]
pub struct PreparedConsultation {
    pub selection: PromptSelection,
    pub conversation: Vec<ChatMessage>,
}

pub struct Consultation {
    prompts: PromptSelector,
    completions: CompletionRouter,
    max_history: usize,
    params: GenerationParams,
}

impl Consultation {
    pub fn new(prompts: PromptSelector, completions: CompletionRouter, max_history: usize) -> Self {
        Self {
            prompts,
            completions,
            max_history,
            params: GenerationParams::default(),
        }
    }

    pub fn active_backend(&self) -> Option<BackendKind> {
        self.completions.active_backend()
    }

    pub fn prepare(
        &self,
        message: &str,
        history: &[Turn],
        patient_type: Option<&str>
    ) -> PreparedConsultation {
        let selection = self.prompts.select(message, patient_type);
        let conversation = build_conversation(
            &selection.variant.text(),
            history,
            self.max_history,
            message
        );
        PreparedConsultation { selection, conversation }
    }

    /// Optional emergency warning, then the backend's fragments untouched.
    pub fn run_consultation(
        &self,
        message: &str,
        history: &[Turn],
        patient_type: Option<&str>
    ) -> FragmentStream {
        let prepared = self.prepare(message, history, patient_type);
        let warning = prepared.selection.is_emergency
            .then(|| Fragment::Text(EMERGENCY_WARNING.to_string()));
        let reply = self.completions.stream_completion(prepared.conversation, self.params);
        Box::pin(stream::iter(warning).chain(reply))
    }
}

/// System prompt, the last `max_history` turns in order, then the new message.
pub fn build_conversation(
    system_prompt: &str,
    history: &[Turn],
    max_history: usize,
    message: &str
) -> Vec<ChatMessage> {
    let kept = &history[history.len().saturating_sub(max_history)..];
    let mut conversation = Vec::with_capacity(kept.len() * 2 + 2);
    conversation.push(ChatMessage::system(system_prompt));
    for turn in kept {
        conversation.push(ChatMessage::user(turn.user()));
        conversation.push(ChatMessage::assistant(turn.assistant()));
    }
    conversation.push(ChatMessage::user(message));
    conversation
}
