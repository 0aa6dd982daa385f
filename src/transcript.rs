//! Client-side transcript reduction.

use crate::model::Message;

/// Fold one streamed text fragment into the transcript.
///
/// The fragment extends the trailing assistant message when there is one;
/// otherwise it starts a new assistant message. Concatenation is verbatim.
pub fn coalesce(mut transcript: Vec<Message>, fragment: &str) -> Vec<Message> {
    match transcript.last_mut() {
        Some(last) if last.is_assistant() => last.content.push_str(fragment),
        _ => transcript.push(Message::assistant(fragment)),
    }
    transcript
}
