// Prompt and structured-output schema for the insight request.
//
// Only names and whether each person has drawn are sent. Who drew whom
// never leaves the app.

use serde_json::{json, Value};

use amigo_core::participant::Participant;

/// Per-participant summary sent to the model.
fn participant_summary(participants: &[Participant]) -> Value {
    Value::Array(
        participants
            .iter()
            .map(|p| json!({ "name": p.name, "hasDrawn": p.has_secret_assigned }))
            .collect(),
    )
}

/// The user prompt for a group of participants.
pub fn build_prompt(participants: &[Participant]) -> String {
    let drawn = participants.iter().filter(|p| p.has_secret_assigned).count();
    format!(
        "Analyze this Secret Santa (Amigo Secreto) group and the draw status of each friend: {}\n\
         {drawn} of {} have already drawn.\n\
         Write a creative summary of the group, one funny fact, and a fun recommendation for the event.",
        participant_summary(participants),
        participants.len(),
    )
}

/// JSON schema the model must answer with. All three fields are required
/// strings.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
            "funnyFact": { "type": "STRING" },
            "recommendation": { "type": "STRING" }
        },
        "required": ["summary", "funnyFact", "recommendation"]
    })
}

/// Full `generateContent` request body.
pub fn request_body(participants: &[Participant]) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": build_prompt(participants) }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema()
        }
    })
}
