use serde::Deserialize;
use serde_json::Value;

/// Shapes the inference backend is known to answer with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceReply {
    /// `{"answer": "..."}`
    Answer(String),
    /// `{"choices": [{"message": {"content": "..."}}]}`
    Choice(String),
    Empty,
}

#[derive(Deserialize)]
struct AnswerShape {
    answer: String,
}

#[derive(Deserialize)]
struct ChoicesShape {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl InferenceReply {
    /// An empty `answer` falls through to `choices`.
    pub fn from_value(value: &Value) -> Self {
        if let Ok(AnswerShape { answer }) = AnswerShape::deserialize(value) {
            if !answer.is_empty() {
                return InferenceReply::Answer(answer);
            }
        }

        match ChoicesShape::deserialize(value) {
            Ok(shape) => match shape.choices.into_iter().next() {
                Some(choice) if !choice.message.content.is_empty() => {
                    InferenceReply::Choice(choice.message.content)
                }
                _ => InferenceReply::Empty,
            },
            Err(_) => InferenceReply::Empty,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            InferenceReply::Answer(text) | InferenceReply::Choice(text) => text,
            InferenceReply::Empty => String::new(),
        }
    }
}
