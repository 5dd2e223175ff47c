//! Decision-reply contract: strict at the envelope, lenient at the entries.
//!
//! A reply must be a JSON object with exactly `conversation` and `commands`.
//! Individual command entries that do not match the `{name, args}` shape are
//! dropped with a warning; unknown action names are kept here and skipped at
//! dispatch time, so one odd entry never invalidates the whole reply.

use serde::{Deserialize, Serialize};

/// One requested action from the decision service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CommandRequest {
    pub name: String,
    #[serde(default)]
    pub args: Vec<CommandArg>,
}

/// Primitive argument as the wire allows: a number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CommandArg {
    Number(f64),
    Text(String),
}

impl CommandArg {
    /// Numeric view. Numeric strings coerce, matching the replies models
    /// actually produce.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CommandArg::Number(n) => Some(*n),
            CommandArg::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CommandArg::Text(s) => Some(s),
            CommandArg::Number(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionReply {
    pub conversation: String,
    pub commands: Vec<CommandRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyParseError {
    InvalidJson,
    NotAnObject,
    MissingField(&'static str),
    UnexpectedField(String),
    FieldType(&'static str),
}

impl std::fmt::Display for ReplyParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplyParseError::InvalidJson => write!(f, "reply is not valid json"),
            ReplyParseError::NotAnObject => write!(f, "reply is not a json object"),
            ReplyParseError::MissingField(field) => {
                write!(f, "reply missing required field: {field}")
            }
            ReplyParseError::UnexpectedField(field) => {
                write!(f, "reply has unexpected field: {field}")
            }
            ReplyParseError::FieldType(field) => {
                write!(f, "reply field has the wrong type: {field}")
            }
        }
    }
}

impl std::error::Error for ReplyParseError {}

/// Parses raw decision-service text (already fence-stripped) into a reply.
pub fn parse_reply(raw: &str) -> Result<DecisionReply, ReplyParseError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|_| ReplyParseError::InvalidJson)?;
    let obj = value.as_object().ok_or(ReplyParseError::NotAnObject)?;

    for key in obj.keys() {
        if key != "conversation" && key != "commands" {
            return Err(ReplyParseError::UnexpectedField(key.clone()));
        }
    }

    let conversation = obj
        .get("conversation")
        .ok_or(ReplyParseError::MissingField("conversation"))?
        .as_str()
        .ok_or(ReplyParseError::FieldType("conversation"))?
        .to_string();

    let entries = obj
        .get("commands")
        .ok_or(ReplyParseError::MissingField("commands"))?
        .as_array()
        .ok_or(ReplyParseError::FieldType("commands"))?;

    let mut commands = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<CommandRequest>(entry.clone()) {
            Ok(cmd) => commands.push(cmd),
            Err(err) => {
                tracing::warn!(entry = %entry, "dropping malformed command entry: {err}");
            }
        }
    }

    Ok(DecisionReply {
        conversation,
        commands,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_field_reply() {
        let reply = parse_reply(
            r#"{"conversation":"Heading over.","commands":[{"name":"move","args":[10,64,10]}]}"#,
        )
        .unwrap();

        assert_eq!(reply.conversation, "Heading over.");
        assert_eq!(reply.commands.len(), 1);
        assert_eq!(reply.commands[0].name, "move");
        assert_eq!(
            reply.commands[0].args,
            vec![
                CommandArg::Number(10.0),
                CommandArg::Number(64.0),
                CommandArg::Number(10.0)
            ]
        );
    }

    #[test]
    fn args_default_to_empty() {
        let reply = parse_reply(r#"{"conversation":"ok","commands":[{"name":"jump"}]}"#).unwrap();
        assert!(reply.commands[0].args.is_empty());
    }

    #[test]
    fn drops_structurally_invalid_entries_keeps_rest() {
        let reply = parse_reply(
            r#"{"conversation":"ok","commands":[{"name":"jump","args":[]},42,{"args":[1]},{"name":"break","args":[0,60,0]}]}"#,
        )
        .unwrap();

        let names: Vec<&str> = reply.commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["jump", "break"]);
    }

    #[test]
    fn keeps_unknown_action_names_at_parse_time() {
        let reply =
            parse_reply(r#"{"conversation":"ok","commands":[{"name":"fly","args":[]}]}"#).unwrap();
        assert_eq!(reply.commands[0].name, "fly");
    }

    #[test]
    fn rejects_invalid_json() {
        assert_eq!(
            parse_reply("not json at all").unwrap_err(),
            ReplyParseError::InvalidJson
        );
    }

    #[test]
    fn rejects_non_object_reply() {
        assert_eq!(
            parse_reply(r#"["conversation"]"#).unwrap_err(),
            ReplyParseError::NotAnObject
        );
    }

    #[test]
    fn rejects_missing_field() {
        assert_eq!(
            parse_reply(r#"{"conversation":"hi"}"#).unwrap_err(),
            ReplyParseError::MissingField("commands")
        );
        assert_eq!(
            parse_reply(r#"{"commands":[]}"#).unwrap_err(),
            ReplyParseError::MissingField("conversation")
        );
    }

    #[test]
    fn rejects_extra_top_level_field() {
        assert_eq!(
            parse_reply(r#"{"conversation":"hi","commands":[],"mood":"upbeat"}"#).unwrap_err(),
            ReplyParseError::UnexpectedField("mood".to_string())
        );
    }

    #[test]
    fn rejects_wrong_field_types() {
        assert_eq!(
            parse_reply(r#"{"conversation":2,"commands":[]}"#).unwrap_err(),
            ReplyParseError::FieldType("conversation")
        );
        assert_eq!(
            parse_reply(r#"{"conversation":"hi","commands":"move"}"#).unwrap_err(),
            ReplyParseError::FieldType("commands")
        );
    }

    #[test]
    fn numeric_strings_coerce() {
        assert_eq!(CommandArg::Text("10.5".to_string()).as_f64(), Some(10.5));
        assert_eq!(CommandArg::Text(" 64 ".to_string()).as_f64(), Some(64.0));
        assert_eq!(CommandArg::Text("stone".to_string()).as_f64(), None);
        assert_eq!(CommandArg::Number(3.0).as_str(), None);
    }
}
