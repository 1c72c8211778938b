//! Action descriptor compiler
//!
//! ```text
//! POST #form /submit; SWAP in #results
//! ```

use super::instruction::{Instruction, Verb};
use crate::utils::error::DslError;

/// Compile an action descriptor into an ordered instruction list.
///
/// Instructions are separated by `;` or newlines; blank segments are skipped.
pub fn compile(descriptor: &str) -> Result<Vec<Instruction>, DslError> {
    descriptor
        .split([';', '\n'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(compile_instruction)
        .collect()
}

/// Compile one `VERB [MODIFIER] ARG` instruction
pub fn compile_instruction(text: &str) -> Result<Instruction, DslError> {
    let mut tokens = text.split_whitespace();
    let verb_token = tokens.next().unwrap_or_default();
    let verb = Verb::parse(verb_token).ok_or_else(|| DslError::UnknownVerb(verb_token.to_string()))?;
    let args: Vec<&str> = tokens.collect();

    let max_args = if verb == Verb::Select { 1 } else { 2 };
    if args.len() > max_args {
        return Err(DslError::TooManyArguments {
            verb: verb.to_string(),
            count: args.len(),
        });
    }

    let (modifier, arg) = match args.as_slice() {
        [] => return Err(DslError::MissingArgument(verb.to_string())),
        [arg] => (None, *arg),
        [modifier, arg] => (Some(*modifier), *arg),
        _ => unreachable!("argument count checked above"),
    };

    if let Some(legal) = verb.legal_modifiers() {
        if let Some(modifier) = modifier {
            if !legal.contains(&modifier) {
                return Err(DslError::UnknownModifier {
                    verb: verb.to_string(),
                    modifier: modifier.to_string(),
                });
            }
        }
    }

    if modifier.is_none() && verb.requires_modifier() {
        return Err(DslError::MissingModifier(verb.to_string()));
    }

    Ok(Instruction::new(verb, arg, modifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_get_then_swap() {
        let instructions = compile("GET /x; swap #y").unwrap();
        assert_eq!(
            instructions,
            vec![
                Instruction::new(Verb::Get, "/x", None),
                Instruction::new(Verb::Swap, "#y", None),
            ]
        );
    }

    #[test]
    fn test_newline_separated_with_blanks() {
        let instructions = compile("\n  POST #form /submit\n\n  ;; INSERT after Text#note\n").unwrap();
        assert_eq!(
            instructions,
            vec![
                Instruction::new(Verb::Post, "/submit", Some("#form")),
                Instruction::new(Verb::Insert, "Text#note", Some("after")),
            ]
        );
    }

    #[test]
    fn test_append_only_accepts_in() {
        assert!(compile("APPEND in #list").is_ok());
        assert_eq!(
            compile("APPEND after #list"),
            Err(DslError::UnknownModifier {
                verb: "APPEND".into(),
                modifier: "after".into()
            })
        );
    }

    #[test]
    fn test_modifiers_are_lowercase() {
        assert!(matches!(
            compile("SWAP IN #y"),
            Err(DslError::UnknownModifier { .. })
        ));
    }

    #[test]
    fn test_insert_requires_modifier() {
        assert_eq!(
            compile("INSERT #y"),
            Err(DslError::MissingModifier("INSERT".into()))
        );
    }

    #[test]
    fn test_select_takes_one_argument() {
        assert!(compile("SELECT Text").is_ok());
        assert!(matches!(
            compile("SELECT in Text"),
            Err(DslError::TooManyArguments { count: 2, .. })
        ));
    }

    #[test]
    fn test_arity_and_verb_errors() {
        assert_eq!(compile("GET"), Err(DslError::MissingArgument("GET".into())));
        assert!(matches!(
            compile("GET a b c"),
            Err(DslError::TooManyArguments { count: 3, .. })
        ));
        assert_eq!(compile("FETCH /x"), Err(DslError::UnknownVerb("FETCH".into())));
    }
}
