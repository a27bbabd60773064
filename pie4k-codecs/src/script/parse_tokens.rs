//! On-disk token stream -> [`Script`] AST (§4.4.1): strict on the outer
//! envelope, tolerant on inner counts, never aborts on a malformed block.

use super::ast::{Action, Block, ObjectSelector, Response, Script, Trigger};
use super::tokens::{tokenize, Token, TokenCursor};
use pie4k_types::{PieError, PieResult};

pub fn parse_script(source: &str) -> PieResult<Script> {
    let tokens = tokenize(source);
    let mut cur = TokenCursor::new(&tokens);

    if !cur.expect_word("SC") {
        return Err(PieError::DecodeError("script missing opening SC".into()));
    }

    let mut blocks = Vec::new();
    while cur.peek_word() != Some("SC") && !cur.at_end() {
        match parse_block(&mut cur) {
            Ok(block) => blocks.push(block),
            Err(_) => {
                // Malformed block: advance until the next CR and continue,
                // never abort the whole script (§4.4.1).
                cur.skip_until("CR");
            }
        }
    }
    cur.expect_word("SC");

    Ok(Script { blocks })
}

fn parse_block(cur: &mut TokenCursor) -> PieResult<Block> {
    if !cur.expect_word("CR") {
        return Err(PieError::DecodeError("expected CR".into()));
    }

    let triggers = parse_trigger_list(cur)?;
    let responses = parse_response_list(cur)?;

    cur.expect_word("CR");
    Ok(Block { triggers, responses })
}

fn parse_trigger_list(cur: &mut TokenCursor) -> PieResult<Vec<Trigger>> {
    if !cur.expect_word("CO") {
        return Err(PieError::DecodeError("expected CO".into()));
    }
    let mut triggers = Vec::new();
    while cur.peek_word() == Some("TR") {
        cur.advance();
        triggers.push(parse_trigger(cur));
        cur.expect_word("TR");
    }
    cur.expect_word("CO");
    Ok(triggers)
}

fn parse_trigger(cur: &mut TokenCursor) -> Trigger {
    let opcode = cur.read_int();
    let params = [
        cur.read_int(),
        cur.read_int(),
        cur.read_int(),
        cur.read_int(),
        cur.read_int(),
    ];
    let strings = [cur.read_string(), cur.read_string()];
    let object = parse_object(cur);
    Trigger {
        opcode,
        params,
        strings,
        object,
        negated: false,
    }
}

fn parse_response_list(cur: &mut TokenCursor) -> PieResult<Vec<Response>> {
    if !cur.expect_word("RS") {
        return Err(PieError::DecodeError("expected RS".into()));
    }
    let mut responses = Vec::new();
    while cur.peek_word() == Some("RE") {
        cur.advance();
        responses.push(parse_response(cur));
        cur.expect_word("RE");
    }
    cur.expect_word("RS");
    Ok(responses)
}

fn parse_response(cur: &mut TokenCursor) -> Response {
    let weight = cur.read_int();
    let mut actions = Vec::new();
    while cur.peek_word() == Some("AC") {
        cur.advance();
        actions.push(parse_action(cur));
        cur.expect_word("AC");
    }
    Response { weight, actions }
}

fn parse_action(cur: &mut TokenCursor) -> Action {
    let opcode = cur.read_int();
    let params = [
        cur.read_int(),
        cur.read_int(),
        cur.read_int(),
        cur.read_int(),
        cur.read_int(),
    ];
    let strings = [cur.read_string(), cur.read_string()];
    let objects = [parse_object(cur), parse_object(cur), parse_object(cur)];
    Action {
        opcode,
        params,
        strings,
        objects,
    }
}

/// Object-selector parsing (§4.4.1): consumes an opening `OB`, up to 14
/// integers, then an optional string, terminated by the next `OB`.
fn parse_object(cur: &mut TokenCursor) -> ObjectSelector {
    if !cur.expect_word("OB") {
        return ObjectSelector::default();
    }
    let mut ints = Vec::new();
    while ints.len() < 14 {
        match cur.peek() {
            Some(Token::Int(v)) => {
                ints.push(*v as i32);
                cur.advance();
            }
            _ => break,
        }
    }
    let name = cur.read_string();
    cur.expect_word("OB");
    ObjectSelector { ints, name }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_script() {
        let src = r#"SC CR CO TR 9 0 0 0 0 0 "" "" OB 0 0 0 OB TR CO RS RE 100 AC 49 123 45 30 0 0 "" "" OB OB OB AC RE RS CR SC"#;
        let script = parse_script(src).unwrap();
        assert_eq!(script.blocks.len(), 1);
        let block = &script.blocks[0];
        assert_eq!(block.triggers.len(), 1);
        assert_eq!(block.triggers[0].opcode, 9);
        assert_eq!(block.triggers[0].object.ints, vec![0, 0, 0]);
        assert_eq!(block.responses.len(), 1);
        assert_eq!(block.responses[0].weight, 100);
        assert_eq!(block.responses[0].actions[0].opcode, 49);
        assert_eq!(block.responses[0].actions[0].params, [123, 45, 30, 0, 0]);
    }

    #[test]
    fn missing_fields_default_and_parser_keeps_going() {
        // Trigger missing its strings and object entirely.
        let src = r#"SC CR CO TR 9 0 0 0 0 0 TR CO RS RS CR SC"#;
        let script = parse_script(src).unwrap();
        assert_eq!(script.blocks[0].triggers[0].strings, ["".to_string(), "".to_string()]);
        assert_eq!(script.blocks[0].triggers[0].object, ObjectSelector::default());
    }

    #[test]
    fn malformed_block_is_skipped_not_fatal() {
        let src = r#"SC garbage tokens without structure CR CO RS RS CR SC"#;
        let script = parse_script(src).unwrap();
        // First "block" is malformed and skipped; second parses as empty.
        assert!(script.blocks.len() <= 1);
    }
}
