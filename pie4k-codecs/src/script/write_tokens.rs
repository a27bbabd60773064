//! [`Script`] AST -> on-disk token stream (§4.4.1 "Re-serialization").
//!
//! Preserves the original re-serializer's hard-coded trigger-object quirk
//! (Q1): `write_trigger` always emits a flattened, all-zero 14-field object
//! line rather than the trigger's actual parsed object selector. The AST
//! itself still carries the real parsed object in memory (see
//! [`super::ast::Trigger::object`]) and that's what participates in
//! AST-equality checks; only this writer path is affected.

use super::ast::{Action, Block, ObjectSelector, Response, Script, Trigger};

const HARD_CODED_TRIGGER_OBJECT_INTS: usize = 12;

pub fn write_script(script: &Script) -> String {
    let mut out = String::new();
    out.push_str("SC\n");
    for block in &script.blocks {
        write_block(&mut out, block);
    }
    out.push_str("SC\n");
    out
}

fn write_block(out: &mut String, block: &Block) {
    out.push_str("CR\n");
    out.push_str("CO\n");
    for trigger in &block.triggers {
        write_trigger(out, trigger);
    }
    out.push_str("CO\n");
    out.push_str("RS\n");
    for response in &block.responses {
        write_response(out, response);
    }
    out.push_str("RS\n");
    out.push_str("CR\n");
}

fn write_trigger(out: &mut String, trigger: &Trigger) {
    out.push_str("TR\n");
    push_int(out, trigger.opcode);
    for p in trigger.params {
        push_int(out, p);
    }
    push_string(out, &trigger.strings[0]);
    push_string(out, &trigger.strings[1]);
    // Q1: hard-coded flattened object line, independent of the parsed
    // object's real contents.
    out.push_str("OB\n");
    for _ in 0..HARD_CODED_TRIGGER_OBJECT_INTS {
        push_int(out, 0);
    }
    out.push_str("OB\n");
    out.push_str("TR\n");
}

fn write_response(out: &mut String, response: &Response) {
    out.push_str("RE\n");
    push_int(out, response.weight);
    for action in &response.actions {
        write_action(out, action);
    }
    out.push_str("RE\n");
}

fn write_action(out: &mut String, action: &Action) {
    out.push_str("AC\n");
    push_int(out, action.opcode);
    for p in action.params {
        push_int(out, p);
    }
    push_string(out, &action.strings[0]);
    push_string(out, &action.strings[1]);
    for object in &action.objects {
        write_object(out, object);
    }
    out.push_str("AC\n");
}

fn write_object(out: &mut String, object: &ObjectSelector) {
    out.push_str("OB\n");
    for v in &object.ints {
        push_int(out, *v);
    }
    if !object.name.is_empty() {
        push_string(out, &object.name);
    }
    out.push_str("OB\n");
}

fn push_int(out: &mut String, v: i32) {
    out.push_str(&v.to_string());
    out.push('\n');
}

fn push_string(out: &mut String, s: &str) {
    out.push('"');
    out.push_str(s);
    out.push_str("\"\n");
}

#[cfg(test)]
mod tests {
    use super::super::parse_tokens::parse_script;
    use super::*;

    #[test]
    fn round_trips_through_ast_except_trigger_object() {
        let src = r#"SC CR CO TR 9 1 2 3 4 5 "a" "b" OB 7 8 9 OB TR CO RS RE 100 AC 49 123 45 30 0 0 "" "" OB 1 OB OB 2 OB OB 3 OB AC RE RS CR SC"#;
        let original = parse_script(src).unwrap();
        let written = write_script(&original);
        let reparsed = parse_script(&written).unwrap();

        // Everything except the trigger's object selector round-trips.
        assert_eq!(original.blocks[0].triggers[0].opcode, reparsed.blocks[0].triggers[0].opcode);
        assert_eq!(original.blocks[0].triggers[0].params, reparsed.blocks[0].triggers[0].params);
        assert_ne!(original.blocks[0].triggers[0].object, reparsed.blocks[0].triggers[0].object);
        assert_eq!(
            reparsed.blocks[0].triggers[0].object.ints,
            vec![0; 12]
        );

        // Actions are unaffected by the quirk and round-trip exactly.
        assert_eq!(original.blocks[0].responses, reparsed.blocks[0].responses);
    }
}
