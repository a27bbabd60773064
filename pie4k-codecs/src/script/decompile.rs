//! AST <-> human-readable "decompiled" text (§4.4.1) and the coordinate
//! upscaling that operates purely on that text.
//!
//! The decompiled form uses `IF / <triggers> / THEN / RESPONSE #w /
//! <actions> / END` per block, one trigger or action per line. Every
//! coordinate pair belonging to a "point" opcode (49/254/272 — move view,
//! screen shake, create visual effect) is rendered as `[x.y]`; upscaling
//! rewrites only these bracketed literals and nothing else, so the upscale
//! step never needs to understand the surrounding grammar.
//!
//! Trigger object selectors are intentionally dropped from this
//! intermediate: `write_tokens::write_trigger` discards the parsed object
//! anyway (Q1), so there is nothing downstream that depends on decompiling
//! it faithfully.

use super::ast::{Action, Block, ObjectSelector, Response, Script, Trigger};
use super::ids::{IdsTables, POINT_OPCODES};
use pie4k_types::{PieError, PieResult};

pub fn decompile_script(script: &Script, ids: &IdsTables) -> String {
    let mut out = String::new();
    for block in &script.blocks {
        decompile_block(&mut out, block, ids);
    }
    out
}

fn decompile_block(out: &mut String, block: &Block, ids: &IdsTables) {
    out.push_str("IF\n");
    for trigger in &block.triggers {
        decompile_trigger(out, trigger, ids);
    }
    out.push_str("THEN\n");
    for response in &block.responses {
        out.push_str(&format!("RESPONSE #{}\n", response.weight));
        for action in &response.actions {
            decompile_action(out, action, ids);
        }
    }
    out.push_str("END\n");
}

fn decompile_trigger(out: &mut String, trigger: &Trigger, ids: &IdsTables) {
    let name = ids.name_for("TRIGGER", trigger.opcode);
    let args: Vec<String> = trigger.params.iter().map(|p| p.to_string()).collect();
    out.push_str(&format!(
        "  {}({}) \"{}\" \"{}\"\n",
        name,
        args.join(","),
        trigger.strings[0],
        trigger.strings[1]
    ));
}

fn decompile_action(out: &mut String, action: &Action, ids: &IdsTables) {
    let name = ids.name_for("ACTION", action.opcode);
    let args = if POINT_OPCODES.contains(&action.opcode) {
        format!(
            "{},{},[{}.{}],{}",
            action.params[0], action.params[1], action.params[2], action.params[3], action.params[4]
        )
    } else {
        action
            .params
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",")
    };
    out.push_str(&format!(
        "  {}({}) \"{}\" \"{}\" {} {} {}\n",
        name,
        args,
        action.strings[0],
        action.strings[1],
        decompile_object(&action.objects[0]),
        decompile_object(&action.objects[1]),
        decompile_object(&action.objects[2]),
    ));
}

fn decompile_object(object: &ObjectSelector) -> String {
    if object.ints.is_empty() && object.name.is_empty() {
        return "<>".to_string();
    }
    let ints: Vec<String> = object.ints.iter().map(|v| v.to_string()).collect();
    if object.name.is_empty() {
        format!("<{}>", ints.join(","))
    } else {
        format!("<{}:{}>", ints.join(","), object.name)
    }
}

/// Rewrite every `[x.y]` coordinate literal in decompiled text by
/// multiplying both components by `factor` (§4.4.1 "Upscaling"). Everything
/// else in the text passes through unchanged.
pub fn rewrite_coordinates(text: &str, factor: i64) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '[' {
            if let Some((x, y, end)) = parse_bracket(&chars, i) {
                out.push('[');
                out.push_str(&(x * factor).to_string());
                out.push('.');
                out.push_str(&(y * factor).to_string());
                out.push(']');
                i = end;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Parses a `[int.int]` literal starting at `chars[start] == '['`. Returns
/// `(x, y, index-just-past-the-closing-bracket)`.
fn parse_bracket(chars: &[char], start: usize) -> Option<(i64, i64, usize)> {
    let mut i = start + 1;
    let x_start = i;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '-') {
        i += 1;
    }
    if i == x_start || i >= chars.len() || chars[i] != '.' {
        return None;
    }
    let x: i64 = chars[x_start..i].iter().collect::<String>().parse().ok()?;
    i += 1;
    let y_start = i;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '-') {
        i += 1;
    }
    if i == y_start || i >= chars.len() || chars[i] != ']' {
        return None;
    }
    let y: i64 = chars[y_start..i].iter().collect::<String>().parse().ok()?;
    Some((x, y, i + 1))
}

pub fn recompile_script(text: &str, ids: &IdsTables) -> PieResult<Script> {
    let mut blocks = Vec::new();
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line != "IF" {
            return Err(PieError::DecodeError(format!("expected IF, found {line:?}")));
        }
        blocks.push(recompile_block(&mut lines, ids)?);
    }
    Ok(Script { blocks })
}

fn recompile_block<'a, I: Iterator<Item = &'a str>>(
    lines: &mut std::iter::Peekable<I>,
    ids: &IdsTables,
) -> PieResult<Block> {
    let mut triggers = Vec::new();
    loop {
        let Some(raw) = lines.next() else {
            return Err(PieError::DecodeError("unexpected end of script in IF block".into()));
        };
        let line = raw.trim();
        if line == "THEN" {
            break;
        }
        triggers.push(recompile_trigger(line, ids)?);
    }

    let mut responses = Vec::new();
    loop {
        let Some(raw) = lines.next() else {
            return Err(PieError::DecodeError("unexpected end of script before END".into()));
        };
        let line = raw.trim();
        if line == "END" {
            break;
        }
        let Some(weight_str) = line.strip_prefix("RESPONSE #") else {
            return Err(PieError::DecodeError(format!("expected RESPONSE #n, found {line:?}")));
        };
        let weight: i32 = weight_str.trim().parse().unwrap_or(0);
        let mut actions = Vec::new();
        while let Some(next) = lines.peek() {
            let next = next.trim();
            if next == "END" || next.starts_with("RESPONSE #") {
                break;
            }
            actions.push(recompile_action(lines.next().unwrap().trim(), ids)?);
        }
        responses.push(Response { weight, actions });
    }

    Ok(Block { triggers, responses })
}

fn recompile_trigger(line: &str, ids: &IdsTables) -> PieResult<Trigger> {
    let (name, args, strings, _objects) = split_call(line)?;
    let opcode = resolve_opcode(ids, "TRIGGER", &name);
    let mut params = [0i32; 5];
    for (slot, arg) in params.iter_mut().zip(args.iter()) {
        *slot = arg.parse().unwrap_or(0);
    }
    Ok(Trigger {
        opcode,
        params,
        strings,
        object: ObjectSelector::default(),
        negated: false,
    })
}

fn recompile_action(line: &str, ids: &IdsTables) -> PieResult<Action> {
    let (name, args, strings, objects) = split_call(line)?;
    let opcode = resolve_opcode(ids, "ACTION", &name);
    let mut params = [0i32; 5];
    if POINT_OPCODES.contains(&opcode) && args.len() >= 4 {
        params[0] = args[0].parse().unwrap_or(0);
        params[1] = args[1].parse().unwrap_or(0);
        let (x, y) = parse_plain_bracket(&args[2]).unwrap_or((0, 0));
        params[2] = x;
        params[3] = y;
        params[4] = args[3].parse().unwrap_or(0);
    } else {
        for (slot, arg) in params.iter_mut().zip(args.iter()) {
            *slot = arg.parse().unwrap_or(0);
        }
    }
    let objects = [
        objects.first().cloned().unwrap_or_default(),
        objects.get(1).cloned().unwrap_or_default(),
        objects.get(2).cloned().unwrap_or_default(),
    ];
    Ok(Action { opcode, params, strings, objects })
}

fn resolve_opcode(ids: &IdsTables, table: &str, name: &str) -> i32 {
    ids.opcode_for(table, name).unwrap_or(0)
}

fn parse_plain_bracket(token: &str) -> Option<(i32, i32)> {
    let inner = token.strip_prefix('[')?.strip_suffix(']')?;
    let (x, y) = inner.split_once('.')?;
    Some((x.parse().ok()?, y.parse().ok()?))
}

/// Splits a decompiled call line of the form
/// `  Name(args) "s0" "s1" <obj1> <obj2> <obj3>` into its parts. The object
/// list is only ever populated for action lines (triggers carry none).
#[allow(clippy::type_complexity)]
fn split_call(line: &str) -> PieResult<(String, Vec<String>, [String; 2], Vec<ObjectSelector>)> {
    let open = line
        .find('(')
        .ok_or_else(|| PieError::DecodeError(format!("malformed call line: {line:?}")))?;
    let close = line[open..]
        .find(')')
        .map(|i| i + open)
        .ok_or_else(|| PieError::DecodeError(format!("malformed call line: {line:?}")))?;
    let name = line[..open].trim().to_string();
    let args = split_args(&line[open + 1..close]);
    let rest = line[close + 1..].trim();

    let mut strings = [String::new(), String::new()];
    let mut objects = Vec::new();
    let mut chars = rest.chars().peekable();
    let mut string_idx = 0;
    while let Some(&c) = chars.peek() {
        match c {
            '"' => {
                chars.next();
                let mut s = String::new();
                for ch in chars.by_ref() {
                    if ch == '"' {
                        break;
                    }
                    s.push(ch);
                }
                if string_idx < 2 {
                    strings[string_idx] = s;
                    string_idx += 1;
                }
            }
            '<' => {
                chars.next();
                let mut s = String::new();
                for ch in chars.by_ref() {
                    if ch == '>' {
                        break;
                    }
                    s.push(ch);
                }
                objects.push(parse_object_token(&s));
            }
            _ => {
                chars.next();
            }
        }
    }

    Ok((name, args, strings, objects))
}

fn parse_object_token(token: &str) -> ObjectSelector {
    if token.is_empty() {
        return ObjectSelector::default();
    }
    let (ints_part, name) = match token.split_once(':') {
        Some((ints, name)) => (ints, name.to_string()),
        None => (token, String::new()),
    };
    let ints = ints_part
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    ObjectSelector { ints, name }
}

fn split_args(s: &str) -> Vec<String> {
    // Args are comma-separated, but one argument may itself be a
    // `[x.y]` bracket containing no commas, so a plain split is safe.
    if s.trim().is_empty() {
        return Vec::new();
    }
    s.split(',').map(|p| p.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_action() -> Action {
        Action {
            opcode: 49,
            params: [0, 30, 123, 45, 0],
            strings: [String::new(), String::new()],
            objects: [ObjectSelector::default(), ObjectSelector::default(), ObjectSelector::default()],
        }
    }

    #[test]
    fn decompiles_point_opcode_with_bracketed_coordinate() {
        let ids = IdsTables::new(None);
        let mut out = String::new();
        decompile_action(&mut out, &sample_action(), &ids);
        assert!(out.contains("MoveViewPoint(0,30,[123.45],0)"));
    }

    #[test]
    fn s5_scenario_upscale_by_four_scales_bracket_only() {
        let line = "  MoveViewPoint([123.45],30)";
        let upscaled = rewrite_coordinates(line, 4);
        assert_eq!(upscaled, "  MoveViewPoint([492.180],30)");
    }

    #[test]
    fn round_trips_a_full_block_through_decompile_and_recompile() {
        let ids = IdsTables::new(None);
        let script = Script {
            blocks: vec![Block {
                triggers: vec![Trigger {
                    opcode: 9,
                    params: [0, 0, 0, 0, 0],
                    strings: [String::new(), String::new()],
                    object: ObjectSelector::default(),
                    negated: false,
                }],
                responses: vec![Response {
                    weight: 100,
                    actions: vec![sample_action()],
                }],
            }],
        };

        let text = decompile_script(&script, &ids);
        let recompiled = recompile_script(&text, &ids).unwrap();

        assert_eq!(recompiled.blocks[0].triggers[0].opcode, 9);
        assert_eq!(recompiled.blocks[0].responses[0].weight, 100);
        assert_eq!(recompiled.blocks[0].responses[0].actions[0].opcode, 49);
        assert_eq!(recompiled.blocks[0].responses[0].actions[0].params, sample_action().params);
    }

    #[test]
    fn upscale_then_recompile_moves_coordinate_into_param2_param3() {
        let ids = IdsTables::new(None);
        let script = Script {
            blocks: vec![Block {
                triggers: vec![],
                responses: vec![Response {
                    weight: 1,
                    actions: vec![sample_action()],
                }],
            }],
        };
        let text = decompile_script(&script, &ids);
        let upscaled = rewrite_coordinates(&text, 4);
        let recompiled = recompile_script(&upscaled, &ids).unwrap();
        let action = &recompiled.blocks[0].responses[0].actions[0];
        assert_eq!(action.params[2], 492);
        assert_eq!(action.params[3], 180);
        assert_eq!(action.params[1], 30);
    }
}
