//! Script AST (§3): `Script = seq<Block>`, `Block = { triggers, responses }`.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectSelector {
    pub ints: Vec<i32>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub opcode: i32,
    pub params: [i32; 5],
    pub strings: [String; 2],
    pub object: ObjectSelector,
    /// `true` for a negated trigger ("OR" blocks etc. in the original
    /// engine prefix triggers with a negation bit); carried through for
    /// completeness even though no test exercises it directly.
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub opcode: i32,
    pub params: [i32; 5],
    pub strings: [String; 2],
    pub objects: [ObjectSelector; 3],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub weight: i32,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub triggers: Vec<Trigger>,
    pub responses: Vec<Response>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    pub blocks: Vec<Block>,
}
