//! The lowered instruction tree the evaluator walks (§4.5).
//!
//! An [`Instruction`] is the post-fold, post-`generate` form of a
//! [`crate::ast::Node`] — same shape, minus anything const-folding could
//! already collapse into a [`InstrKind::Container`].

use std::rc::Rc;

use crate::ast::ParamDecl;
use crate::eval::{Flow, RunCtx};
use crate::error::RResult;
use crate::intern::NameId;
use crate::scope::ScopeKind;
use crate::token::Token;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum DictKeyInstr {
    Literal(String),
    Expr(Box<Instruction>),
}

#[derive(Debug)]
pub enum InstrKind {
    Container(Value),
    Variable(NameId),
    Declare { name: NameId, ty: Option<crate::signature::ParamType>, init: Box<Instruction>, is_const: bool },
    DeclareVars(Vec<NameId>),
    Sequence(Vec<Instruction>),
    Scope(Vec<Instruction>),
    IfElse { cond: Box<Instruction>, body: Box<Instruction>, or_else: Option<Box<Instruction>> },
    While { cond: Box<Instruction>, body: Box<Instruction> },
    For { var: NameId, iter: Box<Instruction>, body: Box<Instruction> },
    Until { from: Box<Instruction>, to: Box<Instruction>, step: Option<Box<Instruction>>, inclusive: bool },
    Index(Box<Instruction>, Box<Instruction>),
    Inner(Box<Instruction>, Box<Instruction>),
    Call { callee: Box<Instruction>, args: Vec<Instruction> },
    BinOp { op: String, lhs: Box<Instruction>, rhs: Box<Instruction> },
    UnOp { op: String, operand: Box<Instruction> },
    Set { target: Box<Instruction>, value: Box<Instruction>, declare_const: bool },
    Return(Box<Instruction>),
    Refer(Box<Instruction>),
    Break,
    Continue,
    New { class: Box<Instruction>, args: Vec<Instruction> },
    Class { name: NameId, kind: ScopeKind, body: Rc<Vec<Instruction>>, extends: Option<Box<Instruction>> },
    CastTo(Box<Instruction>, Box<Instruction>),
    Length(Box<Instruction>),
    Alloc(Box<Instruction>),
    Switch {
        disc: Box<Instruction>,
        cases: Vec<(Instruction, usize, Instruction)>,
        or_else: Option<Box<Instruction>>,
    },
    TryCatch { body: Box<Instruction>, catch_name: NameId, catch_body: Box<Instruction> },
    Throw(Box<Instruction>),
    Extern { lib: String, func: String, args: Vec<Instruction>, spread: bool },
    CharN(Box<Instruction>),
    CharS(Box<Instruction>),
    Parse(Box<Instruction>),
    TypeOf(Box<Instruction>),
    CallOpI(u32, Vec<Instruction>),
    ArrayLit(Vec<Instruction>),
    MatrixLit(Vec<Vec<Instruction>>),
    DictLit(Vec<(DictKeyInstr, Instruction)>),
    Lambda { name: NameId, params: Vec<ParamDecl>, is_vargs: bool, body: Rc<Instruction> },
    FuncDecl { name: NameId, params: Vec<ParamDecl>, is_vargs: bool, body: Rc<Instruction> },
    Load(String),
}

/// One node of the lowered tree: a [`Token`] (for error reporting) plus its
/// [`InstrKind`] payload.
#[derive(Debug)]
pub struct Instruction {
    pub token: Token,
    pub kind: InstrKind,
}

impl Instruction {
    #[must_use]
    pub fn new(token: Token, kind: InstrKind) -> Self {
        Instruction { token, kind }
    }

    /// Convenience constructor for synthetic/test instructions that need
    /// no real source position.
    #[must_use]
    pub fn container(value: Value) -> Self {
        Instruction::new(Token::eof(Rc::from("<synthetic>")), InstrKind::Container(value))
    }

    pub fn eval(&self, ctx: &mut RunCtx) -> RResult<Flow> {
        crate::eval::eval_instruction(self, ctx)
    }
}
