//! The AST (§3.6, §4.4) and the constant-folding pass.
//!
//! A [`Node`] carries its originating [`Token`] and children. Every node
//! knows how to report its own const-foldability, fold itself into a
//! (possibly simplified) [`Node`], and lower itself into an
//! [`crate::instruction::Instruction`] for the evaluator.

use std::rc::Rc;

use crate::instruction::Instruction;
use crate::intern::NameId;
use crate::scope::{ScopeKind, ScopeRef};
use crate::signature::ParamType;
use crate::token::Token;
use crate::value::Value;

/// A parsed function parameter before it is bound into an [`Overload`]
/// (§3.4, §4.4: "A param without explicit type has base Nil", i.e. matches
/// any concrete value — represented here as `Any` at the AST level so a
/// caller need not special-case "no annotation").
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: NameId,
    pub by_ref: bool,
    pub param_type: ParamType,
}

#[derive(Debug, Clone)]
pub enum DictKey {
    Literal(String),
    Expr(Box<Node>),
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub label: Node,
    pub body: Node,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub token: Token,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Container(Value),
    Variable(NameId),
    Declare { name: NameId, ty: Option<ParamType>, init: Box<Node>, is_const: bool },
    DeclareVars(Vec<NameId>),
    Sequence(Vec<Node>),
    Scope(Vec<Node>),
    IfElse { cond: Box<Node>, body: Box<Node>, or_else: Option<Box<Node>> },
    While { cond: Box<Node>, body: Box<Node> },
    For { var: NameId, iter: Box<Node>, body: Box<Node> },
    Until { from: Box<Node>, to: Box<Node>, step: Option<Box<Node>>, inclusive: bool },
    Index(Box<Node>, Box<Node>),
    Inner(Box<Node>, Box<Node>),
    Call { callee: Box<Node>, args: Vec<Node> },
    BinOp { op: String, lhs: Box<Node>, rhs: Box<Node> },
    UnOp { op: String, operand: Box<Node> },
    Set { target: Box<Node>, value: Box<Node>, declare_const: bool },
    Return(Box<Node>),
    Refer(Box<Node>),
    Break,
    Continue,
    New { class: Box<Node>, args: Vec<Node> },
    ClassDecl { name: NameId, kind: ScopeKind, body: Vec<Node>, extends: Option<Box<Node>> },
    CastTo(Box<Node>, Box<Node>),
    Length(Box<Node>),
    Alloc(Box<Node>),
    Switch { disc: Box<Node>, cases: Vec<SwitchCase>, or_else: Option<Box<Node>> },
    TryCatch { body: Box<Node>, catch_name: NameId, catch_body: Box<Node> },
    Throw(Box<Node>),
    Extern { lib: String, func: String, args: Vec<Node>, spread: bool },
    CharN(Box<Node>),
    CharS(Box<Node>),
    Parse(Box<Node>),
    TypeOf(Box<Node>),
    CallOpI(u32, Vec<Node>),
    ArrayLit(Vec<Node>),
    MatrixLit(Vec<Vec<Node>>),
    DictLit(Vec<(DictKey, Node)>),
    Lambda { name: NameId, params: Vec<ParamDecl>, is_vargs: bool, body: Box<Node> },
    FuncDecl { name: NameId, params: Vec<ParamDecl>, is_vargs: bool, body: Box<Node> },
    Load(String),
}

impl Node {
    #[must_use]
    pub fn new(token: Token, kind: NodeKind) -> Self {
        Node { token, kind }
    }

    /// A node is const if all its inputs are const *and* evaluating it
    /// against a fresh scope does not throw (§4.4).
    #[must_use]
    pub fn is_const(&self) -> bool {
        match &self.kind {
            NodeKind::Container(_) => true,
            NodeKind::ArrayLit(items) => items.iter().all(Node::is_const),
            NodeKind::MatrixLit(rows) => rows.iter().all(|r| r.iter().all(Node::is_const)),
            NodeKind::DictLit(pairs) => {
                pairs.iter().all(|(k, v)| v.is_const() && !matches!(k, DictKey::Expr(e) if !e.is_const()))
            }
            NodeKind::BinOp { lhs, rhs, .. } => lhs.is_const() && rhs.is_const(),
            NodeKind::UnOp { operand, .. } => operand.is_const(),
            NodeKind::CastTo(v, t) => v.is_const() && t.is_const(),
            NodeKind::Until { from, to, step, .. } => {
                from.is_const() && to.is_const() && step.as_deref().is_none_or(Node::is_const)
            }
            NodeKind::Index(a, b) => a.is_const() && b.is_const(),
            NodeKind::Length(a) | NodeKind::TypeOf(a) => a.is_const(),
            _ => false,
        }
    }

    /// Attempts to fold this node (and its children) into a literal
    /// `Container`. Evaluator errors during a speculative fold are
    /// swallowed and the original (unfolded) node is kept (§4.4).
    #[must_use]
    pub fn fold(self) -> Node {
        let token = self.token.clone();
        let folded_kind = match self.kind {
            NodeKind::ArrayLit(items) => NodeKind::ArrayLit(items.into_iter().map(Node::fold).collect()),
            NodeKind::MatrixLit(rows) => {
                NodeKind::MatrixLit(rows.into_iter().map(|r| r.into_iter().map(Node::fold).collect()).collect())
            }
            NodeKind::DictLit(pairs) => NodeKind::DictLit(
                pairs
                    .into_iter()
                    .map(|(k, v)| {
                        let k = match k {
                            DictKey::Expr(e) => DictKey::Expr(Box::new(e.fold())),
                            other => other,
                        };
                        (k, v.fold())
                    })
                    .collect(),
            ),
            NodeKind::BinOp { op, lhs, rhs } => {
                NodeKind::BinOp { op, lhs: Box::new(lhs.fold()), rhs: Box::new(rhs.fold()) }
            }
            NodeKind::UnOp { op, operand } => NodeKind::UnOp { op, operand: Box::new(operand.fold()) },
            NodeKind::CastTo(v, t) => NodeKind::CastTo(Box::new(v.fold()), Box::new(t.fold())),
            NodeKind::Until { from, to, step, inclusive } => NodeKind::Until {
                from: Box::new(from.fold()),
                to: Box::new(to.fold()),
                step: step.map(|s| Box::new(s.fold())),
                inclusive,
            },
            NodeKind::Index(a, b) => NodeKind::Index(Box::new(a.fold()), Box::new(b.fold())),
            NodeKind::Length(a) => NodeKind::Length(Box::new(a.fold())),
            NodeKind::TypeOf(a) => NodeKind::TypeOf(Box::new(a.fold())),
            other => other,
        };
        let candidate = Node::new(token.clone(), folded_kind);
        if !candidate.is_const() {
            return candidate;
        }
        let mut ctx = crate::eval::RunCtx::new(ScopeRef::root());
        match candidate.generate().eval(&mut ctx) {
            Ok(crate::eval::Flow::Plain(v)) => Node::new(token, NodeKind::Container(v)),
            _ => candidate,
        }
    }

    /// Lowers this node into its evaluator form (§4.5). Folding should
    /// already have collapsed const subtrees into `Container`s before
    /// this is called, but `generate` works correctly either way.
    #[must_use]
    pub fn generate(&self) -> Instruction {
        let token = self.token.clone();
        let kind = match &self.kind {
            NodeKind::Container(v) => return Instruction::new(token, crate::instruction::InstrKind::Container(v.clone())),
            NodeKind::Variable(n) => crate::instruction::InstrKind::Variable(*n),
            NodeKind::Declare { name, ty, init, is_const } => crate::instruction::InstrKind::Declare {
                name: *name,
                ty: ty.clone(),
                init: Box::new(init.generate()),
                is_const: *is_const,
            },
            NodeKind::DeclareVars(names) => crate::instruction::InstrKind::DeclareVars(names.clone()),
            NodeKind::Sequence(items) => {
                crate::instruction::InstrKind::Sequence(items.iter().map(Node::generate).collect())
            }
            NodeKind::Scope(items) => {
                crate::instruction::InstrKind::Scope(items.iter().map(Node::generate).collect())
            }
            NodeKind::IfElse { cond, body, or_else } => crate::instruction::InstrKind::IfElse {
                cond: Box::new(cond.generate()),
                body: Box::new(body.generate()),
                or_else: or_else.as_ref().map(|n| Box::new(n.generate())),
            },
            NodeKind::While { cond, body } => crate::instruction::InstrKind::While {
                cond: Box::new(cond.generate()),
                body: Box::new(body.generate()),
            },
            NodeKind::For { var, iter, body } => crate::instruction::InstrKind::For {
                var: *var,
                iter: Box::new(iter.generate()),
                body: Box::new(body.generate()),
            },
            NodeKind::Until { from, to, step, inclusive } => crate::instruction::InstrKind::Until {
                from: Box::new(from.generate()),
                to: Box::new(to.generate()),
                step: step.as_ref().map(|s| Box::new(s.generate())),
                inclusive: *inclusive,
            },
            NodeKind::Index(a, b) => {
                crate::instruction::InstrKind::Index(Box::new(a.generate()), Box::new(b.generate()))
            }
            NodeKind::Inner(a, b) => {
                crate::instruction::InstrKind::Inner(Box::new(a.generate()), Box::new(b.generate()))
            }
            NodeKind::Call { callee, args } => crate::instruction::InstrKind::Call {
                callee: Box::new(callee.generate()),
                args: args.iter().map(Node::generate).collect(),
            },
            NodeKind::BinOp { op, lhs, rhs } => crate::instruction::InstrKind::BinOp {
                op: op.clone(),
                lhs: Box::new(lhs.generate()),
                rhs: Box::new(rhs.generate()),
            },
            NodeKind::UnOp { op, operand } => {
                crate::instruction::InstrKind::UnOp { op: op.clone(), operand: Box::new(operand.generate()) }
            }
            NodeKind::Set { target, value, declare_const } => crate::instruction::InstrKind::Set {
                target: Box::new(target.generate()),
                value: Box::new(value.generate()),
                declare_const: *declare_const,
            },
            NodeKind::Return(v) => crate::instruction::InstrKind::Return(Box::new(v.generate())),
            NodeKind::Refer(v) => crate::instruction::InstrKind::Refer(Box::new(v.generate())),
            NodeKind::Break => crate::instruction::InstrKind::Break,
            NodeKind::Continue => crate::instruction::InstrKind::Continue,
            NodeKind::New { class, args } => crate::instruction::InstrKind::New {
                class: Box::new(class.generate()),
                args: args.iter().map(Node::generate).collect(),
            },
            NodeKind::ClassDecl { name, kind, body, extends } => crate::instruction::InstrKind::Class {
                name: *name,
                kind: *kind,
                body: Rc::new(body.iter().map(Node::generate).collect()),
                extends: extends.as_ref().map(|n| Box::new(n.generate())),
            },
            NodeKind::CastTo(v, t) => {
                crate::instruction::InstrKind::CastTo(Box::new(v.generate()), Box::new(t.generate()))
            }
            NodeKind::Length(a) => crate::instruction::InstrKind::Length(Box::new(a.generate())),
            NodeKind::Alloc(n) => crate::instruction::InstrKind::Alloc(Box::new(n.generate())),
            NodeKind::Switch { disc, cases, or_else } => crate::instruction::InstrKind::Switch {
                disc: Box::new(disc.generate()),
                cases: cases
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (c.label.generate(), i, c.body.generate()))
                    .collect(),
                or_else: or_else.as_ref().map(|n| Box::new(n.generate())),
            },
            NodeKind::TryCatch { body, catch_name, catch_body } => crate::instruction::InstrKind::TryCatch {
                body: Box::new(body.generate()),
                catch_name: *catch_name,
                catch_body: Box::new(catch_body.generate()),
            },
            NodeKind::Throw(v) => crate::instruction::InstrKind::Throw(Box::new(v.generate())),
            NodeKind::Extern { lib, func, args, spread } => crate::instruction::InstrKind::Extern {
                lib: lib.clone(),
                func: func.clone(),
                args: args.iter().map(Node::generate).collect(),
                spread: *spread,
            },
            NodeKind::CharN(v) => crate::instruction::InstrKind::CharN(Box::new(v.generate())),
            NodeKind::CharS(v) => crate::instruction::InstrKind::CharS(Box::new(v.generate())),
            NodeKind::Parse(v) => crate::instruction::InstrKind::Parse(Box::new(v.generate())),
            NodeKind::TypeOf(v) => crate::instruction::InstrKind::TypeOf(Box::new(v.generate())),
            NodeKind::CallOpI(id, args) => {
                crate::instruction::InstrKind::CallOpI(*id, args.iter().map(Node::generate).collect())
            }
            NodeKind::ArrayLit(items) => {
                crate::instruction::InstrKind::ArrayLit(items.iter().map(Node::generate).collect())
            }
            NodeKind::MatrixLit(rows) => crate::instruction::InstrKind::MatrixLit(
                rows.iter().map(|r| r.iter().map(Node::generate).collect()).collect(),
            ),
            NodeKind::DictLit(pairs) => crate::instruction::InstrKind::DictLit(
                pairs
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            DictKey::Literal(s) => crate::instruction::DictKeyInstr::Literal(s.clone()),
                            DictKey::Expr(e) => crate::instruction::DictKeyInstr::Expr(Box::new(e.generate())),
                        };
                        (key, v.generate())
                    })
                    .collect(),
            ),
            NodeKind::Lambda { name, params, is_vargs, body } => crate::instruction::InstrKind::Lambda {
                name: *name,
                params: params.clone(),
                is_vargs: *is_vargs,
                body: Rc::new(body.generate()),
            },
            NodeKind::FuncDecl { name, params, is_vargs, body } => crate::instruction::InstrKind::FuncDecl {
                name: *name,
                params: params.clone(),
                is_vargs: *is_vargs,
                body: Rc::new(body.generate()),
            },
            NodeKind::Load(path) => crate::instruction::InstrKind::Load(path.clone()),
        };
        Instruction::new(token, kind)
    }
}

