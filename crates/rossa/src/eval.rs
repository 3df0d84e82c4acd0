//! The tree-walking evaluator (§4.5, §4.7, §4.8).
//!
//! Control flow (`break`/`continue`/`return`/`refer`) is carried as data —
//! [`Flow`] — rather than as host exceptions; only a Rossa-level `throw`
//! uses an actual `Result::Err` (§9 design notes: "control flow as
//! values").

use std::rc::Rc;

use ahash::AHashMap;

use crate::ast::ParamDecl;
use crate::error::{RResult, RuntimeError, StackFrame};
use crate::function::{FunctionValue, Overload, Param, PassMode};
use crate::instruction::{DictKeyInstr, InstrKind, Instruction};
use crate::intern::{dehash, hash, NameId};
use crate::number::Number;
use crate::operators;
use crate::scope::{ScopeKind, ScopeRef};
use crate::signature::{ParamType, Signature};
use crate::value::Value;

const MAX_CALL_DEPTH: usize = 2048;

/// The outcome of evaluating one [`Instruction`] (§9 glossary: "Flow").
#[derive(Debug, Clone)]
pub enum Flow {
    Plain(Value),
    Return(Value),
    Refer(Value),
    Break,
    Continue,
}

/// Threaded through a single evaluation: the active scope, the call-frame
/// trace used to render `throw` backtraces (§6.4), and a depth counter
/// guarding against runaway recursion.
pub struct RunCtx {
    pub scope: ScopeRef,
    pub trace: Vec<StackFrame>,
    depth: usize,
}

impl RunCtx {
    #[must_use]
    pub fn new(scope: ScopeRef) -> Self {
        RunCtx { scope, trace: Vec::new(), depth: 0 }
    }

    fn in_scope<T>(&mut self, scope: ScopeRef, f: impl FnOnce(&mut Self) -> RResult<T>) -> RResult<T> {
        let saved = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = saved;
        result
    }
}

/// Unwraps a [`Flow`] for use as an expression value, bubbling anything
/// that isn't `Plain` straight up to the caller.
macro_rules! val {
    ($ctx:expr, $instr:expr) => {
        match eval_instruction($instr, $ctx)? {
            Flow::Plain(v) => v,
            other => return Ok(other),
        }
    };
}

pub fn eval_instruction(instr: &Instruction, ctx: &mut RunCtx) -> RResult<Flow> {
    let token = &instr.token;
    match &instr.kind {
        InstrKind::Container(v) => Ok(Flow::Plain(v.clone())),

        InstrKind::Variable(name) => {
            if *name == crate::scope::this_name() {
                return ctx
                    .scope
                    .resolve_this()
                    .map(|s| Flow::Plain(Value::Object(s)))
                    .ok_or_else(|| RuntimeError::undeclared_variable("this", token.clone()));
            }
            ctx.scope
                .get_variable(*name)
                .map(Flow::Plain)
                .ok_or_else(|| RuntimeError::undeclared_variable(&dehash(*name), token.clone()))
        }

        InstrKind::Declare { name, ty, init, is_const } => {
            let value = val!(ctx, init);
            if let Some(ty) = ty {
                if ty.score(&value) == 0 {
                    return Err(RuntimeError::type_error(type_name(ty), token.clone()));
                }
            }
            let bound = bind_for_assignment(&value, init, ctx);
            ctx.scope.declare(*name, bound, *is_const);
            Ok(Flow::Plain(Value::Nil))
        }

        InstrKind::DeclareVars(names) => {
            for name in names {
                ctx.scope.declare(*name, Value::Nil, false);
            }
            Ok(Flow::Plain(Value::Nil))
        }

        InstrKind::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match eval_instruction(item, ctx)? {
                    Flow::Plain(v) => {
                        if matches!(item.kind, InstrKind::Until { .. }) {
                            if let Value::Array(arr) = &v {
                                out.extend(arr.borrow().iter().cloned());
                                continue;
                            }
                        }
                        out.push(v);
                    }
                    other => return Ok(other),
                }
            }
            Ok(Flow::Plain(Value::array(out)))
        }

        InstrKind::Scope(items) => {
            let child = ctx.scope.child(ScopeKind::Bounded, NameId::from_index(0));
            ctx.in_scope(child, |ctx| {
                let mut last = Value::Nil;
                for item in items {
                    match eval_instruction(item, ctx)? {
                        Flow::Plain(v) => last = v,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Plain(last))
            })
        }

        InstrKind::IfElse { cond, body, or_else } => {
            if val!(ctx, cond).truthy() {
                eval_instruction(body, ctx)
            } else if let Some(or_else) = or_else {
                eval_instruction(or_else, ctx)
            } else {
                Ok(Flow::Plain(Value::Nil))
            }
        }

        InstrKind::While { cond, body } => {
            loop {
                if !val!(ctx, cond).truthy() {
                    break;
                }
                match eval_instruction(body, ctx)? {
                    Flow::Break => break,
                    Flow::Continue | Flow::Plain(_) => {}
                    other => return Ok(other),
                }
            }
            Ok(Flow::Plain(Value::Nil))
        }

        InstrKind::For { var, iter, body } => {
            let collection = val!(ctx, iter);
            let items = iterate(&collection, token)?;
            'outer: for item in items {
                let child = ctx.scope.child(ScopeKind::Bounded, NameId::from_index(0));
                child.create_variable(*var, item);
                let flow = ctx.in_scope(child, |ctx| eval_instruction(body, ctx))?;
                match flow {
                    Flow::Break => break 'outer,
                    Flow::Continue | Flow::Plain(_) => {}
                    other => return Ok(other),
                }
            }
            Ok(Flow::Plain(Value::Nil))
        }

        InstrKind::Until { from, to, step, inclusive } => {
            let from = as_number(&val!(ctx, from), token)?;
            let to = as_number(&val!(ctx, to), token)?;
            let step = match step {
                Some(s) => as_number(&val!(ctx, s), token)?.as_f64(),
                None => 1.0,
            };
            let (from, to) = (from.as_f64(), to.as_f64());
            let mut out = Vec::new();
            if step == 0.0 {
                return Err(RuntimeError::new("range step cannot be zero", token.clone()));
            }
            let mut x = from;
            while (step > 0.0 && (if *inclusive { x <= to } else { x < to }))
                || (step < 0.0 && (if *inclusive { x >= to } else { x > to }))
            {
                out.push(Value::Number(Number::from(x)));
                x += step;
            }
            Ok(Flow::Plain(Value::array(out)))
        }

        InstrKind::Index(target, index) => {
            let target_v = val!(ctx, target);
            let index_v = val!(ctx, index);
            index_value(&target_v, &index_v, ctx, token)
        }

        InstrKind::Inner(lhs, rhs) => {
            let name = match &rhs.kind {
                InstrKind::Variable(n) => *n,
                _ => return Err(RuntimeError::type_error("a field name", token.clone())),
            };
            let target = val!(ctx, lhs);
            match &target {
                Value::Object(scope) => scope
                    .get_own(name)
                    .map(Flow::Plain)
                    .ok_or_else(|| RuntimeError::no_such_key(&dehash(name), token.clone())),
                Value::Dictionary(d) => {
                    Ok(Flow::Plain(d.borrow().get(&dehash(name)).cloned().unwrap_or(Value::Nil)))
                }
                _ => Err(RuntimeError::type_error("Object or Dictionary", token.clone())),
            }
        }

        InstrKind::Call { callee, args } => {
            let mut arg_values = Vec::with_capacity(args.len());
            for a in args {
                arg_values.push(val!(ctx, a));
            }
            if let InstrKind::Inner(lhs, rhs) = &callee.kind {
                let field_name = match &rhs.kind {
                    InstrKind::Variable(n) => *n,
                    _ => return Err(RuntimeError::type_error("a field name", token.clone())),
                };
                let target = val!(ctx, lhs);
                match &target {
                    Value::Object(scope) => {
                        return match scope.get_own(field_name) {
                            Some(found) => call_value(&found, arg_values, args, ctx, token).map(Flow::Plain),
                            None => {
                                // UFCS (§4.5): `x.f(args)` with no such method on `x` retries as `f(x, args...)`.
                                let Some(Value::Function(f)) = ctx.scope.get_variable(field_name) else {
                                    return Err(RuntimeError::no_such_key(&dehash(field_name), token.clone()));
                                };
                                let mut ufcs_args = Vec::with_capacity(arg_values.len() + 1);
                                ufcs_args.push(target.clone());
                                ufcs_args.extend(arg_values);
                                call_function(&f, ufcs_args, args, ctx, token).map(Flow::Plain)
                            }
                        };
                    }
                    Value::Dictionary(d) => {
                        let found = d.borrow().get(&dehash(field_name)).cloned().unwrap_or(Value::Nil);
                        return call_value(&found, arg_values, args, ctx, token).map(Flow::Plain);
                    }
                    _ => return Err(RuntimeError::type_error("Object or Dictionary", token.clone())),
                }
            }
            let callee_v = val!(ctx, callee);
            call_value(&callee_v, arg_values, args, ctx, token).map(Flow::Plain)
        }

        InstrKind::BinOp { op, lhs, rhs } => {
            let a = val!(ctx, lhs);
            let b = val!(ctx, rhs);
            operators::binary(op, &a, &b, token).map(Flow::Plain)
        }

        InstrKind::UnOp { op, operand } => {
            let v = val!(ctx, operand);
            operators::unary(op, &v, token).map(Flow::Plain)
        }

        InstrKind::Set { target, value, declare_const } => {
            let raw = val!(ctx, value);
            let bound = bind_for_assignment(&raw, value, ctx);
            assign(target, bound, *declare_const, ctx, token)
        }

        InstrKind::Return(v) => Ok(Flow::Return(val!(ctx, v))),
        InstrKind::Refer(v) => Ok(Flow::Refer(val!(ctx, v))),
        InstrKind::Break => Ok(Flow::Break),
        InstrKind::Continue => Ok(Flow::Continue),

        InstrKind::New { class, args } => {
            let class_v = val!(ctx, class);
            let Value::Object(template) = class_v else {
                return Err(RuntimeError::type_error("a class", token.clone()));
            };
            if template.kind() != ScopeKind::Struct {
                return Err(RuntimeError::new("cannot instantiate a non-struct class", token.clone()));
            }
            let instance = template.instantiate();
            ctx.in_scope(instance.clone(), run_body_layers)?;
            let mut arg_values = Vec::with_capacity(args.len());
            for a in args {
                arg_values.push(val!(ctx, a));
            }
            if let Some(Value::Function(init)) = instance.get_own(hash("init")) {
                call_function(&init, arg_values, args, ctx, token)?;
            }
            Ok(Flow::Plain(Value::Object(instance)))
        }

        InstrKind::Class { name, kind, body, extends } => {
            let class_scope = ctx.scope.child(*kind, *name);
            if let Some(extends) = extends {
                let parent_v = val!(ctx, extends);
                if let Value::Object(parent) = parent_v {
                    class_scope.extend_from(&parent);
                } else {
                    return Err(RuntimeError::type_error("a class", token.clone()));
                }
            }
            class_scope.add_extension(*name);
            class_scope.set_body(body.clone());
            let produced = match kind {
                ScopeKind::Static => {
                    ctx.in_scope(class_scope.clone(), run_body_layers)?;
                    Value::Object(class_scope)
                }
                _ => Value::Object(class_scope),
            };
            ctx.scope.create_variable(*name, produced.clone());
            Ok(Flow::Plain(produced))
        }

        InstrKind::CastTo(value, ty) => {
            let v = val!(ctx, value);
            let target = val!(ctx, ty);
            crate::coercion::cast(&v, &target, token).map(Flow::Plain)
        }

        InstrKind::Length(v) => {
            let value = val!(ctx, v);
            let len = match &value {
                Value::String(s) => s.chars().count() as i64,
                Value::Array(a) => a.borrow().len() as i64,
                Value::Dictionary(d) => d.borrow().len() as i64,
                _ => return Err(RuntimeError::type_error("String, Array or Dictionary", token.clone())),
            };
            Ok(Flow::Plain(Value::Number(Number::Integer(len))))
        }

        InstrKind::Alloc(n) => {
            let len = as_number(&val!(ctx, n), token)?.as_f64() as usize;
            Ok(Flow::Plain(Value::array(vec![Value::Nil; len])))
        }

        InstrKind::Switch { disc, cases, or_else } => {
            let d = val!(ctx, disc);
            for (label, _, body) in cases {
                let l = val!(ctx, label);
                if d.value_eq(&l) {
                    return eval_instruction(body, ctx);
                }
            }
            match or_else {
                Some(o) => eval_instruction(o, ctx),
                None => Ok(Flow::Plain(Value::Nil)),
            }
        }

        InstrKind::TryCatch { body, catch_name, catch_body } => {
            ctx.trace.push(StackFrame { name: String::new(), at: token.clone() });
            let result = eval_instruction(body, ctx);
            ctx.trace.pop();
            match result {
                Ok(flow) => Ok(flow),
                Err(err) => {
                    let child = ctx.scope.child(ScopeKind::Bounded, NameId::from_index(0));
                    child.create_variable(*catch_name, Value::string(err.message.clone()));
                    ctx.in_scope(child, |ctx| eval_instruction(catch_body, ctx))
                }
            }
        }

        InstrKind::Throw(v) => {
            let value = val!(ctx, v);
            let message = match value {
                Value::String(s) => s.to_string(),
                other => crate::coercion::stringify(&other),
            };
            Err(RuntimeError::user_thrown(message, token.clone()).with_trace(ctx.trace.clone()))
        }

        InstrKind::Extern { lib, func, args, spread } => {
            let arg_values = if *spread {
                // Produced only by the `extern name in "lib";` declaration
                // (§4.4): `args` holds one Instruction evaluating to the
                // whole bound argument Array, which gets flattened into
                // the host call rather than passed as a single Array arg.
                let Some(only) = args.first() else {
                    return Err(RuntimeError::new("malformed extern forwarder", token.clone()));
                };
                match val!(ctx, only) {
                    Value::Array(a) => a.borrow().clone(),
                    _ => return Err(RuntimeError::type_error("Array", token.clone())),
                }
            } else {
                let mut arg_values = Vec::with_capacity(args.len());
                for a in args {
                    arg_values.push(val!(ctx, a));
                }
                arg_values
            };
            crate::extension::call(lib, func, arg_values, token).map(Flow::Plain)
        }

        InstrKind::CharN(v) => {
            let value = val!(ctx, v);
            let Value::String(s) = &value else {
                return Err(RuntimeError::type_error("String", token.clone()));
            };
            let code = s.chars().next().map_or(0, u32::from);
            Ok(Flow::Plain(Value::Number(Number::Integer(i64::from(code)))))
        }

        InstrKind::CharS(v) => {
            let n = as_number(&val!(ctx, v), token)?.as_f64() as u32;
            let ch = char::from_u32(n).unwrap_or('\u{FFFD}');
            Ok(Flow::Plain(Value::string(ch.to_string())))
        }

        InstrKind::Parse(v) => {
            let value = val!(ctx, v);
            let Value::String(s) = &value else {
                return Err(RuntimeError::type_error("String", token.clone()));
            };
            // Lex, parse, fold, and evaluate a String as source against
            // the current scope (§4.5) — the meta-circular counterpart to
            // `load`, for source text produced at runtime.
            let node = crate::parser::parse_source("<parse>", s)?.fold();
            eval_instruction(&node.generate(), ctx)
        }

        InstrKind::TypeOf(v) => {
            let value = val!(ctx, v);
            Ok(Flow::Plain(Value::Type(value.augmented_kind())))
        }

        InstrKind::CallOpI(id, args) => {
            let mut arg_values = Vec::with_capacity(args.len());
            for a in args {
                arg_values.push(val!(ctx, a));
            }
            operators::call_by_id(*id, &arg_values, token).map(Flow::Plain)
        }

        InstrKind::ArrayLit(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let v = val!(ctx, item);
                if matches!(item.kind, InstrKind::Until { .. }) {
                    if let Value::Array(arr) = &v {
                        out.extend(arr.borrow().iter().cloned());
                        continue;
                    }
                }
                out.push(v);
            }
            Ok(Flow::Plain(Value::array(out)))
        }

        InstrKind::MatrixLit(rows) => {
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let mut r = Vec::with_capacity(row.len());
                for item in row {
                    r.push(val!(ctx, item));
                }
                out.push(Value::array(r));
            }
            Ok(Flow::Plain(Value::array(out)))
        }

        InstrKind::DictLit(pairs) => {
            let mut map = AHashMap::new();
            for (key, value) in pairs {
                let k = match key {
                    DictKeyInstr::Literal(s) => s.clone(),
                    DictKeyInstr::Expr(e) => crate::coercion::stringify(&val!(ctx, e)),
                };
                map.insert(k, val!(ctx, value));
            }
            Ok(Flow::Plain(Value::dictionary(map)))
        }

        InstrKind::Lambda { name, params, is_vargs, body } => {
            let f = make_function(*name, params, *is_vargs, body.clone(), ctx);
            Ok(Flow::Plain(Value::Function(f)))
        }

        InstrKind::FuncDecl { name, params, is_vargs, body } => {
            let f = make_function(*name, params, *is_vargs, body.clone(), ctx);
            ctx.scope.create_variable(*name, Value::Function(f.clone()));
            Ok(Flow::Plain(Value::Function(f)))
        }

        InstrKind::Load(path) => {
            // Resolved against the CLI's working directory (§4.5), i.e.
            // the process's current directory — `std::fs` does this for
            // any relative path without further help.
            let contents = std::fs::read_to_string(path)
                .map_err(|e| RuntimeError::new(format!("cannot load `{path}`: {e}"), token.clone()))?;
            let node = crate::parser::parse_source(path, &contents)?.fold();
            eval_instruction(&node.generate(), ctx)
        }
    }
}

/// Runs every body layer of `ctx.scope` in order (oldest ancestor first),
/// each statement executed directly against that scope (§4.5 `New`/`Class`
/// Static bodies).
fn run_body_layers(ctx: &mut RunCtx) -> RResult<()> {
    for layer in ctx.scope.bodies() {
        for stmt in layer.iter() {
            match eval_instruction(stmt, ctx)? {
                Flow::Plain(_) => {}
                _ => return Err(RuntimeError::new("unexpected control flow in a class body", stmt.token.clone())),
            }
        }
    }
    Ok(())
}

fn type_name(ty: &ParamType) -> &'static str {
    crate::kind::builtin_name(ty.base).unwrap_or("a class")
}

/// Decides whether `value` (the freshly evaluated RHS, produced by
/// `source`) should be bound by reference or by deep copy (§3.2, invariants
/// 3-4 of §8.1). Only a bare `Variable` read of a `:=`-declared binding
/// aliases; every other source — literals, calls, indexing, arithmetic —
/// is already a fresh value with no other owner, so a shallow clone is
/// enough (and `deep_clone` on a fresh Array/Dictionary is just a copy of
/// one, which is harmless but wasted work, so it is skipped).
fn bind_for_assignment(value: &Value, source: &Instruction, ctx: &RunCtx) -> Value {
    if let InstrKind::Variable(name) = &source.kind {
        if ctx.scope.is_const(*name) {
            return value.clone();
        }
        if matches!(value, Value::Array(_) | Value::Dictionary(_)) {
            return value.deep_clone();
        }
    }
    value.clone()
}

fn as_number(value: &Value, token: &crate::token::Token) -> RResult<Number> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(RuntimeError::type_error("Number", token.clone())),
    }
}

fn iterate(value: &Value, token: &crate::token::Token) -> RResult<Vec<Value>> {
    match value {
        Value::Array(a) => Ok(a.borrow().clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::string(c.to_string())).collect()),
        Value::Dictionary(d) => Ok(d.borrow().keys().map(|k| Value::string(k.clone())).collect()),
        _ => Err(RuntimeError::type_error("Array, String or Dictionary", token.clone())),
    }
}

/// Invokes a called value: a plain [`Value::Function`], or a [`Value::Object`]
/// with a `()` overload (§4.5 `Call`), else throws `not_callable`.
fn call_value(
    callee: &Value,
    args: Vec<Value>,
    arg_nodes: &[Instruction],
    ctx: &mut RunCtx,
    token: &crate::token::Token,
) -> RResult<Value> {
    match callee {
        Value::Function(f) => call_function(f, args, arg_nodes, ctx, token),
        Value::Object(scope) => match scope.get_own(hash("()")) {
            Some(Value::Function(f)) => call_function(&f, args, arg_nodes, ctx, token),
            _ => Err(RuntimeError::not_callable(token.clone())),
        },
        _ => Err(RuntimeError::not_callable(token.clone())),
    }
}

fn index_value(target: &Value, index: &Value, ctx: &mut RunCtx, token: &crate::token::Token) -> RResult<Flow> {
    match target {
        Value::Array(a) => {
            let len = a.borrow().len();
            let i = as_number(index, token)?.as_f64() as i64;
            let real = if i < 0 { i + len as i64 } else { i };
            if real < 0 || real as usize >= len {
                return Err(RuntimeError::out_of_bounds(i, len, token.clone()));
            }
            Ok(Flow::Plain(a.borrow()[real as usize].clone()))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len();
            let i = as_number(index, token)?.as_f64() as i64;
            let real = if i < 0 { i + len as i64 } else { i };
            if real < 0 || real as usize >= len {
                return Err(RuntimeError::out_of_bounds(i, len, token.clone()));
            }
            Ok(Flow::Plain(Value::string(chars[real as usize].to_string())))
        }
        Value::Dictionary(d) => {
            let key = crate::coercion::stringify(index);
            d.borrow()
                .get(&key)
                .cloned()
                .map(Flow::Plain)
                .ok_or_else(|| RuntimeError::no_such_key(&key, token.clone()))
        }
        Value::Object(scope) => match scope.get_own(hash("[]")) {
            Some(Value::Function(f)) => call_function(&f, vec![index.clone()], &[], ctx, token).map(Flow::Plain),
            _ => Err(RuntimeError::type_error("Array, String or Dictionary", token.clone())),
        },
        _ => Err(RuntimeError::type_error("Array, String or Dictionary", token.clone())),
    }
}

/// `a = b` where `a`'s current value is an Object with a `=` overload calls
/// that overload with `b` instead of rebinding/mutating `a` in place (§4.5
/// `Set`). Returns `Ok(None)` when `a` doesn't currently resolve (a fresh
/// declaration) or resolves to anything but such an Object.
fn assign_overload(
    target: &Instruction,
    value: &Value,
    ctx: &mut RunCtx,
    token: &crate::token::Token,
) -> RResult<Option<Value>> {
    let Ok(Flow::Plain(Value::Object(scope))) = eval_instruction(target, ctx) else {
        return Ok(None);
    };
    let Some(Value::Function(f)) = scope.get_own(hash("=")) else {
        return Ok(None);
    };
    call_function(&f, vec![value.clone()], &[], ctx, token).map(Some)
}

/// Assignment/declaration target handling for `Set` (§3.2, §4.8): a bare
/// `Variable` target may introduce a new binding (`:=`/`=` at statement
/// scope) or mutate an existing one; `Index`/`Inner` targets mutate
/// in place.
fn assign(
    target: &Instruction,
    value: Value,
    declare_const: bool,
    ctx: &mut RunCtx,
    token: &crate::token::Token,
) -> RResult<Flow> {
    if !declare_const {
        if let Some(result) = assign_overload(target, &value, ctx, token)? {
            return Ok(Flow::Plain(result));
        }
    }
    match &target.kind {
        InstrKind::Variable(name) => {
            if ctx.scope.set_variable(*name, value.clone()) {
                Ok(Flow::Plain(value))
            } else {
                ctx.scope.declare(*name, value.clone(), declare_const);
                Ok(Flow::Plain(value))
            }
        }
        InstrKind::Index(base, index) => {
            let base_v = val!(ctx, base);
            let index_v = val!(ctx, index);
            match &base_v {
                Value::Array(a) => {
                    let len = a.borrow().len();
                    let i = as_number(&index_v, token)?.as_f64() as i64;
                    let real = if i < 0 { i + len as i64 } else { i };
                    if real < 0 || real as usize >= len {
                        return Err(RuntimeError::out_of_bounds(i, len, token.clone()));
                    }
                    a.borrow_mut()[real as usize] = value.clone();
                    Ok(Flow::Plain(value))
                }
                Value::Dictionary(d) => {
                    let key = crate::coercion::stringify(&index_v);
                    d.borrow_mut().insert(key, value.clone());
                    Ok(Flow::Plain(value))
                }
                Value::Object(scope) => match scope.get_own(hash("[]=")) {
                    Some(Value::Function(f)) => call_function(&f, vec![index_v, value], &[], ctx, token).map(Flow::Plain),
                    _ => Err(RuntimeError::type_error("Array or Dictionary", token.clone())),
                },
                _ => Err(RuntimeError::type_error("Array or Dictionary", token.clone())),
            }
        }
        InstrKind::Inner(base, field) => {
            let name = match &field.kind {
                InstrKind::Variable(n) => *n,
                _ => return Err(RuntimeError::type_error("a field name", token.clone())),
            };
            let base_v = val!(ctx, base);
            match &base_v {
                Value::Object(scope) => {
                    scope.set_own(name, value.clone());
                    Ok(Flow::Plain(value))
                }
                Value::Dictionary(d) => {
                    d.borrow_mut().insert(dehash(name), value.clone());
                    Ok(Flow::Plain(value))
                }
                _ => Err(RuntimeError::type_error("Object or Dictionary", token.clone())),
            }
        }
        _ => Err(RuntimeError::new("invalid assignment target", token.clone())),
    }
}

fn make_function(
    name: NameId,
    params: &[ParamDecl],
    is_vargs: bool,
    body: Rc<Instruction>,
    ctx: &RunCtx,
) -> FunctionValue {
    let f = FunctionValue::new(name);
    let mut captures = AHashMap::new();
    for n in ctx.scope.own_names() {
        if let Some(v) = ctx.scope.get_own(n) {
            captures.insert(n, v);
        }
    }
    let overload = Overload {
        params: params
            .iter()
            .map(|p| Param { pass_mode: if p.by_ref { PassMode::ByRef } else { PassMode::ByValue }, name: p.name })
            .collect(),
        body,
        captures,
        defining_scope: Some(ctx.scope.downgrade()),
        is_vargs,
    };
    if is_vargs {
        f.set_varargs(overload);
    } else {
        let sig: Signature = params.iter().map(|p| p.param_type.clone()).collect();
        f.add_overload(sig, overload);
    }
    f
}

/// Calls a resolved overload of `f` with `args`, pushing/popping a
/// [`StackFrame`] and honoring `ByRef` write-back to bare-variable call
/// sites (§3.4, §6.4).
pub fn call_function(
    f: &FunctionValue,
    args: Vec<Value>,
    arg_nodes: &[Instruction],
    ctx: &mut RunCtx,
    token: &crate::token::Token,
) -> RResult<Value> {
    if ctx.depth >= MAX_CALL_DEPTH {
        return Err(RuntimeError::new("call stack exceeded maximum depth", token.clone()));
    }
    let overload = f
        .resolve(&args)
        .ok_or_else(|| RuntimeError::no_overload(&dehash(f.name()), args.len(), token.clone()))?;

    let base = overload.defining_scope.as_ref().and_then(crate::scope::ScopeWeak::upgrade).unwrap_or_else(|| ctx.scope.clone());
    let call_scope = base.child(ScopeKind::Bounded, NameId::from_index(0));
    for (k, v) in &overload.captures {
        call_scope.create_variable(*k, v.clone());
    }
    if overload.is_vargs {
        // A varargs overload declares exactly one name, which binds the
        // entire argument list as an Array rather than one positional
        // value (§3.4: "an optional single varargs form").
        if let Some(param) = overload.params.first() {
            call_scope.create_variable(param.name, Value::array(args.clone()));
        }
    } else {
        for (param, arg) in overload.params.iter().zip(args.iter()) {
            call_scope.create_variable(param.name, arg.clone());
        }
    }

    ctx.trace.push(StackFrame { name: dehash(f.name()), at: token.clone() });
    ctx.depth += 1;
    let flow = ctx.in_scope(call_scope.clone(), |ctx| eval_instruction(&overload.body, ctx));
    ctx.depth -= 1;
    ctx.trace.pop();
    let flow = flow?;

    for (param, arg_node) in overload.params.iter().zip(arg_nodes.iter()).take(if overload.is_vargs { 0 } else { usize::MAX }) {
        if param.pass_mode == PassMode::ByRef {
            if let InstrKind::Variable(name) = &arg_node.kind {
                if let Some(v) = call_scope.get_own(param.name) {
                    ctx.scope.set_variable(*name, v);
                }
            }
        }
    }

    Ok(match flow {
        Flow::Return(v) => v,
        Flow::Refer(v) => v,
        Flow::Plain(v) => v,
        Flow::Break | Flow::Continue => {
            return Err(RuntimeError::new("break/continue outside a loop", token.clone()))
        }
    })
}

/// Invoked by [`ScopeRef`]'s `Drop` impl when an object's deleter (`rem`)
/// fires (§3.3, §5).
pub fn invoke_deleter(f: &FunctionValue, this: ScopeRef) -> RResult<()> {
    let mut ctx = RunCtx::new(this.clone());
    let overload = match f.resolve(&[]) {
        Some(o) => o,
        None => return Ok(()),
    };
    let call_scope = this.child(ScopeKind::Bounded, NameId::from_index(0));
    ctx.in_scope(call_scope, |ctx| eval_instruction(&overload.body, ctx))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    fn tok() -> Token {
        Token::eof(Rc::from("<test>"))
    }

    #[test]
    fn sequence_flattens_until_ranges() {
        let scope = ScopeRef::root();
        let mut ctx = RunCtx::new(scope);
        let range = Instruction::new(
            tok(),
            InstrKind::Until {
                from: Box::new(Instruction::container(Value::Number(Number::Integer(1)))),
                to: Box::new(Instruction::container(Value::Number(Number::Integer(3)))),
                step: None,
                inclusive: true,
            },
        );
        let seq = Instruction::new(tok(), InstrKind::Sequence(vec![range]));
        let flow = eval_instruction(&seq, &mut ctx).unwrap();
        match flow {
            Flow::Plain(Value::Array(a)) => assert_eq!(a.borrow().len(), 3),
            _ => panic!("expected an array"),
        }
    }

    #[test]
    fn if_else_picks_the_truthy_branch() {
        let scope = ScopeRef::root();
        let mut ctx = RunCtx::new(scope);
        let instr = Instruction::new(
            tok(),
            InstrKind::IfElse {
                cond: Box::new(Instruction::container(Value::Boolean(false))),
                body: Box::new(Instruction::container(Value::Number(Number::Integer(1)))),
                or_else: Some(Box::new(Instruction::container(Value::Number(Number::Integer(2))))),
            },
        );
        match eval_instruction(&instr, &mut ctx).unwrap() {
            Flow::Plain(Value::Number(n)) => assert_eq!(n, Number::Integer(2)),
            _ => panic!("expected Plain(2)"),
        }
    }
}
