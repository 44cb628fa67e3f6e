//! The evaluation engine: environments, the explicit evaluation stack and the
//! core special forms.
//!
//! Evaluation is trampolined. [`eval`] holds the current expression and
//! environment plus a stack of [`StackFrame`]s; a frame is a suspended
//! special-form handler or procedure application that advances one step each
//! time a requested sub-evaluation completes. Handlers never call back into
//! [`eval`], so proftalk recursion of any depth costs heap frames only and
//! the host call stack stays flat. A handler that finishes in tail position pops
//! its frame *before* its result expression is evaluated, which is what makes
//! tail-recursive proftalk loops run in constant stack space.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::Error;
use crate::ast::{CoreForm, NativeProc, UserProc, Value, get, len, set_literal, to_vec};
use crate::builtinops::{ALTERNATE_NAMES, CORE_FORMS, LIBRARY_SOURCE, NATIVE_OPS};
use crate::parser::parse_line;

/// Reserved binding name a `let` frame uses to stash its body expression
/// while the bindings are evaluated. `let` refuses to bind it on behalf of
/// user code.
pub(crate) const LET_EXPRESSION_KEY: &str = "__let_expression__";

/// Expected argument count for a native procedure, validated before the
/// procedure body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// The procedure validates its own argument count.
    Any,
}

impl Arity {
    pub fn validate(&self, got: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(n) if got != *n => Err(Error::expecting_exactly(*n)),
            _ => Ok(()),
        }
    }
}

/// A scope: symbol bindings plus an optional outer scope. Environments are
/// shared by reference (`Rc`) because procedures capture them and `let`
/// bodies outlive the frame that created them; `define` mutates the innermost
/// map through the `RefCell`.
pub struct Env {
    bindings: RefCell<HashMap<String, Value>>,
    outer: Option<Rc<Env>>,
}

impl Env {
    pub fn new() -> Rc<Env> {
        Rc::new(Env {
            bindings: RefCell::new(HashMap::new()),
            outer: None,
        })
    }

    pub fn with_outer(outer: &Rc<Env>) -> Rc<Env> {
        Rc::new(Env {
            bindings: RefCell::new(HashMap::new()),
            outer: Some(Rc::clone(outer)),
        })
    }

    /// A fresh environment pre-bound to parallel parameter/argument slices.
    /// Surplus parameters stay absent; surplus arguments are dropped.
    pub fn extend(params: &[String], args: Vec<Value>, outer: &Rc<Env>) -> Rc<Env> {
        let env = Env::with_outer(outer);
        for (param, arg) in params.iter().zip(args) {
            env.define(param, arg);
        }
        env
    }

    /// Resolve a symbol by walking the scope chain outward. First hit wins.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut current = Some(self);
        while let Some(env) = current {
            if let Some(value) = env.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            current = env.outer.as_deref();
        }
        None
    }

    /// Bind a symbol in this scope, overwriting any existing binding here.
    pub fn define(&self, name: &str, value: Value) {
        self.bindings.borrow_mut().insert(name.to_owned(), value);
    }

    fn remove(&self, name: &str) -> Option<Value> {
        self.bindings.borrow_mut().remove(name)
    }

    /// True when the symbol is bound in this scope itself (outer scopes are
    /// not consulted).
    fn has_local(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }
}

/// What a handler step tells the trampoline: the next expression to
/// evaluate, the environment to evaluate it in, and whether this frame is
/// finished. A finished frame is popped before `expr` is evaluated.
struct StepOutcome {
    expr: Value,
    env: Rc<Env>,
    done: bool,
}

/// One suspended computation on the evaluation stack.
///
/// A frame is pushed with `step == -1` and no `running` procedure; the first
/// value fed to it must evaluate to a procedure (user, native or core form),
/// which then drives all subsequent steps. `step_input` carries the result of
/// the most recent sub-evaluation into the next step.
struct StackFrame {
    running: Option<Value>,
    /// The not-yet-consumed argument expressions.
    args: Value,
    env: Rc<Env>,
    step: i64,
    step_input: Value,
    /// Argument values accumulated by a procedure application.
    evaluated: Vec<Value>,
    /// The procedure an `apply` frame has resolved, parked while its
    /// argument list is evaluated.
    applied_proc: Option<Value>,
}

impl StackFrame {
    fn new(args: Value, env: Rc<Env>) -> Self {
        StackFrame {
            running: None,
            args,
            env,
            step: -1,
            step_input: Value::Blank,
            evaluated: Vec::new(),
            applied_proc: None,
        }
    }
}

/// Evaluate an S-expression in an environment.
///
/// This is the trampoline: one loop iteration either simplifies the current
/// expression one shape (symbol lookup, frame push) or feeds a finished value
/// to the top frame. Errors abort the whole stack and surface as the result
/// for the top-level expression.
pub fn eval(expr: &Value, env: &Rc<Env>) -> Result<Value, Error> {
    let mut expr = expr.clone();
    let mut env = Rc::clone(env);
    let mut stack: Vec<StackFrame> = Vec::new();

    loop {
        if expr.is_self_evaluating() {
            let Some(frame) = stack.last_mut() else {
                return Ok(expr);
            };

            let outcome = run_frame(frame, expr)?;
            if outcome.done {
                stack.pop();
            }
            expr = outcome.expr;
            env = outcome.env;
        } else if let Value::Symbol(name) = &expr {
            expr = env
                .lookup(name)
                .ok_or_else(|| Error::SymbolNotFound(name.clone()))?;
        } else {
            let Value::Pair(pair) = &expr else {
                unreachable!("only symbols and non-literal pairs are not self-evaluating")
            };
            let head = pair.head.clone();
            let tail = pair.tail.clone();

            // When the head symbol names a core form, the frame can start
            // immediately from the core-form value; otherwise the head
            // expression is evaluated first and must yield a procedure.
            let core_form = match &head {
                Value::Symbol(name) => match env.lookup(name) {
                    Some(value @ Value::CoreForm(_)) => Some(value),
                    _ => None,
                },
                _ => None,
            };

            stack.push(StackFrame::new(tail, Rc::clone(&env)));
            expr = core_form.unwrap_or(head);
        }
    }
}

/// Feed one value to a frame and advance it one step.
fn run_frame(frame: &mut StackFrame, input: Value) -> Result<StepOutcome, Error> {
    if frame.step == -1 && frame.running.is_none() {
        if !input.is_procedure() {
            return Err(Error::Type(format!(
                "Function '{input}' to execute was not a valid function."
            )));
        }
        frame.running = Some(input);
        frame.step = 0;
    } else {
        frame.step_input = input;
    }

    let running = match &frame.running {
        Some(proc) => proc.clone(),
        None => unreachable!("frame stepped before a procedure arrived"),
    };

    match running {
        Value::CoreForm(form) => run_core_form(form, frame),
        proc @ (Value::UserProc(_) | Value::NativeProc(_)) => run_application(frame, proc),
        _ => unreachable!("running slot only ever holds a procedure"),
    }
}

fn run_core_form(form: CoreForm, frame: &mut StackFrame) -> Result<StepOutcome, Error> {
    match form {
        CoreForm::Define => core_define(frame),
        CoreForm::If => core_if(frame),
        CoreForm::Lambda => core_lambda(frame),
        CoreForm::Quote => core_quote(frame),
        CoreForm::Apply => core_apply(frame),
        CoreForm::Let => core_let(frame),
        CoreForm::Cond => core_cond(frame),
        CoreForm::Begin => core_begin(frame),
        CoreForm::Exit => core_exit(),
        CoreForm::CallCc => Err(Error::Eval("call/cc not implemented".to_owned())),
    }
}

//
// Procedure application
//

/// Evaluate a procedure's argument expressions one at a time in the caller's
/// environment, then hand the collected values to [`enter_procedure`].
fn run_application(frame: &mut StackFrame, proc: Value) -> Result<StepOutcome, Error> {
    if frame.step > 0 {
        frame.evaluated.push(frame.step_input.clone());
    }
    frame.step += 1;

    match frame.args.clone() {
        Value::Pair(pair) => {
            frame.args = pair.tail.clone();
            Ok(StepOutcome {
                expr: pair.head.clone(),
                env: Rc::clone(&frame.env),
                done: false,
            })
        }
        _ => {
            let args = std::mem::take(&mut frame.evaluated);
            enter_procedure(&proc, args, &frame.env)
        }
    }
}

/// Invoke a procedure on already-evaluated argument values.
///
/// Native procedures run immediately. A user procedure's body is *returned*
/// as the next expression in a fresh environment chained to the captured one,
/// and the outcome is marked done so the application frame is popped first:
/// the body replaces the application rather than nesting under it.
fn enter_procedure(proc: &Value, args: Vec<Value>, caller_env: &Rc<Env>) -> Result<StepOutcome, Error> {
    match proc {
        Value::NativeProc(native) => {
            native.arity.validate(args.len())?;
            let result = (native.func)(&args)?;
            Ok(StepOutcome {
                expr: result,
                env: Rc::clone(caller_env),
                done: true,
            })
        }
        Value::UserProc(user) => {
            let call_env = Env::extend(&user.params, args, &user.env);
            Ok(StepOutcome {
                expr: user.body.clone(),
                env: call_env,
                done: true,
            })
        }
        other => Err(Error::Type(format!(
            "Function '{other}' to execute was not a valid function."
        ))),
    }
}

//
// Core special forms
//

fn core_define(frame: &mut StackFrame) -> Result<StepOutcome, Error> {
    frame.step += 1;
    match frame.step {
        1 => {
            if len(&frame.args)? != 2 {
                return Err(Error::expecting_exactly(2));
            }
            if !matches!(get(&frame.args, 0), Value::Symbol(_)) {
                return Err(Error::Type(
                    "Symbol given to define wasn't a symbol.".to_owned(),
                ));
            }
            Ok(StepOutcome {
                expr: get(&frame.args, 1),
                env: Rc::clone(&frame.env),
                done: false,
            })
        }
        2 => {
            let value = frame.step_input.clone();
            let Value::Symbol(name) = get(&frame.args, 0) else {
                unreachable!("symbol was validated in step 1")
            };
            // An anonymous procedure bound by define learns its name, purely
            // for display.
            if let Value::UserProc(proc) = &value {
                proc.give_name(&name);
            }
            frame.env.define(&name, value);
            Ok(StepOutcome {
                expr: Value::Blank,
                env: Rc::clone(&frame.env),
                done: true,
            })
        }
        step => panic!("Invalid step {step} in define"),
    }
}

fn core_if(frame: &mut StackFrame) -> Result<StepOutcome, Error> {
    frame.step += 1;
    match frame.step {
        1 => {
            if len(&frame.args)? != 3 {
                return Err(Error::expecting_exactly(3));
            }
            Ok(StepOutcome {
                expr: get(&frame.args, 0),
                env: Rc::clone(&frame.env),
                done: false,
            })
        }
        2 => {
            let branch = match frame.step_input {
                Value::Bool(true) => get(&frame.args, 1),
                Value::Bool(false) => get(&frame.args, 2),
                _ => {
                    return Err(Error::Type(
                        "Test given to conditional did not evaluate to a bool.".to_owned(),
                    ));
                }
            };
            // Tail position: the winning branch replaces this frame.
            Ok(StepOutcome {
                expr: branch,
                env: Rc::clone(&frame.env),
                done: true,
            })
        }
        step => panic!("Invalid step {step} in if"),
    }
}

fn core_lambda(frame: &mut StackFrame) -> Result<StepOutcome, Error> {
    if len(&frame.args)? != 2 {
        return Err(Error::expecting_exactly(2));
    }

    let params_list = get(&frame.args, 0);
    if !params_list.is_list() {
        return Err(Error::Type(
            "Symbol list to bind within lambda wasn't a list.".to_owned(),
        ));
    }

    let mut params = Vec::new();
    for item in to_vec(&params_list) {
        match item {
            Value::Symbol(name) => params.push(name),
            _ => {
                return Err(Error::Type(
                    "Symbol list to bind within lambda wasn't a list.".to_owned(),
                ));
            }
        }
    }

    let body = get(&frame.args, 1);
    let proc = Value::UserProc(Rc::new(UserProc::new(
        params,
        body,
        Rc::clone(&frame.env),
    )));
    Ok(StepOutcome {
        expr: proc,
        env: Rc::clone(&frame.env),
        done: true,
    })
}

fn core_quote(frame: &mut StackFrame) -> Result<StepOutcome, Error> {
    let Value::Pair(args) = &frame.args else {
        return Err(Error::Eval("Need something to quote.".to_owned()));
    };
    if !matches!(args.tail, Value::Nil) {
        return Err(Error::Eval("Too many arguments to quote.".to_owned()));
    }

    let arg = args.head.clone();
    if matches!(arg, Value::Pair(_)) {
        set_literal(&arg, true);
    }
    Ok(StepOutcome {
        expr: arg,
        env: Rc::clone(&frame.env),
        done: true,
    })
}

fn core_apply(frame: &mut StackFrame) -> Result<StepOutcome, Error> {
    frame.step += 1;
    match frame.step {
        1 => {
            if len(&frame.args)? != 2 {
                return Err(Error::expecting_exactly(2));
            }
            Ok(StepOutcome {
                expr: get(&frame.args, 0),
                env: Rc::clone(&frame.env),
                done: false,
            })
        }
        2 => {
            let proc = frame.step_input.clone();
            if !matches!(proc, Value::UserProc(_) | Value::NativeProc(_)) {
                return Err(Error::Type(
                    "Function given to apply doesn't evaluate as a function.".to_owned(),
                ));
            }
            frame.applied_proc = Some(proc);
            Ok(StepOutcome {
                expr: get(&frame.args, 1),
                env: Rc::clone(&frame.env),
                done: false,
            })
        }
        3 => {
            let list = frame.step_input.clone();
            if !list.is_list() {
                return Err(Error::Type(
                    "List given to apply doesn't evaluate as a list.".to_owned(),
                ));
            }
            let Some(proc) = frame.applied_proc.take() else {
                unreachable!("procedure was parked in step 2")
            };
            // The list elements are values already; re-enter application
            // without evaluating them again.
            enter_procedure(&proc, to_vec(&list), &frame.env)
        }
        step => panic!("Invalid step {step} in apply"),
    }
}

fn core_let(frame: &mut StackFrame) -> Result<StepOutcome, Error> {
    frame.step += 1;

    if frame.step == 1 {
        if len(&frame.args)? != 2 {
            return Err(Error::Arity(
                "Let statements take two arguments: a list of bindings and an S-expression to evaluate."
                    .to_owned(),
            ));
        }

        let bindings = get(&frame.args, 0);
        match &bindings {
            Value::Pair(pair) => {
                if pair.is_literal() {
                    return Err(Error::Eval("List of bindings cannot be literal.".to_owned()));
                }
            }
            Value::Nil => {}
            _ => {
                return Err(Error::Type(
                    "First argument to a let statement must be a list of bindings.".to_owned(),
                ));
            }
        }

        // All bindings and the body evaluate in a fresh scope chained to the
        // caller's; the body is parked in it under the reserved key.
        let let_env = Env::with_outer(&frame.env);
        let_env.define(LET_EXPRESSION_KEY, get(&frame.args, 1));
        frame.env = let_env;
        frame.args = bindings;
    } else {
        // The previous step evaluated a binding's value expression; bind it.
        let Value::Pair(remaining) = frame.args.clone() else {
            unreachable!("bindings were validated before evaluation")
        };
        let Value::Pair(binding) = remaining.head.clone() else {
            unreachable!("binding shape was validated before evaluation")
        };
        let Value::Symbol(name) = binding.head.clone() else {
            unreachable!("binding name was validated before evaluation")
        };
        frame.env.define(&name, frame.step_input.clone());
        frame.args = remaining.tail.clone();
    }

    if matches!(frame.args, Value::Nil) {
        // All bindings made; retrieve the parked body and evaluate it in the
        // let scope, in tail position.
        let Some(body) = frame.env.remove(LET_EXPRESSION_KEY) else {
            unreachable!("let body was parked in step 1")
        };
        return Ok(StepOutcome {
            expr: body,
            env: Rc::clone(&frame.env),
            done: true,
        });
    }

    let bind_num = frame.step;
    let binding = get(&frame.args, 0);
    let binding_pair = match &binding {
        Value::Pair(pair) => pair,
        _ => {
            return Err(Error::Eval(format!(
                "Binding #{bind_num} is not an S-expression."
            )));
        }
    };
    if len(&binding)? != 2 {
        return Err(Error::Eval(format!(
            "Binding #{bind_num} does not have two elements."
        )));
    }
    if binding_pair.is_literal() {
        return Err(Error::Eval(format!(
            "Binding #{bind_num} was literal; no binding may be literal."
        )));
    }

    let name = match &binding_pair.head {
        Value::Symbol(name) if !name.is_empty() => name.clone(),
        _ => {
            return Err(Error::Eval(format!(
                "Binding #{bind_num} has a non-string, empty string, or string literal symbol."
            )));
        }
    };
    if name == LET_EXPRESSION_KEY {
        return Err(Error::Eval(format!(
            "let: unable to bind internal symbol \"{LET_EXPRESSION_KEY}\"."
        )));
    }
    if frame.env.has_local(&name) {
        return Err(Error::Eval(format!(
            "Binding #{bind_num} attempted to re-bind already bound symbol '{name}'."
        )));
    }

    // Evaluate the binding's value in the let scope, so earlier bindings are
    // already visible.
    Ok(StepOutcome {
        expr: get(&binding, 1),
        env: Rc::clone(&frame.env),
        done: false,
    })
}

fn core_cond(frame: &mut StackFrame) -> Result<StepOutcome, Error> {
    frame.step += 1;

    if frame.step == 1 && matches!(frame.args, Value::Nil) {
        return Err(Error::Eval("Must give at least one clause to cond.".to_owned()));
    }

    if frame.step > 1 {
        let passed = match frame.step_input {
            Value::Bool(passed) => passed,
            _ => {
                return Err(Error::Type(format!(
                    "Clause #{}'s test expression did not evaluate to a bool.",
                    frame.step - 1
                )));
            }
        };

        if passed {
            // The clause was validated before its test was evaluated.
            let clause = get(&frame.args, 0);
            return Ok(StepOutcome {
                expr: get(&clause, 1),
                env: Rc::clone(&frame.env),
                done: true,
            });
        }

        let Value::Pair(remaining) = frame.args.clone() else {
            unreachable!("clause list was validated before evaluation")
        };
        frame.args = remaining.tail.clone();
        if matches!(frame.args, Value::Nil) {
            return Err(Error::Eval(
                "At least one test given to cond must pass.".to_owned(),
            ));
        }
    }

    let clause_num = frame.step;
    let clause = get(&frame.args, 0);
    let clause_pair = match &clause {
        Value::Pair(pair) => pair,
        _ => {
            return Err(Error::Eval(format!("Clause #{clause_num} was not a list.")));
        }
    };
    if len(&clause)? != 2 {
        return Err(Error::Eval(format!(
            "Clause #{clause_num} was a list with more than two elements."
        )));
    }
    if clause_pair.is_literal() {
        return Err(Error::Eval(format!(
            "Clause #{clause_num} was a literal list. Clauses may not be literal lists."
        )));
    }

    Ok(StepOutcome {
        expr: clause_pair.head.clone(),
        env: Rc::clone(&frame.env),
        done: false,
    })
}

fn core_begin(frame: &mut StackFrame) -> Result<StepOutcome, Error> {
    if frame.step == 0 {
        frame.step = 1;
        frame.env = Env::with_outer(&frame.env);
    }

    match frame.args.clone() {
        Value::Nil => Ok(StepOutcome {
            // The last sub-result is the form's result; an empty begin yields
            // the frame's initial Blank.
            expr: frame.step_input.clone(),
            env: Rc::clone(&frame.env),
            done: true,
        }),
        Value::Pair(pair) => {
            frame.args = pair.tail.clone();
            Ok(StepOutcome {
                expr: pair.head.clone(),
                env: Rc::clone(&frame.env),
                done: false,
            })
        }
        _ => Err(Error::Eval("begin: expression list not a list".to_owned())),
    }
}

fn core_exit() -> Result<StepOutcome, Error> {
    println!("\nhave a nice day ;)");
    std::process::exit(0);
}

//
// Bootstrap
//

/// Build the global environment: constants, native procedures, core forms,
/// the bundled proftalk library, and finally the scheme-flavored aliases.
///
/// A library expression failing to evaluate is a build defect, not a user
/// error, so it panics.
pub fn create_global_env() -> Rc<Env> {
    let env = Env::new();

    env.define("pi", Value::Float(std::f64::consts::PI));
    env.define("euler", Value::Float(std::f64::consts::E));

    for op in NATIVE_OPS {
        env.define(
            op.name,
            Value::NativeProc(Rc::new(NativeProc {
                name: op.name,
                arity: op.arity,
                func: op.func,
            })),
        );
    }

    for &(name, form) in CORE_FORMS {
        env.define(name, Value::CoreForm(form));
    }

    let library_exprs = parse_line(LIBRARY_SOURCE)
        .unwrap_or_else(|err| panic!("error parsing library source: {err}"));
    for expr in library_exprs {
        if let Err(err) = eval(&expr, &env) {
            panic!("error in library expression: '{err}'\nExpression:\n{expr}");
        }
    }

    for &(alias, target) in ALTERNATE_NAMES {
        let value = eval(&Value::Symbol(target.to_owned()), &env)
            .unwrap_or_else(|err| panic!("alias target '{target}' missing: {err}"));
        env.define(alias, value);
    }

    env
}
