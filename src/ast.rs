//! The value model for the interpreter: atoms, cons pairs, procedures and
//! the handful of interpreter-internal values, together with their printing
//! and equality semantics. Lists are chains of reference-counted [`Pair`]s
//! terminated by [`Value::Nil`]; a chain whose `literal` flag is set is data
//! and is never evaluated as an application. Equality is by value for atoms
//! and by identity for pairs and procedures, which is exactly what the `eq?`
//! builtin exposes to user code.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::evaluator::{Arity, Env};

/// One cons cell. `tail` is either another `Pair` or `Nil` for every list the
/// interpreter itself constructs; `literal` is uniform along a chain's spine.
pub struct Pair {
    pub head: Value,
    pub tail: Value,
    literal: Cell<bool>,
}

impl Pair {
    pub fn is_literal(&self) -> bool {
        self.literal.get()
    }
}

impl Drop for Pair {
    fn drop(&mut self) {
        // Unlink the spine iteratively. The default recursive drop would
        // exhaust the host stack on a chain of a hundred thousand pairs.
        let mut tail = std::mem::replace(&mut self.tail, Value::Nil);
        while let Value::Pair(pair) = tail {
            match Rc::try_unwrap(pair) {
                Ok(mut inner) => {
                    tail = std::mem::replace(&mut inner.tail, Value::Nil);
                }
                // Still shared; whoever holds the other reference frees the
                // rest of the chain later.
                Err(_) => break,
            }
        }
    }
}

/// A user-defined procedure: parameter names, an unevaluated body and the
/// environment captured when the lambda form was evaluated.
pub struct UserProc {
    name: RefCell<String>,
    pub params: Vec<String>,
    pub body: Value,
    pub env: Rc<Env>,
}

impl UserProc {
    pub fn new(params: Vec<String>, body: Value, env: Rc<Env>) -> Self {
        UserProc {
            name: RefCell::new(String::new()),
            params,
            body,
            env,
        }
    }

    /// Names the procedure if it is still anonymous. Racket-style: the name
    /// only affects printing, never execution.
    pub fn give_name(&self, name: &str) {
        let mut current = self.name.borrow_mut();
        if current.is_empty() {
            current.push_str(name);
        }
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }
}

/// The canonical signature of a native procedure: already-evaluated argument
/// values in, one value or an error out.
pub type NativeFn = fn(&[Value]) -> Result<Value, Error>;

/// A procedure implemented in Rust. The arity is validated before `func`
/// runs, so fixed-arity natives can index their argument slice freely.
pub struct NativeProc {
    pub name: &'static str,
    pub arity: Arity,
    pub func: NativeFn,
}

/// Identifies one of the core special forms. Core-form values exist only as
/// global bindings installed at bootstrap; user code cannot construct them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreForm {
    Define,
    If,
    Lambda,
    Quote,
    Apply,
    Let,
    Cond,
    Begin,
    Exit,
    CallCc,
}

/// A proftalk value (and, equally, a proftalk expression: programs are data).
#[derive(Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// An identifier, equal by its string value.
    Symbol(String),
    /// A datum produced by quoting a bare atom or by `readln`; prints with a
    /// leading apostrophe.
    QuotedString(String),
    /// The distinguished empty list.
    Nil,
    Pair(Rc<Pair>),
    UserProc(Rc<UserProc>),
    NativeProc(Rc<NativeProc>),
    CoreForm(CoreForm),
    /// The "no visible result" value returned by `define`; the REPL prints
    /// nothing for it.
    Blank,
}

impl Value {
    /// True for every value the trampoline hands directly to the top stack
    /// frame: everything except symbols (which are looked up) and non-literal
    /// pairs (which are applications).
    pub fn is_self_evaluating(&self) -> bool {
        match self {
            Value::Symbol(_) => false,
            Value::Pair(p) => p.is_literal(),
            _ => true,
        }
    }

    /// True for the values the REPL prefixes with `'`: the empty list and
    /// literal chains.
    pub fn is_literal_list(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Pair(p) => p.is_literal(),
            _ => false,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::Nil | Value::Pair(_))
    }

    pub fn is_procedure(&self) -> bool {
        matches!(
            self,
            Value::UserProc(_) | Value::NativeProc(_) | Value::CoreForm(_)
        )
    }
}

//
// Cons utilities
//

/// Prepend `head` onto `tail`.
pub fn cons(head: Value, tail: Value, literal: bool) -> Value {
    Value::Pair(Rc::new(Pair {
        head,
        tail,
        literal: Cell::new(literal),
    }))
}

/// Build a chain from an ordered sequence of values.
pub fn list_from<I>(values: I, literal: bool) -> Value
where
    I: IntoIterator<Item = Value>,
    I::IntoIter: DoubleEndedIterator,
{
    let mut head = Value::Nil;
    for value in values.into_iter().rev() {
        head = cons(value, head, literal);
    }
    head
}

/// The nth head of a chain.
///
/// Panics when the chain is shorter than `n + 1` elements; callers validate
/// length first wherever user input can reach this.
pub fn get(list: &Value, n: usize) -> Value {
    let mut current = list;
    for _ in 0..n {
        match current {
            Value::Pair(p) => current = &p.tail,
            other => panic!("get: index {n} out of range in {other}"),
        }
    }
    match current {
        Value::Pair(p) => p.head.clone(),
        other => panic!("get: index {n} out of range in {other}"),
    }
}

/// Number of pairs in a chain. Errors if the spine does not terminate in the
/// empty list.
pub fn len(list: &Value) -> Result<usize, Error> {
    let mut count = 0;
    let mut current = list;
    loop {
        match current {
            Value::Nil => return Ok(count),
            Value::Pair(p) => {
                count += 1;
                current = &p.tail;
            }
            _ => return Err(Error::Eval("pair does not represent a list".to_owned())),
        }
    }
}

/// Copy a chain's heads into a vector. Stops at the first non-pair tail.
pub fn to_vec(list: &Value) -> Vec<Value> {
    let mut result = Vec::new();
    let mut current = list;
    while let Value::Pair(p) = current {
        result.push(p.head.clone());
        current = &p.tail;
    }
    result
}

/// Toggle the literal flag of every pair along a chain's spine. A literal
/// chain is data: the evaluator will never treat it as an application.
pub fn set_literal(list: &Value, literal: bool) {
    let mut current = list;
    while let Value::Pair(p) = current {
        p.literal.set(literal);
        current = &p.tail;
    }
}

//
// Test-ergonomics helpers, in the spirit of the `Display` forms below.
//

/// Helper for creating symbols.
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym(name: &str) -> Value {
    Value::Symbol(name.to_owned())
}

/// Helper for creating the empty list.
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::Nil
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            // Debug formatting keeps a ".0" on whole floats, so a printed
            // float re-parses as a float rather than an int.
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::QuotedString(s) => write!(f, "'{s}"),
            Value::Nil => write!(f, "()"),
            Value::Pair(_) => {
                // The spine is walked iteratively so that printing a long
                // list cannot exhaust the host stack; only nested heads
                // recurse.
                write!(f, "(")?;
                let mut current = self;
                let mut first = true;
                loop {
                    match current {
                        Value::Pair(p) => {
                            if !first {
                                write!(f, " ")?;
                            }
                            write!(f, "{}", p.head)?;
                            first = false;
                            current = &p.tail;
                        }
                        Value::Nil => break,
                        other => {
                            write!(f, " . {other}")?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::UserProc(p) => {
                let name = p.name();
                if name.is_empty() {
                    write!(f, "#<procedure>")
                } else {
                    write!(f, "#<procedure:{name}>")
                }
            }
            Value::NativeProc(p) => write!(f, "#<procedure:{}>", p.name),
            Value::CoreForm(_) => write!(f, "#<core procedure>"),
            Value::Blank => Ok(()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::QuotedString(s) => write!(f, "QuotedString({s:?})"),
            Value::Nil => write!(f, "Nil"),
            Value::Pair(p) => write!(
                f,
                "Pair({}, literal={})",
                self,
                p.is_literal()
            ),
            Value::UserProc(_) | Value::NativeProc(_) => write!(f, "{self}"),
            Value::CoreForm(form) => write!(f, "CoreForm({form:?})"),
            Value::Blank => write!(f, "Blank"),
        }
    }
}

impl PartialEq for Value {
    /// Value equality for atoms, identity for pairs and procedures. This is
    /// deliberate: `(eq? x x)` holds for any `x`, but two structurally equal
    /// lists built separately are distinct.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::QuotedString(a), Value::QuotedString(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::UserProc(a), Value::UserProc(b)) => Rc::ptr_eq(a, b),
            (Value::NativeProc(a), Value::NativeProc(b)) => Rc::ptr_eq(a, b),
            (Value::CoreForm(a), Value::CoreForm(b)) => a == b,
            (Value::Blank, Value::Blank) => true,
            _ => false,
        }
    }
}
