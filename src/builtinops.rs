//! Native procedures, the core-form name table, and the bundled proftalk
//! library.
//!
//! Natives receive their arguments already evaluated, as a slice. Each
//! registry entry carries an [`Arity`]; `Arity::Exact` is enforced by the
//! evaluator before the function body runs, while variadic operations
//! (`Arity::Any`) validate whatever they need themselves.
//!
//! The arithmetic operations are variadic and dual-accumulator: they track an
//! integer and a float total side by side and return an `Int` unless a float
//! operand was seen. Division additionally collapses back to `Int` when the
//! float total agrees with the integer one.

use std::io::BufRead;

use crate::Error;
use crate::ast::{CoreForm, NativeFn, Value, cons, list_from, set_literal};
use crate::evaluator::Arity;

/// One registry entry for a native procedure.
pub struct NativeOp {
    pub name: &'static str,
    pub arity: Arity,
    pub func: NativeFn,
}

/// Every native procedure installed into the global environment at startup.
pub static NATIVE_OPS: &[NativeOp] = &[
    NativeOp { name: "+", arity: Arity::Any, func: add },
    NativeOp { name: "-", arity: Arity::Any, func: subtract },
    NativeOp { name: "*", arity: Arity::Any, func: multiply },
    NativeOp { name: "/", arity: Arity::Any, func: divide },
    NativeOp { name: "%", arity: Arity::Exact(2), func: modulo },
    NativeOp { name: "sqrt", arity: Arity::Exact(1), func: square_root },
    NativeOp { name: "or", arity: Arity::Exact(2), func: or },
    NativeOp { name: "and", arity: Arity::Exact(2), func: and },
    NativeOp { name: "not", arity: Arity::Exact(1), func: not },
    NativeOp { name: "eq?", arity: Arity::Exact(2), func: equals },
    NativeOp { name: "most-probably?", arity: Arity::Exact(2), func: most_probably },
    NativeOp { name: "empty?", arity: Arity::Exact(1), func: is_empty },
    NativeOp { name: "one-less-car", arity: Arity::Exact(1), func: car },
    NativeOp { name: "come-from-behind", arity: Arity::Exact(1), func: cdr },
    NativeOp { name: "cons", arity: Arity::Exact(2), func: cons_pair },
    NativeOp { name: "pair?", arity: Arity::Exact(1), func: is_pair },
    NativeOp { name: "you-folks", arity: Arity::Any, func: you_folks },
    NativeOp { name: "<", arity: Arity::Exact(2), func: less_than },
    NativeOp { name: "readln", arity: Arity::Any, func: read_line },
];

/// The core special forms, bound under both their proftalk names and the
/// conventional Scheme spellings.
pub static CORE_FORMS: &[(&str, CoreForm)] = &[
    ("define", CoreForm::Define),
    ("yknow", CoreForm::Define),
    ("if", CoreForm::If),
    ("insofaras", CoreForm::If),
    ("lambda", CoreForm::Lambda),
    ("bring-me-back-something-good", CoreForm::Lambda),
    ("quote", CoreForm::Quote),
    ("this-guy", CoreForm::Quote),
    ("apply", CoreForm::Apply),
    ("crunch-crunch-crunch", CoreForm::Apply),
    ("let", CoreForm::Let),
    ("cond", CoreForm::Cond),
    ("begin", CoreForm::Begin),
    ("exit", CoreForm::Exit),
    ("call/cc", CoreForm::CallCc),
];

/// Scheme-flavored aliases, installed after the library has been evaluated so
/// that `fact` can point at the library's `in-fact`.
pub static ALTERNATE_NAMES: &[(&str, &str)] = &[
    ("car", "one-less-car"),
    ("cdr", "come-from-behind"),
    ("list", "you-folks"),
    ("fact", "in-fact"),
];

//
// Arithmetic
//

fn overflow(op: &str) -> Error {
    Error::Eval(format!("Integer overflow in {op}."))
}

fn add(args: &[Value]) -> Result<Value, Error> {
    let mut use_float = false;
    let mut total: i64 = 0;
    let mut float_total: f64 = 0.0;

    for arg in args {
        match arg {
            Value::Int(n) => {
                total = total.checked_add(*n).ok_or_else(|| overflow("addition"))?;
                float_total += *n as f64;
            }
            Value::Float(f) => {
                float_total += f;
                use_float = true;
            }
            _ => {
                return Err(Error::Type(
                    "Invalid types to add. Must all be int or float.".to_owned(),
                ));
            }
        }
    }

    if use_float {
        Ok(Value::Float(float_total))
    } else {
        Ok(Value::Int(total))
    }
}

fn subtract(args: &[Value]) -> Result<Value, Error> {
    match args {
        [] => return Err(Error::Arity("Need at least 1 value to subtract.".to_owned())),
        [Value::Int(n)] => {
            return n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| overflow("negation"));
        }
        [Value::Float(f)] => return Ok(Value::Float(-f)),
        [_] => {
            return Err(Error::Type(
                "Invalid types to subtract. Must all be int or float.".to_owned(),
            ));
        }
        _ => {}
    }

    let mut use_float = false;
    let mut total: i64 = 0;
    let mut float_total: f64 = 0.0;

    for (idx, arg) in args.iter().enumerate() {
        let (int_part, float_part) = match arg {
            Value::Int(n) => (Some(*n), *n as f64),
            Value::Float(f) => {
                use_float = true;
                (None, *f)
            }
            _ => {
                return Err(Error::Type(
                    "Invalid types to subtract. Must all be int or float.".to_owned(),
                ));
            }
        };

        if idx == 0 {
            if let Some(n) = int_part {
                total = n;
            }
            float_total = float_part;
        } else {
            if let Some(n) = int_part {
                total = total.checked_sub(n).ok_or_else(|| overflow("subtraction"))?;
            }
            float_total -= float_part;
        }
    }

    if use_float {
        Ok(Value::Float(float_total))
    } else {
        Ok(Value::Int(total))
    }
}

fn multiply(args: &[Value]) -> Result<Value, Error> {
    let mut use_float = false;
    let mut total: i64 = 1;
    let mut float_total: f64 = 1.0;

    for arg in args {
        match arg {
            Value::Int(n) => {
                total = total
                    .checked_mul(*n)
                    .ok_or_else(|| overflow("multiplication"))?;
                float_total *= *n as f64;
            }
            Value::Float(f) => {
                float_total *= f;
                use_float = true;
            }
            _ => {
                return Err(Error::Type(
                    "Invalid types to multiply. Must all be int or float.".to_owned(),
                ));
            }
        }
    }

    if use_float {
        Ok(Value::Float(float_total))
    } else {
        Ok(Value::Int(total))
    }
}

fn divide(args: &[Value]) -> Result<Value, Error> {
    let mut use_float = false;
    let mut total: i64 = 0;
    let mut float_total: f64 = 0.0;

    for (idx, arg) in args.iter().enumerate() {
        if idx == 0 {
            match arg {
                Value::Int(n) => {
                    total = *n;
                    float_total = *n as f64;
                }
                Value::Float(f) => {
                    float_total = *f;
                    use_float = true;
                }
                _ => {
                    return Err(Error::Type(
                        "Invalid types to divide. Must all be int or float.".to_owned(),
                    ));
                }
            }
            continue;
        }

        match arg {
            Value::Int(0) => {
                return Err(Error::Eval(
                    "Division by zero is currently unsupported.".to_owned(),
                ));
            }
            Value::Float(f) if *f == 0.0 => {
                return Err(Error::Eval(
                    "Division by zero is currently unsupported.".to_owned(),
                ));
            }
            Value::Int(n) => {
                total = total.checked_div(*n).ok_or_else(|| overflow("division"))?;
                float_total /= *n as f64;
            }
            Value::Float(f) => {
                float_total /= f;
                use_float = true;
            }
            _ => {
                return Err(Error::Type(
                    "Invalid types to divide. Must all be int or float.".to_owned(),
                ));
            }
        }
    }

    // An all-integer division truncates; a float division that lands exactly
    // on the integer total collapses back to an Int.
    if total as f64 == float_total {
        return Ok(Value::Int(total));
    }
    if use_float {
        Ok(Value::Float(float_total))
    } else {
        Ok(Value::Int(total))
    }
}

fn modulo(args: &[Value]) -> Result<Value, Error> {
    let (Value::Int(a), Value::Int(b)) = (&args[0], &args[1]) else {
        return Err(Error::Type(
            "Invalid types to divide. Must be int and int.".to_owned(),
        ));
    };

    if *b == 0 {
        return Err(Error::Eval(
            "Division by zero is currently unsupported.".to_owned(),
        ));
    }

    a.checked_rem(*b)
        .map(Value::Int)
        .ok_or_else(|| overflow("modulus"))
}

fn square_root(args: &[Value]) -> Result<Value, Error> {
    let operand = match &args[0] {
        Value::Int(n) => *n as f64,
        Value::Float(f) => *f,
        _ => {
            return Err(Error::Type(
                "Invalid type for square root. Must be int or float.".to_owned(),
            ));
        }
    };

    let result = operand.sqrt();
    // A perfect square comes back as an Int.
    if result.floor() == result {
        Ok(Value::Int(result as i64))
    } else {
        Ok(Value::Float(result))
    }
}

//
// Logic
//

fn bool_pair(args: &[Value]) -> Result<(bool, bool), Error> {
    match (&args[0], &args[1]) {
        (Value::Bool(a), Value::Bool(b)) => Ok((*a, *b)),
        _ => Err(Error::Type(
            "Invalid types to compare. Must be bool and bool.".to_owned(),
        )),
    }
}

fn or(args: &[Value]) -> Result<Value, Error> {
    let (a, b) = bool_pair(args)?;
    Ok(Value::Bool(a || b))
}

fn and(args: &[Value]) -> Result<Value, Error> {
    let (a, b) = bool_pair(args)?;
    Ok(Value::Bool(a && b))
}

fn not(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        _ => Err(Error::Type("Invalid type to invert. Must be bool.".to_owned())),
    }
}

//
// Comparison
//

fn equals(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0] == args[1]))
}

fn numeric_pair(args: &[Value], message: &str) -> Result<(f64, f64), Error> {
    let coerce = |value: &Value| match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    };
    match (coerce(&args[0]), coerce(&args[1])) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(Error::Type(message.to_owned())),
    }
}

fn less_than(args: &[Value]) -> Result<Value, Error> {
    let (a, b) = numeric_pair(args, "Invalid types to compare. Each must be int or float.")?;
    Ok(Value::Bool(a < b))
}

fn most_probably(args: &[Value]) -> Result<Value, Error> {
    // Two ints must match exactly; once a float is involved, "close enough"
    // means within half a unit.
    if let (Value::Int(a), Value::Int(b)) = (&args[0], &args[1]) {
        return Ok(Value::Bool(a == b));
    }
    let (a, b) = numeric_pair(args, "Invalid types to compare. Each must be int or float.")?;
    Ok(Value::Bool((a - b).abs() < 0.5))
}

//
// Lists
//

fn is_empty(args: &[Value]) -> Result<Value, Error> {
    if !args[0].is_list() {
        return Err(Error::Type(
            "Invalid type. Can only check if a list is empty.".to_owned(),
        ));
    }
    Ok(Value::Bool(matches!(args[0], Value::Nil)))
}

fn car(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Pair(pair) => Ok(pair.head.clone()),
        Value::Nil => Err(Error::Eval("Cannot take the car of an empty list.".to_owned())),
        _ => Err(Error::Type(
            "Invalid type. Can only take the car of a list.".to_owned(),
        )),
    }
}

fn cdr(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Pair(pair) => Ok(pair.tail.clone()),
        Value::Nil => Err(Error::Eval("Cannot take the cdr of an empty list.".to_owned())),
        _ => Err(Error::Type(
            "Invalid type. Can only take the cdr of a list.".to_owned(),
        )),
    }
}

fn cons_pair(args: &[Value]) -> Result<Value, Error> {
    if !args[1].is_list() {
        return Err(Error::Eval("Cannot cons to a non-list.".to_owned()));
    }

    let result = cons(args[0].clone(), args[1].clone(), true);
    // The whole resulting chain is data, even when the tail was built from
    // pieces that were not. A literal tail is uniformly flagged already, so
    // only a non-literal tail needs the spine walk.
    if !args[1].is_literal_list() {
        set_literal(&result, true);
    }
    Ok(result)
}

fn is_pair(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0].is_list()))
}

fn you_folks(args: &[Value]) -> Result<Value, Error> {
    Ok(list_from(args.iter().cloned(), true))
}

//
// I/O
//

fn read_line(_args: &[Value]) -> Result<Value, Error> {
    let mut line = String::new();
    let bytes = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|err| Error::Eval(err.to_string()))?;
    // A stream that ends before the newline delimiter is an EOF error; any
    // partial line is discarded.
    if bytes == 0 || !line.ends_with('\n') {
        return Err(Error::Eval("EOF".to_owned()));
    }
    Ok(Value::QuotedString(line))
}

/// Library procedures written in proftalk itself, evaluated into the global
/// environment at startup. Definition order matters: later procedures lean on
/// earlier ones.
pub const LIBRARY_SOURCE: &str = r#"
(yknow >
    (bring-me-back-something-good (a b)
        (< b a)
    )
)

(yknow <=
    (bring-me-back-something-good (a b)
        (or (< a b) (eq? a b))
    )
)

(yknow >=
    (bring-me-back-something-good (a b)
        (or (> a b) (eq? a b))
    )
)

(yknow <==>
    (bring-me-back-something-good (a b)
        (cond
            ((> a b) 1)
            ((eq? a b) 0)
            ((< a b) -1)
        )
    )
)

(yknow len
    (bring-me-back-something-good (lst)
        (insofaras (empty? lst)
            0
            (+ 1 (len (come-from-behind lst)))
        )
    )
)

(yknow fib
    (bring-me-back-something-good (n)
        (insofaras (< n 2)
            n
            (+ (fib (- n 1)) (fib (- n 2)))
        )
    )
)

(yknow in-fact
    (bring-me-back-something-good (n)
        (insofaras (eq? n 0)
            1
            (* n (in-fact (- n 1)))
        )
    )
)

(yknow map
    (bring-me-back-something-good (func lst)
        (insofaras (empty? lst)
            (you-folks)
            (cons
                (func (one-less-car lst))
                (map func (come-from-behind lst))
            )
        )
    )
)

(yknow foldl
    (bring-me-back-something-good (func start lst)
        (cond
            ((empty? lst) start)
            (#t (foldl func (func start (one-less-car lst)) (come-from-behind lst)))
        )
    )
)

(yknow pow
    (bring-me-back-something-good (x n)
        (cond
            ((eq? n 0) 1)
            ((eq? (% n 2) 0) (pow (* x x) (/ n 2)))
            (#t (* x (pow (* x x) (/ (- n 1) 2))))
        )
    )
)

(yknow powmod
    (bring-me-back-something-good (x n m)
        (cond
            ((eq? n 0)
                1)
            ((eq? (% n 2) 0)
                (% (powmod (% (* x x) m) (/ n 2) m) m))
            (#t
                (% (* x (powmod (% (* x x) m) (/ (- n 1) 2) m)) m))
        )
    )
)

(yknow slice-left
    (bring-me-back-something-good (lst count)
        (insofaras (eq? count 0)
            (you-folks)
            (cons
                (one-less-car lst)
                (slice-left (come-from-behind lst) (- count 1))
            )
        )
    )
)

(yknow slice-right
    (bring-me-back-something-good (lst count)
        (insofaras (eq? count 0)
            lst
            (slice-right (come-from-behind lst) (- count 1))
        )
    )
)

(yknow split
    (bring-me-back-something-good (lst)
        (you-folks
            (slice-left lst (/ (len lst) 2))
            (slice-right lst (/ (len lst) 2))
        )
    )
)

(yknow merge
    (bring-me-back-something-good (lst1 lst2)
        (cond
            ((empty? lst1)
                lst2)
            ((empty? lst2)
                lst1)
            ((< (one-less-car lst1) (one-less-car lst2))
                (cons (one-less-car lst1) (merge (come-from-behind lst1) lst2)))
            (#t
                (cons (one-less-car lst2) (merge (come-from-behind lst2) lst1)))
        )
    )
)

(yknow merge-sort
    (bring-me-back-something-good (lst)
        (insofaras (< (len lst) 2)
            lst
            (let (
                (left-half (slice-left lst (/ (len lst) 2)))
                (right-half (slice-right lst (/ (len lst) 2))))
            (merge (merge-sort left-half) (merge-sort right-half)))
        )
    )
)

(yknow min
    (bring-me-back-something-good (lst)
        (cond
            ((eq? (len lst) 1)
                (one-less-car lst))
            ((< (one-less-car lst) (min (come-from-behind lst)))
                (one-less-car lst))
            (#t
                (min (come-from-behind lst)))
        )
    )
)

(yknow max
    (bring-me-back-something-good (lst)
        (cond
            ((eq? (len lst) 1)
                (one-less-car lst))
            ((> (one-less-car lst) (max (come-from-behind lst)))
                (one-less-car lst))
            (#t
                (max (come-from-behind lst)))
        )
    )
)

(yknow range
    (bring-me-back-something-good (a b)
        (cond
            ((eq? a b) '())
            ((> a b) (cons a (range (- a 1) b)))
            (#t (cons a (range (+ a 1) b)))
        )
    )
)

(yknow srange
    (bring-me-back-something-good (n)
        (range 0 n)
    )
)

(yknow rrange
    (bring-me-back-something-good (n)
        (range n 0)
    )
)

(yknow reverse
    (bring-me-back-something-good (lst)
        (let (
            (reverse-helper (bring-me-back-something-good (lst work)
                (cond
                    ((empty? lst) work)
                    (#t (reverse-helper (come-from-behind lst) (cons (one-less-car lst) work)))))))

            (reverse-helper lst '())
        )
    )
)

(yknow repeat
    (bring-me-back-something-good (val num)
        (insofaras (<= num 0)
            '()
            (cons val (repeat val (- num 1)))
        )
    )
)

(yknow append
    (bring-me-back-something-good (lst1 lst2)
        (let (
            (append-elem (bring-me-back-something-good (lst elem)
                (cond
                    ((empty? lst)
                        (you-folks elem))
                    (#t
                        (cons (one-less-car lst) (append-elem (come-from-behind lst) elem)))))))
        (cond
            ((empty? lst2)
                lst1)
            (#t
                (append
                    (append-elem lst1 (car lst2))
                    (come-from-behind lst2)
                )
            )
        ))
    )
)

(yknow sum
    (bring-me-back-something-good (lst)
        (insofaras (empty? lst)
            0
            (+ (one-less-car lst) (sum (come-from-behind lst)))
        )
    )
)

(yknow count
    (bring-me-back-something-good (elem lst)
        (insofaras (empty? lst)
            0
            (sum (map (bring-me-back-something-good (val) (insofaras (eq? val elem) 1 0)) lst))
        )
    )
)
"#;

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::nil;

    fn int_list(values: &[i64]) -> Value {
        list_from(values.iter().map(|&n| Value::Int(n)), true)
    }

    /// Run (function, args, expected) triples against the native
    /// implementations directly.
    fn run_native_tests(cases: Vec<(NativeFn, Vec<Value>, Result<Value, &'static str>)>) {
        for (i, (func, args, expected)) in cases.iter().enumerate() {
            let test_id = format!("Native test #{}", i + 1);
            let result = func(args);
            match (result, expected) {
                (Ok(value), Ok(expected_value)) => {
                    assert_eq!(value, *expected_value, "{test_id}");
                }
                (Err(err), Err(message)) => {
                    assert_eq!(format!("{err}"), *message, "{test_id}");
                }
                (Ok(value), Err(message)) => {
                    panic!("{test_id}: expected error '{message}', got {value:?}");
                }
                (Err(err), Ok(expected_value)) => {
                    panic!("{test_id}: expected {expected_value:?}, got error: {err}");
                }
            }
        }
    }

    #[test]
    fn test_arithmetic_natives() {
        run_native_tests(vec![
            (add, vec![], Ok(Value::Int(0))),
            (add, vec![Value::Int(1), Value::Int(2)], Ok(Value::Int(3))),
            (
                add,
                vec![Value::Int(1), Value::Float(0.5)],
                Ok(Value::Float(1.5)),
            ),
            (
                add,
                vec![Value::Bool(true)],
                Err("Invalid types to add. Must all be int or float."),
            ),
            (subtract, vec![], Err("Need at least 1 value to subtract.")),
            (subtract, vec![Value::Int(5)], Ok(Value::Int(-5))),
            (subtract, vec![Value::Float(1.5)], Ok(Value::Float(-1.5))),
            (
                subtract,
                vec![Value::Int(55), Value::Int(90), Value::Int(22)],
                Ok(Value::Int(-57)),
            ),
            (multiply, vec![], Ok(Value::Int(1))),
            (
                multiply,
                vec![Value::Int(3), Value::Int(4), Value::Int(5)],
                Ok(Value::Int(60)),
            ),
            (divide, vec![Value::Int(10), Value::Int(4)], Ok(Value::Int(2))),
            (
                divide,
                vec![Value::Float(1.0), Value::Int(4)],
                Ok(Value::Float(0.25)),
            ),
            (
                divide,
                vec![Value::Float(8.0), Value::Int(4)],
                Ok(Value::Float(2.0)),
            ),
            (
                divide,
                vec![Value::Int(1), Value::Int(0)],
                Err("Division by zero is currently unsupported."),
            ),
            (modulo, vec![Value::Int(10), Value::Int(3)], Ok(Value::Int(1))),
            (
                modulo,
                vec![Value::Int(10), Value::Int(0)],
                Err("Division by zero is currently unsupported."),
            ),
            (square_root, vec![Value::Int(49)], Ok(Value::Int(7))),
            (
                square_root,
                vec![Value::Float(2.25)],
                Ok(Value::Float(1.5)),
            ),
        ]);
    }

    #[test]
    fn test_arithmetic_overflow_is_reported() {
        run_native_tests(vec![
            (
                add,
                vec![Value::Int(i64::MAX), Value::Int(1)],
                Err("Integer overflow in addition."),
            ),
            (
                multiply,
                vec![Value::Int(i64::MAX), Value::Int(2)],
                Err("Integer overflow in multiplication."),
            ),
            (
                subtract,
                vec![Value::Int(i64::MIN)],
                Err("Integer overflow in negation."),
            ),
            (
                divide,
                vec![Value::Int(i64::MIN), Value::Int(-1)],
                Err("Integer overflow in division."),
            ),
        ]);
    }

    #[test]
    fn test_commutativity_on_permitted_domains() {
        let samples = [
            (Value::Int(3), Value::Int(9)),
            (Value::Int(-4), Value::Float(2.5)),
            (Value::Float(0.125), Value::Float(8.0)),
        ];
        for (a, b) in samples {
            assert_eq!(
                add(&[a.clone(), b.clone()]).unwrap(),
                add(&[b.clone(), a.clone()]).unwrap()
            );
            assert_eq!(
                multiply(&[a.clone(), b.clone()]).unwrap(),
                multiply(&[b.clone(), a.clone()]).unwrap()
            );
        }

        for (a, b) in [(true, false), (true, true), (false, false)] {
            let (va, vb) = (Value::Bool(a), Value::Bool(b));
            assert_eq!(
                and(&[va.clone(), vb.clone()]).unwrap(),
                and(&[vb.clone(), va.clone()]).unwrap()
            );
            assert_eq!(
                or(&[va.clone(), vb.clone()]).unwrap(),
                or(&[vb, va]).unwrap()
            );
        }
    }

    #[test]
    fn test_list_natives() {
        let list = int_list(&[1, 2, 3]);

        assert_eq!(car(&[list.clone()]).unwrap(), Value::Int(1));
        assert_eq!(format!("{}", cdr(&[list.clone()]).unwrap()), "(2 3)");
        assert_eq!(is_empty(&[nil()]).unwrap(), Value::Bool(true));
        assert_eq!(is_empty(&[list.clone()]).unwrap(), Value::Bool(false));
        assert_eq!(is_pair(&[nil()]).unwrap(), Value::Bool(true));
        assert_eq!(is_pair(&[list.clone()]).unwrap(), Value::Bool(true));
        assert_eq!(is_pair(&[Value::Int(1)]).unwrap(), Value::Bool(false));

        let consed = cons_pair(&[Value::Int(0), list]).unwrap();
        assert_eq!(format!("{consed}"), "(0 1 2 3)");
        assert!(consed.is_literal_list());

        let built = you_folks(&[Value::Int(4), Value::Bool(true)]).unwrap();
        assert_eq!(format!("{built}"), "(4 #t)");
        assert!(built.is_literal_list());

        run_native_tests(vec![
            (car, vec![nil()], Err("Cannot take the car of an empty list.")),
            (cdr, vec![nil()], Err("Cannot take the cdr of an empty list.")),
            (
                car,
                vec![Value::Int(5)],
                Err("Invalid type. Can only take the car of a list."),
            ),
            (
                cons_pair,
                vec![Value::Int(1), Value::Int(2)],
                Err("Cannot cons to a non-list."),
            ),
            (
                is_empty,
                vec![Value::Int(1)],
                Err("Invalid type. Can only check if a list is empty."),
            ),
        ]);
    }

    #[test]
    fn test_cons_marks_the_whole_chain_literal() {
        // A non-literal tail becomes literal when something is consed on.
        let tail = list_from([Value::Int(2), Value::Int(3)], false);
        let result = cons_pair(&[Value::Int(1), tail]).unwrap();
        let mut current = result;
        while let Value::Pair(p) = current {
            assert!(p.is_literal());
            current = p.tail.clone();
        }
    }

    #[test]
    fn test_registry_has_no_duplicate_names() {
        for (i, op) in NATIVE_OPS.iter().enumerate() {
            for other in &NATIVE_OPS[i + 1..] {
                assert_ne!(op.name, other.name, "duplicate native '{}'", op.name);
            }
        }
    }

    #[test]
    fn test_arity_validation() {
        assert!(Arity::Exact(2).validate(2).is_ok());
        assert!(Arity::Any.validate(17).is_ok());

        let err = Arity::Exact(1).validate(0).unwrap_err();
        assert_eq!(
            format!("{err}"),
            "Invalid arguments. Expecting exactly 1 argument."
        );
        let err = Arity::Exact(2).validate(3).unwrap_err();
        assert_eq!(
            format!("{err}"),
            "Invalid arguments. Expecting exactly 2 arguments."
        );
    }
}
