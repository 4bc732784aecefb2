//! Native functions available to every script.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::error::{type_error, value_error, ErrorKind, EvalError, EvalResult};
use super::value::{Builtin, Value};

/// Largest list `range` will build.
const MAX_RANGE_LEN: i64 = 10_000_000;

/// Every builtin, in the order `dir()`-style listings show them.
pub const BUILTINS: &[Builtin] = &[
    Builtin { name: "len", params: "obj", doc: "Return the number of items in a str, list or map." },
    Builtin { name: "type", params: "obj", doc: "Return the type name of a value." },
    Builtin { name: "str", params: "obj", doc: "Return the display form of a value." },
    Builtin { name: "repr", params: "obj", doc: "Return the source-like representation of a value." },
    Builtin { name: "int", params: "obj", doc: "Convert a number, bool or numeric string to an int." },
    Builtin { name: "float", params: "obj", doc: "Convert a number, bool or numeric string to a float." },
    Builtin { name: "bool", params: "obj", doc: "Return the truthiness of a value." },
    Builtin { name: "range", params: "start, stop, step", doc: "Return a list of ints from start (default 0) up to stop." },
    Builtin { name: "keys", params: "map", doc: "Return the keys of a map, in order." },
    Builtin { name: "values", params: "map", doc: "Return the values of a map, in key order." },
    Builtin { name: "items", params: "map", doc: "Return [key, value] pairs of a map, in key order." },
    Builtin { name: "push", params: "list, item", doc: "Return a copy of list with item appended." },
    Builtin { name: "join", params: "items, sep", doc: "Join the display forms of items with sep (default empty)." },
    Builtin { name: "split", params: "text, sep", doc: "Split text on sep, or on whitespace when sep is omitted." },
    Builtin { name: "upper", params: "text", doc: "Return text in upper case." },
    Builtin { name: "lower", params: "text", doc: "Return text in lower case." },
    Builtin { name: "abs", params: "number", doc: "Return the absolute value of a number." },
    Builtin { name: "min", params: "items", doc: "Return the smallest item of a list, or of the arguments." },
    Builtin { name: "max", params: "items", doc: "Return the largest item of a list, or of the arguments." },
    Builtin { name: "sum", params: "items", doc: "Return the sum of a list of numbers." },
    Builtin { name: "sorted", params: "items", doc: "Return a sorted copy of a list." },
    Builtin { name: "sleep", params: "seconds", doc: "Suspend the run for a number of seconds." },
];

/// Look up a builtin by name.
pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.iter().find(|b| b.name == name).copied()
}

fn arity(builtin: &Builtin, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("exactly {min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(type_error(format!(
            "{}() takes {expected} argument(s) ({} given)",
            builtin.name,
            args.len()
        )));
    }
    Ok(())
}

fn expect_str<'a>(builtin: &Builtin, value: &'a Value) -> EvalResult<&'a str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(type_error(format!(
            "{}() expected str, got '{}'",
            builtin.name,
            other.type_name()
        ))),
    }
}

fn expect_map<'a>(builtin: &Builtin, value: &'a Value) -> EvalResult<&'a BTreeMap<String, Value>> {
    match value {
        Value::Map(m) => Ok(m),
        other => Err(type_error(format!(
            "{}() expected map, got '{}'",
            builtin.name,
            other.type_name()
        ))),
    }
}

fn expect_int(builtin: &Builtin, value: &Value) -> EvalResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(type_error(format!(
            "{}() expected int, got '{}'",
            builtin.name,
            other.type_name()
        ))),
    }
}

/// `min`/`max`/`sum` accept either one list or several arguments.
fn spread(args: Vec<Value>) -> Vec<Value> {
    match <[Value; 1]>::try_from(args) {
        Ok([Value::List(items)]) => items,
        Ok([single]) => vec![single],
        Err(args) => args,
    }
}

/// Call a builtin. Only `sleep` actually suspends.
pub async fn call(
    builtin: Builtin,
    args: Vec<Value>,
    cancel: &CancellationToken,
) -> EvalResult<Value> {
    let b = &builtin;
    match builtin.name {
        "len" => {
            arity(b, &args, 1, 1)?;
            args[0]
                .len()
                .map(|n| Value::Int(n as i64))
                .ok_or_else(|| type_error(format!("object of type '{}' has no len()", args[0].type_name())))
        }
        "type" => {
            arity(b, &args, 1, 1)?;
            Ok(Value::from(args[0].type_name()))
        }
        "str" => {
            arity(b, &args, 1, 1)?;
            Ok(Value::Str(args[0].display()))
        }
        "repr" => {
            arity(b, &args, 1, 1)?;
            Ok(Value::Str(args[0].repr()))
        }
        "int" => {
            arity(b, &args, 1, 1)?;
            match &args[0] {
                Value::Int(n) => Ok(Value::Int(*n)),
                Value::Bool(v) => Ok(Value::Int(i64::from(*v))),
                Value::Float(n) if n.is_finite() => Ok(Value::Int(n.trunc() as i64)),
                Value::Float(n) => Err(value_error(format!("cannot convert float {n} to integer"))),
                Value::Str(s) => s.trim().parse().map(Value::Int).map_err(|_| {
                    value_error(format!("invalid literal for int() with base 10: {s:?}"))
                }),
                other => Err(type_error(format!(
                    "int() argument must be a str or a number, not '{}'",
                    other.type_name()
                ))),
            }
        }
        "float" => {
            arity(b, &args, 1, 1)?;
            match &args[0] {
                Value::Int(n) => Ok(Value::Float(*n as f64)),
                Value::Bool(v) => Ok(Value::Float(if *v { 1.0 } else { 0.0 })),
                Value::Float(n) => Ok(Value::Float(*n)),
                Value::Str(s) => s.trim().parse().map(Value::Float).map_err(|_| {
                    value_error(format!("could not convert string to float: {s:?}"))
                }),
                other => Err(type_error(format!(
                    "float() argument must be a str or a number, not '{}'",
                    other.type_name()
                ))),
            }
        }
        "bool" => {
            arity(b, &args, 1, 1)?;
            Ok(Value::Bool(args[0].truthy()))
        }
        "range" => {
            arity(b, &args, 1, 3)?;
            let ints = args
                .iter()
                .map(|a| expect_int(b, a))
                .collect::<EvalResult<Vec<i64>>>()?;
            let (start, stop, step) = match ints.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => return Err(type_error("range() expected 1 to 3 arguments")),
            };
            if step == 0 {
                return Err(value_error("range() arg 3 must not be zero"));
            }
            let span = if step > 0 { stop.saturating_sub(start) } else { start.saturating_sub(stop) };
            if span / step.saturating_abs() > MAX_RANGE_LEN {
                return Err(value_error(format!("range() would produce more than {MAX_RANGE_LEN} items")));
            }
            let mut out = Vec::new();
            let mut i = start;
            while (step > 0 && i < stop) || (step < 0 && i > stop) {
                out.push(Value::Int(i));
                i = match i.checked_add(step) {
                    Some(next) => next,
                    None => break,
                };
            }
            Ok(Value::List(out))
        }
        "keys" => {
            arity(b, &args, 1, 1)?;
            let map = expect_map(b, &args[0])?;
            Ok(Value::List(map.keys().cloned().map(Value::Str).collect()))
        }
        "values" => {
            arity(b, &args, 1, 1)?;
            let map = expect_map(b, &args[0])?;
            Ok(Value::List(map.values().cloned().collect()))
        }
        "items" => {
            arity(b, &args, 1, 1)?;
            let map = expect_map(b, &args[0])?;
            Ok(Value::List(
                map.iter()
                    .map(|(k, v)| Value::List(vec![Value::Str(k.clone()), v.clone()]))
                    .collect(),
            ))
        }
        "push" => {
            arity(b, &args, 2, 2)?;
            let mut args = args.into_iter();
            match (args.next(), args.next()) {
                (Some(Value::List(mut items)), Some(item)) => {
                    items.push(item);
                    Ok(Value::List(items))
                }
                (Some(other), _) => Err(type_error(format!(
                    "push() expected list, got '{}'",
                    other.type_name()
                ))),
                _ => Err(type_error("push() takes exactly 2 arguments")),
            }
        }
        "join" => {
            arity(b, &args, 1, 2)?;
            let sep = match args.get(1) {
                Some(sep) => expect_str(b, sep)?,
                None => "",
            };
            match &args[0] {
                Value::List(items) => Ok(Value::Str(
                    items.iter().map(Value::display).collect::<Vec<_>>().join(sep),
                )),
                other => Err(type_error(format!(
                    "join() expected list, got '{}'",
                    other.type_name()
                ))),
            }
        }
        "split" => {
            arity(b, &args, 1, 2)?;
            let text = expect_str(b, &args[0])?;
            let parts: Vec<Value> = match args.get(1) {
                Some(sep) => {
                    let sep = expect_str(b, sep)?;
                    if sep.is_empty() {
                        return Err(value_error("empty separator"));
                    }
                    text.split(sep).map(Value::from).collect()
                }
                None => text.split_whitespace().map(Value::from).collect(),
            };
            Ok(Value::List(parts))
        }
        "upper" => {
            arity(b, &args, 1, 1)?;
            Ok(Value::Str(expect_str(b, &args[0])?.to_uppercase()))
        }
        "lower" => {
            arity(b, &args, 1, 1)?;
            Ok(Value::Str(expect_str(b, &args[0])?.to_lowercase()))
        }
        "abs" => {
            arity(b, &args, 1, 1)?;
            match &args[0] {
                Value::Int(n) => n
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| value_error("integer overflow")),
                Value::Float(n) => Ok(Value::Float(n.abs())),
                other => Err(type_error(format!(
                    "bad operand type for abs(): '{}'",
                    other.type_name()
                ))),
            }
        }
        "min" | "max" => {
            if args.is_empty() {
                return Err(type_error(format!("{}() expected at least 1 argument", b.name)));
            }
            let want = if b.name == "min" {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            };
            let mut items = spread(args).into_iter();
            let mut best = items
                .next()
                .ok_or_else(|| value_error(format!("{}() arg is an empty sequence", b.name)))?;
            for item in items {
                if item.compare(&best, "<")? == want {
                    best = item;
                }
            }
            Ok(best)
        }
        "sum" => {
            let mut total = Value::Int(0);
            for item in spread(args) {
                total = match (total, item) {
                    (Value::Int(a), Value::Int(b)) => Value::Int(
                        a.checked_add(b).ok_or_else(|| value_error("integer overflow"))?,
                    ),
                    (Value::Int(a), Value::Float(b)) => Value::Float(a as f64 + b),
                    (Value::Float(a), Value::Int(b)) => Value::Float(a + b as f64),
                    (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
                    (_, other) => {
                        return Err(type_error(format!(
                            "unsupported operand type(s) for sum: '{}'",
                            other.type_name()
                        )))
                    }
                };
            }
            Ok(total)
        }
        "sorted" => {
            arity(b, &args, 1, 1)?;
            let mut items = match &args[0] {
                Value::List(items) => items.clone(),
                Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
                Value::Map(m) => m.keys().cloned().map(Value::Str).collect(),
                other => {
                    return Err(type_error(format!(
                        "'{}' object is not iterable",
                        other.type_name()
                    )))
                }
            };
            // Surface the first incomparable pair instead of sorting garbage.
            for pair in items.windows(2) {
                pair[0].compare(&pair[1], "<")?;
            }
            items.sort_by(|a, b| a.compare(b, "<").unwrap_or(std::cmp::Ordering::Equal));
            Ok(Value::List(items))
        }
        "sleep" => {
            arity(b, &args, 1, 1)?;
            let seconds = match &args[0] {
                Value::Int(n) => *n as f64,
                Value::Float(n) => *n,
                other => {
                    return Err(type_error(format!(
                        "sleep() expected a number, got '{}'",
                        other.type_name()
                    )))
                }
            };
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(value_error("sleep length must be a non-negative number"));
            }
            let length = Duration::try_from_secs_f64(seconds)
                .map_err(|_| value_error("sleep length too large"))?;
            tokio::select! {
                _ = cancel.cancelled() => Err(EvalError::cancelled()),
                _ = tokio::time::sleep(length) => Ok(Value::None),
            }
        }
        other => Err(EvalError::new(ErrorKind::Name, format!("name '{other}' is not defined"))),
    }
}
