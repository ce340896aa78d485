//! Small nom grammars used by the simple-statement path.
//!
//! These cover the fragments a regex capture hands over: a VALUES list,
//! a column list, a select field list and a single WHERE condition.
//!
//! ```text
//! VALUES ('a, b', 2, NULL)      -> ["a, b", 2, null]
//! WHERE  age >= 21              -> age gte 21
//! SELECT id, full_name AS name  -> [id, name:full_name]
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{char, digit1, space0, space1},
    combinator::{all_consuming, eof, map, map_opt, map_res, opt, recognize, verify},
    error::{Error, ErrorKind},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::ast::{Comparison, Operator, SelectColumn};
use crate::error::{SqlRestError, SqlRestResult};
use crate::value::{parse_literal_token, parse_number, Value};

/// Split a VALUES list into typed values.
///
/// Quoted segments are taken verbatim (commas inside them never split);
/// unquoted tokens go through [`parse_literal_token`].
pub fn parse_insert_values(input: &str) -> SqlRestResult<Vec<Value>> {
    match all_consuming(value_list)(input.trim()) {
        Ok((_, values)) => Ok(values),
        Err(e) => Err(SqlRestError::simple(format!(
            "Malformed VALUES list '{}': {:?}",
            input, e
        ))),
    }
}

/// Parse `a, b, c` into column names.
pub fn parse_column_list(input: &str) -> Option<Vec<String>> {
    all_consuming(separated_list1(comma, delimited(space0, identifier, space0)))(input.trim())
        .ok()
        .map(|(_, cols)| cols.into_iter().map(str::to_string).collect())
}

/// Parse a select field list: `*` or `col [[AS] alias], ...`.
pub fn parse_select_fields(input: &str) -> Option<Vec<SelectColumn>> {
    let input = input.trim();
    if input == "*" {
        return Some(vec![SelectColumn::Star]);
    }
    all_consuming(separated_list1(comma, delimited(space0, select_field, space0)))(input)
        .ok()
        .map(|(_, fields)| fields)
}

/// Parse exactly one WHERE condition.
///
/// Patterns are tried in order, first match wins:
/// 1. `col = 'quoted'` (or double quotes)
/// 2. `col = 123`
/// 3. `col = bareword`
/// 4. `col <op> 'quoted'` with op one of `!=`, `<>`, `>`, `>=`, `<`, `<=`
/// 5. `col <op> 123` or `col <op> bareword`
///
/// Returns `None` when the text is anything else, including `AND`/`OR`
/// combinations.
pub fn parse_single_condition(input: &str) -> Option<Comparison> {
    all_consuming(condition)(input.trim())
        .ok()
        .map(|(_, cond)| cond)
}

fn condition(input: &str) -> IResult<&str, Comparison> {
    let (input, column) = identifier(input)?;
    let (input, _) = space0(input)?;
    let (input, (op, value)) = alt((
        map(preceded(equals, to_end(quoted_string)), |s| {
            (Operator::Eq, Value::String(s))
        }),
        map(preceded(equals, to_end(number)), |v| (Operator::Eq, v)),
        map(preceded(equals, to_end(bareword)), |w| {
            (Operator::Eq, Value::String(w.to_string()))
        }),
        map(pair(comparison_op, to_end(quoted_string)), |(op, s)| {
            (op, Value::String(s))
        }),
        pair(
            comparison_op,
            to_end(alt((number, map(bareword, |w| Value::String(w.to_string()))))),
        ),
    ))(input)?;

    Ok((
        input,
        Comparison {
            column: column.to_string(),
            op,
            value,
        },
    ))
}

fn equals(input: &str) -> IResult<&str, ()> {
    map(pair(char('='), space0), |_| ())(input)
}

/// Parse a non-equality comparison operator.
fn comparison_op(input: &str) -> IResult<&str, Operator> {
    terminated(
        map_opt(
            alt((
                tag("!="),
                tag("<>"),
                tag(">="),
                tag("<="),
                tag(">"),
                tag("<"),
            )),
            Operator::from_symbol,
        ),
        space0,
    )(input)
}

/// Require `parser` to consume the rest of the input.
fn to_end<'a, O>(
    parser: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    terminated(parser, pair(space0, eof))
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(space0, char(','), space0)(input)
}

/// Parse an identifier (table name, column name).
fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// Identifier-shaped unquoted word used as a string value.
fn bareword(input: &str) -> IResult<&str, &str> {
    identifier(input)
}

/// Words that change a SELECT's meaning and are never column names here.
const SELECT_KEYWORDS: &[&str] = &[
    "ALL",
    "AS",
    "DISTINCT",
    "DISTINCTROW",
    "FROM",
    "HIGH_PRIORITY",
    "SQL_BIG_RESULT",
    "SQL_BUFFER_RESULT",
    "SQL_CACHE",
    "SQL_CALC_FOUND_ROWS",
    "SQL_NO_CACHE",
    "SQL_SMALL_RESULT",
    "STRAIGHT_JOIN",
];

fn is_select_keyword(word: &str) -> bool {
    SELECT_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn field_name(input: &str) -> IResult<&str, &str> {
    verify(identifier, |word: &str| !is_select_keyword(word))(input)
}

fn select_field(input: &str) -> IResult<&str, SelectColumn> {
    let (input, name) = field_name(input)?;
    let (input, alias) = opt(preceded(
        tuple((space1, opt(pair(tag_no_case("AS"), space1)))),
        field_name,
    ))(input)?;

    Ok((
        input,
        SelectColumn::Named {
            name: name.to_string(),
            alias: alias.map(str::to_string),
        },
    ))
}

fn value_list(input: &str) -> IResult<&str, Vec<Value>> {
    separated_list1(comma, delimited(space0, list_item, space0))(input)
}

fn list_item(input: &str) -> IResult<&str, Value> {
    alt((map(quoted_string, Value::String), bare_token))(input)
}

/// Unquoted VALUES token, coerced by shape.
fn bare_token(input: &str) -> IResult<&str, Value> {
    map(
        take_while1(|c: char| !matches!(c, ',' | '\'' | '"' | '(' | ')')),
        parse_literal_token,
    )(input)
}

/// Parse a number (integer or float).
fn number(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
        ))),
        parse_number,
    )(input)
}

/// Single- or double-quoted string; a doubled quote stands for one quote char.
fn quoted_string(input: &str) -> IResult<&str, String> {
    let quote = match input.chars().next() {
        Some(c @ ('\'' | '"')) => c,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };

    let mut out = String::new();
    let mut rest = &input[1..];
    loop {
        let Some(c) = rest.chars().next() else {
            return Err(nom::Err::Error(Error::new(rest, ErrorKind::Char)));
        };
        rest = &rest[c.len_utf8()..];
        if c != quote {
            out.push(c);
        } else if rest.starts_with(quote) {
            out.push(quote);
            rest = &rest[1..];
        } else {
            return Ok((rest, out));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_respect_quotes() {
        let values = parse_insert_values("'a, b', 2").unwrap();
        assert_eq!(values, vec![Value::String("a, b".into()), Value::Int(2)]);
    }

    #[test]
    fn test_values_coerce_bare_tokens() {
        let values = parse_insert_values("1, 2.5, true, NULL, active, \"x\"").unwrap();
        assert_eq!(
            values,
            vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::Bool(true),
                Value::Null,
                Value::String("active".into()),
                Value::String("x".into()),
            ]
        );
    }

    #[test]
    fn test_values_doubled_quote() {
        let values = parse_insert_values("'it''s', 'ok'").unwrap();
        assert_eq!(
            values,
            vec![Value::String("it's".into()), Value::String("ok".into())]
        );
    }

    #[test]
    fn test_values_reject_multiple_tuples() {
        assert!(parse_insert_values("1, 'a'), (2, 'b'").is_err());
        assert!(parse_insert_values("'unterminated").is_err());
    }

    #[test]
    fn test_column_list() {
        assert_eq!(
            parse_column_list(" id ,name,  email "),
            Some(vec!["id".to_string(), "name".to_string(), "email".to_string()])
        );
        assert_eq!(parse_column_list("id, count(*)"), None);
    }

    #[test]
    fn test_select_fields() {
        assert_eq!(parse_select_fields("*"), Some(vec![SelectColumn::Star]));
        assert_eq!(
            parse_select_fields("id, full_name AS name, email mail"),
            Some(vec![
                SelectColumn::named("id"),
                SelectColumn::aliased("full_name", "name"),
                SelectColumn::aliased("email", "mail"),
            ])
        );
        assert_eq!(parse_select_fields("count(*), id"), None);
    }

    #[test]
    fn test_select_fields_reject_modifiers() {
        assert_eq!(parse_select_fields("DISTINCT name"), None);
        assert_eq!(parse_select_fields("distinct name, age"), None);
        assert_eq!(parse_select_fields("ALL id"), None);
        assert_eq!(parse_select_fields("SQL_NO_CACHE id, name"), None);
        assert_eq!(
            parse_select_fields("distinct_count, all_time"),
            Some(vec![
                SelectColumn::named("distinct_count"),
                SelectColumn::named("all_time"),
            ])
        );
    }

    #[test]
    fn test_condition_priority() {
        assert_eq!(
            parse_single_condition("name = 'bob'"),
            Some(Comparison::new("name", Operator::Eq, "bob"))
        );
        assert_eq!(
            parse_single_condition("id = 42"),
            Some(Comparison::new("id", Operator::Eq, 42))
        );
        assert_eq!(
            parse_single_condition("status=active"),
            Some(Comparison::new("status", Operator::Eq, "active"))
        );
        assert_eq!(
            parse_single_condition("name <> \"bob\""),
            Some(Comparison::new("name", Operator::Neq, "bob"))
        );
        assert_eq!(
            parse_single_condition("age >= 21"),
            Some(Comparison::new("age", Operator::Gte, 21))
        );
        assert_eq!(
            parse_single_condition("tier < gold"),
            Some(Comparison::new("tier", Operator::Lt, "gold"))
        );
    }

    #[test]
    fn test_condition_digits_then_letters_is_a_word() {
        assert_eq!(
            parse_single_condition("code = 123abc"),
            Some(Comparison::new("code", Operator::Eq, "123abc"))
        );
    }

    #[test]
    fn test_condition_rejects_compound_clauses() {
        assert_eq!(parse_single_condition("a = 1 AND b = 2"), None);
        assert_eq!(parse_single_condition("a = 'x' OR b = 'y'"), None);
        assert_eq!(parse_single_condition("name LIKE 'a%'"), None);
        assert_eq!(parse_single_condition("name = 'unterminated"), None);
    }
}
