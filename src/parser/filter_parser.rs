use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, AppResult};
use crate::utils::fold_case;
pub use crate::parser::filter_operator::FilterOperator;

lazy_static! {
    static ref ATTRIBUTE_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").unwrap();
}

/// A single `<attr> <op> "<value>"` or `<attr> pr` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub attribute: String,
    pub operator: FilterOperator,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
}

/// Splits on whitespace outside double quotes. Inside quotes `\"` and `\\`
/// are unescaped.
fn tokenize(input: &str) -> AppResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch == '"' {
            chars.next();
            let mut value = String::new();
            let mut terminated = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some(escaped) => value.push(escaped),
                        None => break,
                    },
                    '"' => {
                        terminated = true;
                        break;
                    }
                    _ => value.push(c),
                }
            }
            if !terminated {
                return Err(AppError::invalid_filter("Unterminated quoted string in filter"));
            }
            tokens.push(Token::Quoted(value));
            continue;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            word.push(c);
            chars.next();
        }
        tokens.push(Token::Word(word));
    }

    Ok(tokens)
}

/// Parses a single-clause SCIM filter.
pub fn parse_filter(filter_str: &str) -> AppResult<Filter> {
    let tokens = tokenize(filter_str)?;
    let mut tokens = tokens.into_iter();

    let attribute = match tokens.next() {
        Some(Token::Word(attr)) => attr,
        Some(Token::Quoted(_)) | None => {
            return Err(AppError::invalid_filter(format!(
                "Invalid filter: {}",
                filter_str
            )))
        }
    };
    if !ATTRIBUTE_NAME.is_match(&attribute) {
        return Err(AppError::invalid_filter(format!(
            "Invalid attribute name in filter: {}",
            attribute
        )));
    }

    let operator: FilterOperator = match tokens.next() {
        Some(Token::Word(op)) => op.parse()?,
        _ => {
            return Err(AppError::invalid_filter(format!(
                "Missing filter operator: {}",
                filter_str
            )))
        }
    };

    let value = match tokens.next() {
        Some(Token::Quoted(value)) => Some(value),
        Some(Token::Word(value)) => {
            return Err(AppError::invalid_filter(format!(
                "Filter value must be a quoted string: {}",
                value
            )))
        }
        None => None,
    };
    if tokens.next().is_some() {
        return Err(AppError::invalid_filter(format!(
            "Only single-clause filters are supported: {}",
            filter_str
        )));
    }

    match (operator.takes_value(), &value) {
        (true, None) => Err(AppError::invalid_filter(format!(
            "Missing value for operator {}",
            operator
        ))),
        (false, Some(_)) => Err(AppError::invalid_filter(
            "Operator pr does not take a value",
        )),
        _ => Ok(Filter {
            attribute,
            operator,
            value,
        }),
    }
}

impl Filter {
    /// Case-insensitive evaluation against an attribute value.
    pub fn matches(&self, value: &str) -> bool {
        let expected = fold_case(self.value.as_deref().unwrap_or(""));
        self.compare(&fold_case(value), &expected)
    }

    /// Case-sensitive evaluation against an attribute value.
    pub fn matches_case_exact(&self, value: &str) -> bool {
        self.compare(value, self.value.as_deref().unwrap_or(""))
    }

    // Ordering operators compare lexically.
    fn compare(&self, actual: &str, expected: &str) -> bool {
        match self.operator {
            FilterOperator::Equal => actual == expected,
            FilterOperator::NotEqual => actual != expected,
            FilterOperator::Contains => actual.contains(expected),
            FilterOperator::StartsWith => actual.starts_with(expected),
            FilterOperator::EndsWith => actual.ends_with(expected),
            FilterOperator::Present => !actual.is_empty(),
            FilterOperator::GreaterThan => actual > expected,
            FilterOperator::GreaterThanOrEqual => actual >= expected,
            FilterOperator::LessThan => actual < expected,
            FilterOperator::LessThanOrEqual => actual <= expected,
        }
    }

    /// Rejects filters outside an endpoint's allow-list.
    pub fn validate_for_attribute(
        &self,
        allowed: &str,
        operators: &[FilterOperator],
    ) -> AppResult<()> {
        if !self.attribute.eq_ignore_ascii_case(allowed) || !operators.contains(&self.operator) {
            let supported = operators
                .iter()
                .map(|op| format!("{} {}", allowed, op))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(AppError::invalid_filter(format!(
                "Unsupported filter: {} {} (supported: {})",
                self.attribute, self.operator, supported
            )));
        }
        Ok(())
    }
}

/// Evaluation over an optional filter; no filter matches everything.
pub trait FilterMatch {
    fn matches(&self, value: &str) -> bool;
    fn matches_case_exact(&self, value: &str) -> bool;
}

impl FilterMatch for Option<Filter> {
    fn matches(&self, value: &str) -> bool {
        self.as_ref().map_or(true, |filter| filter.matches(value))
    }

    fn matches_case_exact(&self, value: &str) -> bool {
        self.as_ref()
            .map_or(true, |filter| filter.matches_case_exact(value))
    }
}
