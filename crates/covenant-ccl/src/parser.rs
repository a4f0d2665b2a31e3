// parser.rs - Constraint source parser.
//
// CCL is line oriented: each non-blank, non-comment line is exactly one
// statement. Every line is tokenized on its own so syntax errors can
// report an exact line and column.
//
//   permit <action> [on <resource>] [when <condition>] [severity <level>]
//   deny   <action> [on <resource>] [when <condition>] [severity <level>]
//   limit  <action> <count> per <n> [seconds|minutes|hours|days]
//
// Conditions use `or`, `and`, `not` and parentheses over comparisons of
// the form `<field> <op> <value>`.

use crate::document::{
    CompareOp, Comparison, Condition, Effect, LimitStatement, Literal, PolicyDocument, Severity,
    Statement,
};
use crate::error::CclError;

/// Parse constraint source into a [`PolicyDocument`].
pub fn parse(source: &str) -> Result<PolicyDocument, CclError> {
    let mut permits = Vec::new();
    let mut denies = Vec::new();
    let mut limits = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let tokens = tokenize(raw, line)?;
        if tokens.is_empty() {
            continue;
        }
        let mut parser = LineParser {
            tokens,
            pos: 0,
            line,
            width: raw.chars().count(),
        };
        match parser.statement()? {
            Parsed::Rule(statement) if statement.effect == Effect::Permit => {
                permits.push(statement)
            }
            Parsed::Rule(statement) => denies.push(statement),
            Parsed::Limit(limit) => limits.push(limit),
        }
    }

    let document = PolicyDocument::new(permits, denies, limits);
    if document.is_empty() {
        return Err(CclError::Empty);
    }
    tracing::debug!(
        permits = document.permits().len(),
        denies = document.denies().len(),
        limits = document.limits().len(),
        "parsed constraint source"
    );
    Ok(document)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str(String),
    Symbol(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    column: usize,
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '[' | ']' | ',' | '\'' | '"' | '=' | '!' | '<' | '>')
}

fn syntax(line: usize, column: usize, message: impl Into<String>) -> CclError {
    CclError::Syntax {
        line,
        column,
        message: message.into(),
    }
}

fn tokenize(raw: &str, line: usize) -> Result<Vec<Spanned>, CclError> {
    let chars: Vec<char> = raw.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let column = i + 1;

        if c.is_whitespace() {
            i += 1;
            continue;
        }
        // Comments run to end of line.
        if c == '#' || (c == '/' && chars.get(i + 1) == Some(&'/')) {
            break;
        }

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(syntax(line, column, "unterminated string")),
                        Some('\\') => {
                            if let Some(escaped) = chars.get(i + 1) {
                                value.push(*escaped);
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => break,
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                Token::Str(value)
            }
            '=' | '!' | '<' | '>' => {
                let mut symbol = c.to_string();
                if chars.get(i + 1) == Some(&'=') {
                    symbol.push('=');
                    i += 1;
                }
                if symbol == "!" {
                    return Err(syntax(line, column, "expected '!='"));
                }
                Token::Symbol(symbol)
            }
            _ => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Spanned {
                    token: Token::Word(chars[start..i].iter().collect()),
                    column,
                });
                continue;
            }
        };
        tokens.push(Spanned { token, column });
        i += 1;
    }

    Ok(tokens)
}

enum Parsed {
    Rule(Statement),
    Limit(LimitStatement),
}

struct LineParser {
    tokens: Vec<Spanned>,
    pos: usize,
    line: usize,
    width: usize,
}

impl LineParser {
    fn statement(&mut self) -> Result<Parsed, CclError> {
        let keyword = self.expect_word("'permit', 'deny' or 'limit'")?;
        let parsed = match keyword.as_str() {
            "permit" => Parsed::Rule(self.rule(Effect::Permit)?),
            "deny" => Parsed::Rule(self.rule(Effect::Deny)?),
            "limit" => Parsed::Limit(self.limit()?),
            other => {
                return Err(self.error_at(
                    self.pos - 1,
                    format!("expected 'permit', 'deny' or 'limit', found '{}'", other),
                ))
            }
        };
        if self.pos < self.tokens.len() {
            return Err(self.error_here("unexpected trailing input"));
        }
        Ok(parsed)
    }

    fn rule(&mut self, effect: Effect) -> Result<Statement, CclError> {
        let action = self.expect_pattern("action pattern")?;
        let mut resource = "**".to_string();
        let mut condition = None;
        let mut severity = None;

        if self.peek_word("on") {
            self.pos += 1;
            resource = self.expect_pattern("resource pattern")?;
        }

        while self.pos < self.tokens.len() {
            if self.peek_word("when") && condition.is_none() {
                self.pos += 1;
                condition = Some(self.or_expr()?);
            } else if self.peek_word("severity") && severity.is_none() {
                self.pos += 1;
                let word = self.expect_word("severity level")?;
                severity = Some(Severity::from_keyword(&word).ok_or_else(|| {
                    self.error_at(
                        self.pos - 1,
                        format!(
                            "unknown severity '{}', expected critical, high, medium or low",
                            word
                        ),
                    )
                })?);
            } else {
                return Err(self.error_here("expected 'when' or 'severity'"));
            }
        }

        Ok(Statement {
            effect,
            action,
            resource,
            condition,
            severity,
            line: self.line,
        })
    }

    fn limit(&mut self) -> Result<LimitStatement, CclError> {
        let action = self.expect_pattern("action pattern")?;
        let count = self.expect_integer("call count")?;
        if !self.peek_word("per") {
            return Err(self.error_here("expected 'per'"));
        }
        self.pos += 1;
        let amount = self.expect_integer("period length")?;
        let amount_pos = self.pos - 1;
        if amount == 0 {
            return Err(self.error_at(amount_pos, "period length must be positive"));
        }

        let multiplier = match self.tokens.get(self.pos).map(|t| &t.token) {
            Some(Token::Word(unit)) => {
                let multiplier = match unit.as_str() {
                    "second" | "seconds" => 1,
                    "minute" | "minutes" => 60,
                    "hour" | "hours" => 3_600,
                    "day" | "days" => 86_400,
                    other => {
                        return Err(self.error_here(format!("unknown time unit '{}'", other)))
                    }
                };
                self.pos += 1;
                multiplier
            }
            _ => 1,
        };

        // Reject rather than wrap: a wrapped period would silently shorten the window.
        let period_seconds = amount
            .checked_mul(multiplier)
            .ok_or_else(|| self.error_at(amount_pos, "period length is too large"))?;

        Ok(LimitStatement {
            action,
            count,
            period_seconds,
            line: self.line,
        })
    }

    fn or_expr(&mut self) -> Result<Condition, CclError> {
        let mut left = self.and_expr()?;
        while self.peek_word("or") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Condition, CclError> {
        let mut left = self.unary()?;
        while self.peek_word("and") {
            self.pos += 1;
            let right = self.unary()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Condition, CclError> {
        if self.peek_word("not") {
            self.pos += 1;
            return Ok(Condition::Not(Box::new(self.unary()?)));
        }
        if self.peek(&Token::LParen) {
            self.pos += 1;
            let inner = self.or_expr()?;
            if !self.peek(&Token::RParen) {
                return Err(self.error_here("expected ')'"));
            }
            self.pos += 1;
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Condition, CclError> {
        let field = self.expect_word("field name")?;
        let op = match self.tokens.get(self.pos).map(|t| &t.token) {
            Some(Token::Symbol(s)) | Some(Token::Word(s)) => CompareOp::from_token(s),
            _ => None,
        }
        .ok_or_else(|| self.error_here("expected comparison operator"))?;
        self.pos += 1;
        let value = self.literal()?;
        Ok(Condition::Compare(Comparison { field, op, value }))
    }

    fn literal(&mut self) -> Result<Literal, CclError> {
        let Some(spanned) = self.tokens.get(self.pos).cloned() else {
            return Err(self.error_here("expected a value"));
        };
        self.pos += 1;
        match spanned.token {
            Token::Str(s) => Ok(Literal::String(s)),
            Token::Word(w) => Ok(match w.as_str() {
                "true" => Literal::Bool(true),
                "false" => Literal::Bool(false),
                "null" => Literal::Null,
                _ if looks_numeric(&w) => match w.parse::<f64>() {
                    Ok(n) => Literal::Number(n),
                    Err(_) => Literal::String(w),
                },
                _ => Literal::String(w),
            }),
            Token::LBracket => {
                let mut items = Vec::new();
                if self.peek(&Token::RBracket) {
                    self.pos += 1;
                    return Ok(Literal::List(items));
                }
                loop {
                    items.push(self.literal()?);
                    if self.peek(&Token::Comma) {
                        self.pos += 1;
                    } else if self.peek(&Token::RBracket) {
                        self.pos += 1;
                        return Ok(Literal::List(items));
                    } else {
                        return Err(self.error_here("expected ',' or ']'"));
                    }
                }
            }
            _ => Err(self.error_at(self.pos - 1, "expected a value")),
        }
    }

    fn expect_word(&mut self, what: &str) -> Result<String, CclError> {
        match self.tokens.get(self.pos).map(|t| &t.token) {
            Some(Token::Word(w)) => {
                let w = w.clone();
                self.pos += 1;
                Ok(w)
            }
            _ => Err(self.error_here(format!("expected {}", what))),
        }
    }

    /// A pattern may be bare or quoted.
    fn expect_pattern(&mut self, what: &str) -> Result<String, CclError> {
        match self.tokens.get(self.pos).map(|t| &t.token) {
            Some(Token::Word(w)) | Some(Token::Str(w)) => {
                let w = w.clone();
                self.pos += 1;
                Ok(w)
            }
            _ => Err(self.error_here(format!("expected {}", what))),
        }
    }

    fn expect_integer(&mut self, what: &str) -> Result<u64, CclError> {
        let word = self.expect_word(what)?;
        word.parse::<u64>().map_err(|_| {
            self.error_at(
                self.pos - 1,
                format!("expected {} as a whole number, found '{}'", what, word),
            )
        })
    }

    fn peek(&self, token: &Token) -> bool {
        self.tokens.get(self.pos).map(|t| &t.token) == Some(token)
    }

    fn peek_word(&self, word: &str) -> bool {
        matches!(self.tokens.get(self.pos).map(|t| &t.token), Some(Token::Word(w)) if w == word)
    }

    fn error_here(&self, message: impl Into<String>) -> CclError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, pos: usize, message: impl Into<String>) -> CclError {
        let column = self
            .tokens
            .get(pos)
            .map(|t| t.column)
            .unwrap_or(self.width + 1);
        syntax(self.line, column, message)
    }
}

fn looks_numeric(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    digits.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_permit_deny_and_limit() {
        let doc = parse(
            "permit file.read on '/data/**'\n\
             deny file.write on '/system/**' severity critical\n\
             limit api.call 5 per 60 seconds\n",
        )
        .unwrap();

        assert_eq!(doc.permits().len(), 1);
        assert_eq!(doc.denies().len(), 1);
        assert_eq!(doc.limits().len(), 1);

        let deny = &doc.denies()[0];
        assert_eq!(deny.action, "file.write");
        assert_eq!(deny.resource, "/system/**");
        assert_eq!(deny.severity, Some(Severity::Critical));
        assert_eq!(deny.line, 2);

        let limit = &doc.limits()[0];
        assert_eq!(limit.count, 5);
        assert_eq!(limit.period_seconds, 60);
    }

    #[test]
    fn resource_defaults_to_everything() {
        let doc = parse("permit api.call").unwrap();
        assert_eq!(doc.permits()[0].resource, "**");
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let doc = parse("# header\n\n  // another\npermit a.b on /x # trailing\n").unwrap();
        assert_eq!(doc.permits().len(), 1);
        assert_eq!(doc.permits()[0].resource, "/x");
        assert_eq!(doc.permits()[0].line, 4);
    }

    #[test]
    fn limit_units_scale_period() {
        let doc = parse("limit a 10 per 2 hours\nlimit b 1 per 1 day\nlimit c 3 per 30").unwrap();
        assert_eq!(doc.limits()[0].period_seconds, 7_200);
        assert_eq!(doc.limits()[1].period_seconds, 86_400);
        assert_eq!(doc.limits()[2].period_seconds, 30);
    }

    #[test]
    fn condition_precedence_and_binds_tighter() {
        let doc = parse("permit pay.send when a = 1 or b = 2 and c = 3").unwrap();
        match doc.permits()[0].condition.as_ref().unwrap() {
            Condition::Or(_, right) => assert!(matches!(right.as_ref(), Condition::And(..))),
            other => panic!("expected Or at the root, got {:?}", other),
        }
    }

    #[test]
    fn condition_literals() {
        let doc = parse(
            "deny pay.send when region in ['eu', \"us\"] and amount >= -2.5 and flagged = true",
        )
        .unwrap();
        let text = doc.denies()[0].condition.as_ref().unwrap().to_string();
        assert_eq!(
            text,
            "region in ['eu', 'us'] and amount >= -2.5 and flagged = true"
        );
    }

    #[test]
    fn condition_display_reparses() {
        let source = "permit x.y when not (a = 'q' or b != 2) and c contains 'z' severity low";
        let first = parse(source).unwrap();
        let rendered = format!("{}", first.permits()[0]);
        let second = parse(&rendered).unwrap();
        assert_eq!(first.permits()[0].condition, second.permits()[0].condition);
        assert_eq!(second.permits()[0].severity, Some(Severity::Low));
    }

    #[test]
    fn severity_may_precede_when() {
        let doc = parse("deny a.b severity high when user = guest").unwrap();
        let deny = &doc.denies()[0];
        assert_eq!(deny.severity, Some(Severity::High));
        assert!(deny.condition.is_some());
    }

    #[test]
    fn bare_words_are_string_literals() {
        let doc = parse("permit a.b when role = admin").unwrap();
        match doc.permits()[0].condition.as_ref().unwrap() {
            Condition::Compare(c) => assert_eq!(c.value, Literal::String("admin".into())),
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn unknown_keyword_reports_position() {
        let err = parse("permit a.b\nallow file.read").unwrap_err();
        assert_eq!(
            err,
            CclError::Syntax {
                line: 2,
                column: 1,
                message: "expected 'permit', 'deny' or 'limit', found 'allow'".to_string(),
            }
        );
    }

    #[test]
    fn unknown_severity_is_rejected() {
        let err = parse("deny a.b severity urgent").unwrap_err();
        assert!(matches!(err, CclError::Syntax { line: 1, column: 19, .. }));
    }

    #[test]
    fn unterminated_string_is_rejected() {
        let err = parse("permit a.b on '/data").unwrap_err();
        assert!(matches!(err, CclError::Syntax { column: 15, .. }));
    }

    #[test]
    fn limit_requires_numbers() {
        assert!(parse("limit a many per 60 seconds").is_err());
        assert!(parse("limit a 5 every 60 seconds").is_err());
        assert!(parse("limit a 5 per 0 seconds").is_err());
        assert!(parse("limit a 5 per 10 fortnights").is_err());
    }

    #[test]
    fn oversized_period_is_a_syntax_error() {
        // 300000000000000 days overflows u64 seconds.
        let err = parse("limit a.b 1 per 300000000000000 days").unwrap_err();
        assert_eq!(
            err,
            CclError::Syntax {
                line: 1,
                column: 17,
                message: "period length is too large".to_string(),
            }
        );

        // The same amount in seconds is fine.
        let doc = parse("limit a.b 1 per 300000000000000 seconds").unwrap();
        assert_eq!(doc.limits()[0].period_seconds, 300_000_000_000_000);
    }

    #[test]
    fn trailing_input_is_rejected() {
        let err = parse("permit a.b on /x extra").unwrap_err();
        assert!(matches!(err, CclError::Syntax { column: 18, .. }));
    }

    #[test]
    fn empty_source_is_rejected() {
        assert_eq!(parse("# only a comment\n").unwrap_err(), CclError::Empty);
    }
}
