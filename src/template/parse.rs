//! Template source to syntax tree.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Candidate tags: `{$...}`, or a keyword alone or followed by whitespace or
/// `(`, on a single line without nested braces. Anything else in braces is
/// literal text.
static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(\$[^{}\n]*|(?:if|else|endif|loop|onEmpty|endloop)(?:[\s(][^{}\n]*)?)\}")
        .expect("Invalid tag regex")
});

static VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\$(?P<path>[A-Za-z_][\w]*(?:\.\w+)*)(?:\s*\|\s*join\((?P<sep>"(?:[^"\\]|\\.)*"|'[^']*'|[^)]*)\))?$"#)
        .expect("Invalid variable regex")
});

static LOOP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^loop\s+in\s+\$(?P<src>[A-Za-z_]\w*(?:\.\w+)*)\s+as\s+\$(?P<item>[A-Za-z_]\w*)(?:\s+counter\s*=\s*\$(?P<idx>[A-Za-z_]\w*)(?:\s*,\s*\$(?P<ord>[A-Za-z_]\w*))?)?\s*$")
        .expect("Invalid loop regex")
});

/// Dotted variable reference (`$a.b.0.c`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Path {
    pub segments: Vec<String>,
}

impl Path {
    pub fn parse(text: &str) -> Self {
        Self {
            segments: text.split('.').map(String::from).collect(),
        }
    }

    pub fn root(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or_default()
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.segments.join("."))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Set,
    Clear,
    Unset,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    Or(Vec<Condition>),
    And(Vec<Condition>),
    Not(Box<Condition>),
    Truthy(Path),
    Compare {
        path: Path,
        equal: bool,
        literal: Literal,
    },
    Is {
        path: Path,
        state: State,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Var {
        path: Path,
        join: Option<String>,
    },
    If {
        branches: Vec<(Condition, Vec<Node>)>,
        otherwise: Option<Vec<Node>>,
    },
    Loop {
        source: Path,
        item: String,
        index: Option<String>,
        ordinal: Option<String>,
        body: Vec<Node>,
        on_empty: Option<Vec<Node>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Tag {
    Var { path: Path, join: Option<String> },
    If(Condition),
    ElseIf(Condition),
    Else,
    EndIf,
    Loop {
        source: Path,
        item: String,
        index: Option<String>,
        ordinal: Option<String>,
    },
    OnEmpty,
    EndLoop,
}

impl Tag {
    fn label(&self) -> &'static str {
        match self {
            Tag::Var { .. } => "variable",
            Tag::If(_) => "{if}",
            Tag::ElseIf(_) => "{else if}",
            Tag::Else => "{else}",
            Tag::EndIf => "{endif}",
            Tag::Loop { .. } => "{loop}",
            Tag::OnEmpty => "{onEmpty}",
            Tag::EndLoop => "{endloop}",
        }
    }
}

enum Token {
    Text(String),
    Tag(Tag, usize),
}

/// Parse template source into nodes.
pub(crate) fn parse(name: &str, source: &str) -> Result<Vec<Node>> {
    let tokens = tokenize(name, source)?;
    let mut parser = Parser {
        name,
        tokens: tokens.into_iter(),
    };
    let (nodes, stray) = parser.sequence()?;
    match stray {
        None => Ok(nodes),
        Some((tag, line)) => Err(parser.error(line, format!("unexpected {}", tag.label()))),
    }
}

fn tokenize(name: &str, source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for m in TAG.captures_iter(source) {
        let (Some(whole), Some(body)) = (m.get(0), m.get(1)) else {
            continue;
        };
        if whole.start() > last {
            tokens.push(Token::Text(source[last..whole.start()].to_string()));
        }
        let line = source[..whole.start()].matches('\n').count() + 1;
        let tag = parse_tag(body.as_str().trim())
            .map_err(|msg| Error::template_syntax(name, format!("line {}: {}", line, msg)))?;
        tokens.push(Token::Tag(tag, line));
        last = whole.end();
    }
    if last < source.len() {
        tokens.push(Token::Text(source[last..].to_string()));
    }
    Ok(tokens)
}

fn parse_tag(body: &str) -> std::result::Result<Tag, String> {
    if body.starts_with('$') {
        let caps = VAR
            .captures(body)
            .ok_or_else(|| format!("malformed variable tag '{{{}}}'", body))?;
        let path = Path::parse(&caps["path"]);
        let join = caps.name("sep").map(|m| unquote(m.as_str().trim()));
        return Ok(Tag::Var { path, join });
    }
    let keyword = body.split(|c: char| c.is_whitespace() || c == '(').next().unwrap_or_default();
    match keyword {
        "if" => Ok(Tag::If(parse_condition_tag(&body[2..])?)),
        "else" => {
            let rest = body[4..].trim_start();
            if rest.is_empty() {
                Ok(Tag::Else)
            } else if let Some(cond) = rest.strip_prefix("if") {
                Ok(Tag::ElseIf(parse_condition_tag(cond)?))
            } else {
                Err(format!("malformed tag '{{{}}}'", body))
            }
        }
        "endif" if body == "endif" => Ok(Tag::EndIf),
        "onEmpty" if body == "onEmpty" => Ok(Tag::OnEmpty),
        "endloop" if body == "endloop" => Ok(Tag::EndLoop),
        "loop" => {
            let caps = LOOP
                .captures(body)
                .ok_or_else(|| format!("malformed loop tag '{{{}}}'", body))?;
            Ok(Tag::Loop {
                source: Path::parse(&caps["src"]),
                item: caps["item"].to_string(),
                index: caps.name("idx").map(|m| m.as_str().to_string()),
                ordinal: caps.name("ord").map(|m| m.as_str().to_string()),
            })
        }
        _ => Err(format!("malformed tag '{{{}}}'", body)),
    }
}

fn unquote(text: &str) -> String {
    let quoted = (text.starts_with('"') && text.ends_with('"'))
        || (text.starts_with('\'') && text.ends_with('\''));
    if quoted && text.len() >= 2 {
        unescape(&text[1..text.len() - 1])
    } else {
        text.to_string()
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// `(cond)` after the `if` keyword.
fn parse_condition_tag(rest: &str) -> std::result::Result<Condition, String> {
    let rest = rest.trim();
    if !(rest.starts_with('(') && rest.ends_with(')')) {
        return Err(format!("condition must be parenthesized: '{}'", rest));
    }
    let tokens = lex_condition(rest)?;
    let mut parser = CondParser { tokens, pos: 0 };
    let cond = parser.or()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected trailing input in condition '{}'", rest));
    }
    Ok(cond)
}

#[derive(Debug, Clone, PartialEq)]
enum CondToken {
    Var(Path),
    Lit(Literal),
    Word(String),
    Eq,
    Ne,
    Not,
    And,
    Or,
    Open,
    Close,
}

fn lex_condition(text: &str) -> std::result::Result<Vec<CondToken>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                tokens.push(CondToken::Open);
                i += 1;
            }
            ')' => {
                tokens.push(CondToken::Close);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(CondToken::Eq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(CondToken::Ne);
                i += 2;
            }
            '!' => {
                tokens.push(CondToken::Not);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(CondToken::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(CondToken::Or);
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let mut j = i + 1;
                let mut raw = String::new();
                while j < chars.len() && chars[j] != quote {
                    if chars[j] == '\\' && j + 1 < chars.len() {
                        raw.push(chars[j]);
                        j += 1;
                    }
                    raw.push(chars[j]);
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(format!("unterminated string in condition '{}'", text));
                }
                tokens.push(CondToken::Lit(Literal::Str(unescape(&raw))));
                i = j + 1;
            }
            '$' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_' || chars[j] == '.') {
                    j += 1;
                }
                let name: String = chars[start..j].iter().collect();
                if name.is_empty() || name.starts_with('.') || name.ends_with('.') {
                    return Err(format!("malformed variable in condition '{}'", text));
                }
                tokens.push(CondToken::Var(Path::parse(&name)));
                i = j;
            }
            c if c == '-' || c.is_ascii_digit() => {
                let start = i;
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                let digits: String = chars[start..j].iter().collect();
                let n = digits
                    .parse::<i64>()
                    .map_err(|_| format!("invalid integer '{}' in condition", digits))?;
                tokens.push(CondToken::Lit(Literal::Int(n)));
                i = j;
            }
            c if c.is_alphabetic() => {
                let start = i;
                let mut j = i;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                let word: String = chars[start..j].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => CondToken::And,
                    "or" => CondToken::Or,
                    "true" => CondToken::Lit(Literal::Bool(true)),
                    "false" => CondToken::Lit(Literal::Bool(false)),
                    "null" => CondToken::Lit(Literal::Null),
                    _ => CondToken::Word(word),
                });
                i = j;
            }
            other => return Err(format!("unexpected '{}' in condition '{}'", other, text)),
        }
    }
    Ok(tokens)
}

struct CondParser {
    tokens: Vec<CondToken>,
    pos: usize,
}

impl CondParser {
    fn peek(&self) -> Option<&CondToken> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<CondToken> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or(&mut self) -> std::result::Result<Condition, String> {
        let mut terms = vec![self.and()?];
        while self.peek() == Some(&CondToken::Or) {
            self.pos += 1;
            terms.push(self.and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Condition::Or(terms)
        })
    }

    fn and(&mut self) -> std::result::Result<Condition, String> {
        let mut terms = vec![self.unary()?];
        while self.peek() == Some(&CondToken::And) {
            self.pos += 1;
            terms.push(self.unary()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Condition::And(terms)
        })
    }

    fn unary(&mut self) -> std::result::Result<Condition, String> {
        match self.next() {
            Some(CondToken::Not) => Ok(Condition::Not(Box::new(self.unary()?))),
            Some(CondToken::Open) => {
                let inner = self.or()?;
                match self.next() {
                    Some(CondToken::Close) => Ok(inner),
                    _ => Err("missing ')' in condition".to_string()),
                }
            }
            Some(CondToken::Var(path)) => self.comparison(path),
            Some(other) => Err(format!("expected variable, found {:?}", other)),
            None => Err("empty condition".to_string()),
        }
    }

    fn comparison(&mut self, path: Path) -> std::result::Result<Condition, String> {
        match self.peek() {
            Some(CondToken::Eq) | Some(CondToken::Ne) => {
                let equal = self.next() == Some(CondToken::Eq);
                match self.next() {
                    Some(CondToken::Lit(literal)) => Ok(Condition::Compare {
                        path,
                        equal,
                        literal,
                    }),
                    _ => Err(format!("expected literal after comparison with {}", path)),
                }
            }
            Some(CondToken::Word(w)) if w == "is" => {
                self.pos += 1;
                let state = match self.next() {
                    Some(CondToken::Word(w)) if w == "set" => State::Set,
                    Some(CondToken::Word(w)) if w == "clear" => State::Clear,
                    Some(CondToken::Word(w)) if w == "unset" => State::Unset,
                    _ => return Err(format!("expected set, clear or unset after '{} is'", path)),
                };
                Ok(Condition::Is { path, state })
            }
            _ => Ok(Condition::Truthy(path)),
        }
    }
}

struct Parser<'a> {
    name: &'a str,
    tokens: std::vec::IntoIter<Token>,
}

type Terminator = Option<(Tag, usize)>;

impl<'a> Parser<'a> {
    fn error(&self, line: usize, message: impl std::fmt::Display) -> Error {
        Error::template_syntax(self.name, format!("line {}: {}", line, message))
    }

    /// Parse nodes until a block tag that closes or splits the enclosing
    /// construct, returned as the terminator.
    fn sequence(&mut self) -> Result<(Vec<Node>, Terminator)> {
        let mut nodes = Vec::new();
        while let Some(token) = self.tokens.next() {
            match token {
                Token::Text(text) => nodes.push(Node::Text(text)),
                Token::Tag(Tag::Var { path, join }, _) => nodes.push(Node::Var { path, join }),
                Token::Tag(Tag::If(cond), line) => nodes.push(self.conditional(cond, line)?),
                Token::Tag(
                    Tag::Loop {
                        source,
                        item,
                        index,
                        ordinal,
                    },
                    line,
                ) => nodes.push(self.repetition(source, item, index, ordinal, line)?),
                Token::Tag(tag, line) => return Ok((nodes, Some((tag, line)))),
            }
        }
        Ok((nodes, None))
    }

    fn conditional(&mut self, first: Condition, opened: usize) -> Result<Node> {
        let mut branches = Vec::new();
        let mut cond = first;
        loop {
            let (body, term) = self.sequence()?;
            branches.push((cond, body));
            match term {
                Some((Tag::ElseIf(next), _)) => cond = next,
                Some((Tag::Else, _)) => {
                    let (otherwise, term) = self.sequence()?;
                    return match term {
                        Some((Tag::EndIf, _)) => Ok(Node::If {
                            branches,
                            otherwise: Some(otherwise),
                        }),
                        Some((Tag::Else, line)) => Err(self.error(line, "duplicate {else}")),
                        Some((Tag::ElseIf(_), line)) => {
                            Err(self.error(line, "{else if} after {else}"))
                        }
                        Some((tag, line)) => {
                            Err(self.error(line, format!("unexpected {} inside {{if}}", tag.label())))
                        }
                        None => Err(self.error(opened, "unterminated {if}")),
                    };
                }
                Some((Tag::EndIf, _)) => {
                    return Ok(Node::If {
                        branches,
                        otherwise: None,
                    })
                }
                Some((tag, line)) => {
                    return Err(self.error(line, format!("unexpected {} inside {{if}}", tag.label())))
                }
                None => return Err(self.error(opened, "unterminated {if}")),
            }
        }
    }

    fn repetition(
        &mut self,
        source: Path,
        item: String,
        index: Option<String>,
        ordinal: Option<String>,
        opened: usize,
    ) -> Result<Node> {
        let (body, term) = self.sequence()?;
        let on_empty = match term {
            Some((Tag::EndLoop, _)) => None,
            Some((Tag::OnEmpty, _)) => {
                let (on_empty, term) = self.sequence()?;
                match term {
                    Some((Tag::EndLoop, _)) => Some(on_empty),
                    Some((Tag::OnEmpty, line)) => return Err(self.error(line, "duplicate {onEmpty}")),
                    Some((tag, line)) => {
                        return Err(self.error(line, format!("unexpected {} inside {{loop}}", tag.label())))
                    }
                    None => return Err(self.error(opened, "unterminated {loop}")),
                }
            }
            Some((tag, line)) => {
                return Err(self.error(line, format!("unexpected {} inside {{loop}}", tag.label())))
            }
            None => return Err(self.error(opened, "unterminated {loop}")),
        };
        Ok(Node::Loop {
            source,
            item,
            index,
            ordinal,
            body,
            on_empty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syntax_error(source: &str) -> String {
        match parse("t", source) {
            Err(Error::TemplateSyntax { message, .. }) => message,
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_literal_braces_are_text() {
        let nodes = parse("t", "protocols {\n    bgp { }\n}\n{ifname}").unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(matches!(&nodes[0], Node::Text(t) if t.contains("bgp { }")));

        let nodes = parse("t", "set policy {if-match} {else-x} {loop.1} {endif_}\n").unwrap();
        assert_eq!(
            nodes,
            vec![Node::Text("set policy {if-match} {else-x} {loop.1} {endif_}\n".to_string())]
        );
    }

    #[test]
    fn test_variable_and_join() {
        let nodes = parse("t", "{$a.b}{$list|join(\", \")}{$x|join(:)}").unwrap();
        assert_eq!(
            nodes[0],
            Node::Var {
                path: Path::parse("a.b"),
                join: None
            }
        );
        assert!(matches!(&nodes[1], Node::Var { join: Some(s), .. } if s == ", "));
        assert!(matches!(&nodes[2], Node::Var { join: Some(s), .. } if s == ":"));
    }

    #[test]
    fn test_condition_precedence() {
        let nodes = parse("t", "{if ($a or $b and !$c)}x{endif}").unwrap();
        let Node::If { branches, .. } = &nodes[0] else {
            panic!("expected if");
        };
        assert!(matches!(&branches[0].0, Condition::Or(terms)
            if matches!(terms[1], Condition::And(_))));
    }

    #[test]
    fn test_condition_forms() {
        let cond = parse_condition_tag(r#"($mode == "access" and $vlan != 1 and $shut is clear)"#).unwrap();
        let Condition::And(terms) = cond else {
            panic!("expected and");
        };
        assert_eq!(terms.len(), 3);
        assert!(matches!(&terms[2], Condition::Is { state: State::Clear, .. }));
    }

    #[test]
    fn test_loop_tag() {
        let nodes = parse("t", "{loop in $ports as $p counter=$i,$n}{$p}{onEmpty}none{endloop}").unwrap();
        let Node::Loop {
            item,
            index,
            ordinal,
            on_empty,
            ..
        } = &nodes[0]
        else {
            panic!("expected loop");
        };
        assert_eq!(item, "p");
        assert_eq!(index.as_deref(), Some("i"));
        assert_eq!(ordinal.as_deref(), Some("n"));
        assert!(on_empty.is_some());
    }

    #[test]
    fn test_structural_errors() {
        assert!(syntax_error("{if ($a)}x").contains("unterminated {if}"));
        assert!(syntax_error("x{endif}").contains("unexpected {endif}"));
        assert!(syntax_error("{if ($a)}{else}{else}{endif}").contains("duplicate {else}"));
        assert!(syntax_error("{loop in $a as $b}{onEmpty}{onEmpty}{endloop}").contains("duplicate {onEmpty}"));
        assert!(syntax_error("{loop in $a as $b}x").contains("unterminated {loop}"));
        assert!(syntax_error("{if ($a)}{endloop}{endif}").contains("unexpected {endloop}"));
    }

    #[test]
    fn test_malformed_tags() {
        assert!(syntax_error("{loop in items}{endloop}").contains("malformed loop"));
        assert!(syntax_error("{if $a}{endif}").contains("parenthesized"));
        assert!(syntax_error("{if ($a ==)}{endif}").contains("expected literal"));
        assert!(syntax_error("{$a b}").contains("malformed variable"));
        assert!(syntax_error("line one\n{endif x}").contains("line 2"));
    }
}
