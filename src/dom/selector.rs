use std::fmt;

// ============================================================================
// Parsed selector model
// ============================================================================

/// A comma-separated selector list. Each group is a chain of compound
/// selectors read left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    pub(crate) groups: Vec<Vec<SelectorPart>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    /// Relation to the part on the left. `None` for the first part.
    pub(crate) combinator: Option<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<AttrCondition>,
    pub(crate) pseudo: Vec<PseudoClass>,
}

impl SelectorStep {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && !self.universal
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudo.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    Includes { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
}

impl AttrCondition {
    pub(crate) fn key(&self) -> &str {
        match self {
            AttrCondition::Exists { key }
            | AttrCondition::Eq { key, .. }
            | AttrCondition::Includes { key, .. }
            | AttrCondition::StartsWith { key, .. }
            | AttrCondition::EndsWith { key, .. }
            | AttrCondition::Contains { key, .. } => key,
        }
    }

    pub(crate) fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self {
            AttrCondition::Exists { .. } => true,
            AttrCondition::Eq { value, .. } => actual == value,
            AttrCondition::Includes { value, .. } => {
                !value.is_empty() && actual.split_whitespace().any(|w| w == value)
            }
            AttrCondition::StartsWith { value, .. } => {
                !value.is_empty() && actual.starts_with(value.as_str())
            }
            AttrCondition::EndsWith { value, .. } => {
                !value.is_empty() && actual.ends_with(value.as_str())
            }
            AttrCondition::Contains { value, .. } => {
                !value.is_empty() && actual.contains(value.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PseudoClass {
    FirstChild,
    /// 1-based position among the parent's element children.
    NthChild(usize),
    /// 1-based position among siblings with the same tag.
    NthOfType(usize),
}

// ============================================================================
// Errors
// ============================================================================

/// The selector text is not valid (or not supported) locator syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorError {
    pub selector: String,
    pub reason: &'static str,
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid selector '{}': {}", self.selector, self.reason)
    }
}

impl std::error::Error for SelectorError {}

// ============================================================================
// Parser
// ============================================================================

pub fn parse_selector(selector: &str) -> Result<SelectorList, SelectorError> {
    let mut parser = Parser {
        source: selector,
        chars: selector.chars().collect(),
        pos: 0,
    };
    parser.parse_list()
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn fail<T>(&self, reason: &'static str) -> Result<T, SelectorError> {
        Err(SelectorError {
            selector: self.source.to_string(),
            reason,
        })
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self) -> Result<SelectorList, SelectorError> {
        let mut groups = Vec::new();
        loop {
            self.skip_ws();
            groups.push(self.parse_chain()?);
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(',') => {
                    self.pos += 1;
                }
                Some(_) => return self.fail("unexpected character"),
            }
        }
        Ok(SelectorList { groups })
    }

    fn parse_chain(&mut self) -> Result<Vec<SelectorPart>, SelectorError> {
        let mut parts = vec![SelectorPart {
            step: self.parse_compound()?,
            combinator: None,
        }];

        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(_) if had_ws => Combinator::Descendant,
                Some(_) => return self.fail("expected combinator"),
            };
            parts.push(SelectorPart {
                step: self.parse_compound()?,
                combinator: Some(combinator),
            });
        }

        Ok(parts)
    }

    fn parse_compound(&mut self) -> Result<SelectorStep, SelectorError> {
        let mut step = SelectorStep::default();

        if self.eat('*') {
            step.universal = true;
        } else if matches!(self.peek(), Some(c) if is_ident_start(c)) {
            step.tag = Some(self.parse_ident()?.to_ascii_lowercase());
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.parse_ident()?;
                    if step.id.replace(id).is_some() {
                        return self.fail("duplicate id");
                    }
                }
                Some('.') => {
                    self.pos += 1;
                    step.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    step.attrs.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.pos += 1;
                    step.pseudo.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if step.is_empty() {
            return self.fail("empty compound selector");
        }
        Ok(step)
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                out.push(self.parse_escape()?);
            } else if is_ident_char(c) {
                self.pos += 1;
                out.push(c);
            } else {
                break;
            }
        }
        if out.is_empty() {
            return self.fail("expected identifier");
        }
        Ok(out)
    }

    /// Called after the backslash.
    fn parse_escape(&mut self) -> Result<char, SelectorError> {
        let mut hex = String::new();
        while hex.len() < 6 {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    hex.push(c);
                    self.pos += 1;
                }
                _ => break,
            }
        }

        if hex.is_empty() {
            return match self.bump() {
                Some(c) => Ok(c),
                None => self.fail("dangling escape"),
            };
        }

        // A single whitespace terminates a hex escape.
        if matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        let code = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFD);
        Ok(char::from_u32(code)
            .filter(|c| *c != '\0')
            .unwrap_or('\u{FFFD}'))
    }

    fn parse_attr(&mut self) -> Result<AttrCondition, SelectorError> {
        self.skip_ws();
        let key = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();

        if self.eat(']') {
            return Ok(AttrCondition::Exists { key });
        }

        let op = match self.bump() {
            Some('=') => '=',
            Some(c @ ('~' | '^' | '$' | '*')) if self.eat('=') => c,
            _ => return self.fail("bad attribute operator"),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                self.parse_quoted(q)?
            }
            _ => self.parse_ident()?,
        };
        self.skip_ws();
        if !self.eat(']') {
            return self.fail("unterminated attribute selector");
        }

        Ok(match op {
            '=' => AttrCondition::Eq { key, value },
            '~' => AttrCondition::Includes { key, value },
            '^' => AttrCondition::StartsWith { key, value },
            '$' => AttrCondition::EndsWith { key, value },
            _ => AttrCondition::Contains { key, value },
        })
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return self.fail("unterminated string"),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.parse_escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_pseudo(&mut self) -> Result<PseudoClass, SelectorError> {
        let name = self.parse_ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => Ok(PseudoClass::FirstChild),
            "nth-child" => Ok(PseudoClass::NthChild(self.parse_index_arg()?)),
            "nth-of-type" => Ok(PseudoClass::NthOfType(self.parse_index_arg()?)),
            _ => self.fail("unsupported pseudo-class"),
        }
    }

    fn parse_index_arg(&mut self) -> Result<usize, SelectorError> {
        if !self.eat('(') {
            return self.fail("expected '('");
        }
        self.skip_ws();
        let mut digits = String::new();
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            digits.push(c);
            self.pos += 1;
        }
        self.skip_ws();
        if !self.eat(')') {
            return self.fail("expected ')'");
        }
        match digits.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => self.fail("index must be a positive integer"),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || c == '\\' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

// ============================================================================
// Escaping
// ============================================================================

/// Escape a string for use as a CSS identifier, following the rules of the
/// platform `CSS.escape`.
pub fn css_escape(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());

    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        if c == '\0' {
            out.push('\u{FFFD}');
        } else if (0x01..=0x1F).contains(&code)
            || code == 0x7F
            || (i == 0 && c.is_ascii_digit())
            || (i == 1 && c.is_ascii_digit() && chars[0] == '-')
        {
            out.push_str(&format!("\\{:x} ", code));
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if code >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }

    out
}
