//! Tokenizer for the KEGG DBGET flat-file format.
//!
//! Every line carries its field tag in the first [`TAG_WIDTH`] columns and the
//! value after them. A tag starting at column 0 opens a new field, an indented
//! tag (`  AUTHORS` under `REFERENCE`) opens a subfield, and a line with a blank
//! tag column continues whichever field or subfield is open.

pub const TAG_WIDTH: usize = 12;
pub const TERMINATOR: &str = "///";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub key: String,
    pub subkey: Option<String>,
}

impl FieldKey {
    pub fn is(&self, key: &str) -> bool {
        self.subkey.is_none() && self.key == key
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub field: FieldKey,
    pub value: String,
}

/// Lazily tokenizes the lines of one entry.
pub struct Tokens<I> {
    lines: I,
    current_key: Option<String>,
    current_subkey: Option<String>,
}

impl<I, S> Iterator for Tokens<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        for line in self.lines.by_ref() {
            let line = line.as_ref();
            if line.starts_with(TERMINATOR) || line.trim().is_empty() {
                continue;
            }
            let (tag, value) = split_columns(line);
            let tag = tag.trim_end();
            if !tag.is_empty() {
                if tag.starts_with(' ') {
                    self.current_subkey = Some(tag.trim().to_string());
                } else {
                    self.current_key = Some(tag.to_string());
                    self.current_subkey = None;
                }
            }
            // text before the first tag has nothing to attach to
            let Some(key) = self.current_key.clone() else {
                continue;
            };
            return Some(Token {
                field: FieldKey {
                    key,
                    subkey: self.current_subkey.clone(),
                },
                value: value.trim_end().to_string(),
            });
        }
        None
    }
}

pub fn tokenize<I, S>(lines: I) -> Tokens<I::IntoIter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Tokens {
        lines: lines.into_iter(),
        current_key: None,
        current_subkey: None,
    }
}

/// A run of adjacent tokens sharing the same field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGroup {
    pub field: FieldKey,
    pub values: Vec<String>,
}

impl FieldGroup {
    pub fn first(&self) -> &str {
        self.values.first().map(String::as_str).unwrap_or("")
    }
}

/// Groups contiguous tokens by field. A field that reappears after another
/// one forms a new group.
pub fn group_fields<I>(tokens: I) -> Vec<FieldGroup>
where
    I: IntoIterator<Item = Token>,
{
    let mut groups: Vec<FieldGroup> = Vec::new();
    for token in tokens {
        match groups.last_mut() {
            Some(group) if group.field == token.field => group.values.push(token.value),
            _ => groups.push(FieldGroup {
                field: token.field,
                values: vec![token.value],
            }),
        }
    }
    groups
}

fn split_columns(line: &str) -> (&str, &str) {
    match line.char_indices().nth(TAG_WIDTH) {
        Some((index, _)) => line.split_at(index),
        None => (line, ""),
    }
}
