//! Best-effort parsing of a JSON document that is still arriving.
//!
//! The scanner walks the text once, tracking open containers and the last
//! prefix that is known to close into valid JSON. The repaired candidates
//! are then handed to `serde_json`, so anything returned is real JSON.

use serde_json::Value;

#[derive(Clone, Copy, PartialEq)]
enum Frame {
    /// Expecting a key or `}`
    ObjectKey,
    /// Key read, expecting `:`
    ObjectColon,
    ObjectValue,
    /// Value read (or being read), expecting `,` or `}`
    ObjectNext,
    ArrayValue,
    ArrayNext,
}

#[derive(Default)]
struct Scan {
    stack: Vec<Frame>,
    in_string: bool,
    string_is_key: bool,
    escape: bool,
    /// Byte length of the last safe prefix and the closers it needs
    safe: Option<(usize, String)>,
}

impl Scan {
    fn closers(&self) -> String {
        self.stack
            .iter()
            .rev()
            .map(|f| match f {
                Frame::ObjectKey | Frame::ObjectColon | Frame::ObjectValue | Frame::ObjectNext => '}',
                Frame::ArrayValue | Frame::ArrayNext => ']',
            })
            .collect()
    }

    fn value_started(&mut self) {
        if let Some(top) = self.stack.last_mut() {
            *top = match *top {
                Frame::ObjectValue => Frame::ObjectNext,
                Frame::ArrayValue => Frame::ArrayNext,
                other => other,
            };
        }
    }

    fn mark_safe(&mut self, end: usize) {
        self.safe = Some((end, self.closers()));
    }

    fn run(text: &str) -> Self {
        let mut scan = Scan::default();

        for (i, c) in text.char_indices() {
            if scan.in_string {
                if scan.escape {
                    scan.escape = false;
                } else if c == '\\' {
                    scan.escape = true;
                } else if c == '"' {
                    scan.in_string = false;
                    if scan.string_is_key {
                        if let Some(top) = scan.stack.last_mut() {
                            *top = Frame::ObjectColon;
                        }
                    } else {
                        scan.value_started();
                        scan.mark_safe(i + 1);
                    }
                }
                continue;
            }

            match c {
                '{' => {
                    scan.value_started();
                    scan.stack.push(Frame::ObjectKey);
                    scan.mark_safe(i + 1);
                }
                '[' => {
                    scan.value_started();
                    scan.stack.push(Frame::ArrayValue);
                    scan.mark_safe(i + 1);
                }
                '}' | ']' => {
                    scan.stack.pop();
                    scan.mark_safe(i + 1);
                }
                '"' => {
                    scan.in_string = true;
                    scan.string_is_key = scan.stack.last() == Some(&Frame::ObjectKey);
                }
                ':' => {
                    if let Some(top) = scan.stack.last_mut() {
                        if *top == Frame::ObjectColon {
                            *top = Frame::ObjectValue;
                        }
                    }
                }
                ',' => {
                    // Everything before the comma is a finished value
                    scan.mark_safe(i);
                    if let Some(top) = scan.stack.last_mut() {
                        *top = match *top {
                            Frame::ObjectNext => Frame::ObjectKey,
                            Frame::ArrayNext => Frame::ArrayValue,
                            other => other,
                        };
                    }
                }
                c if c.is_whitespace() => {}
                // Number or literal in progress
                _ => scan.value_started(),
            }
        }

        scan
    }

    fn candidates(&self, text: &str) -> Vec<String> {
        let mut out = Vec::with_capacity(2);

        if self.in_string {
            if !self.string_is_key {
                let body = if self.escape { &text[..text.len() - 1] } else { text };
                out.push(format!("{}\"{}", body, self.closers()));
            }
        } else {
            out.push(format!("{}{}", text.trim_end(), self.closers()));
        }

        if let Some((end, closers)) = &self.safe {
            out.push(format!("{}{}", &text[..*end], closers));
        }
        out
    }
}

/// Parse possibly-truncated JSON text. Returns `None` when nothing usable
/// has arrived yet.
pub fn parse_partial(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    Scan::run(text)
        .candidates(text)
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<Value>(&candidate).ok())
}
