//! Lexical variable scopes

use roole_syntax::Node;
use rustc_hash::FxHashMap;

/// Stack of variable frames, innermost last
#[derive(Debug)]
pub struct Scope {
    frames: Vec<FxHashMap<String, Node>>,
}

impl Scope {
    pub fn new() -> Self {
        Self {
            frames: vec![FxHashMap::default()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Bind `name` in the innermost frame
    pub fn define(&mut self, name: &str, value: Node) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    /// Look `name` up from the innermost frame outwards
    pub fn resolve(&self, name: &str) -> Option<&Node> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}
