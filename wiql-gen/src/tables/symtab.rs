use std::collections::HashMap;

/// Interning table: assigns dense indices to symbol names in first-seen order.
#[derive(Default, Debug, Clone)]
pub struct Symtab {
    index: HashMap<String, usize>,
    names: Vec<String>,
}

impl Symtab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.names.len();
        self.names.push(name.to_owned());
        self.index.insert(name.to_owned(), idx);
        idx
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
