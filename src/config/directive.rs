use super::lexer::Loc;

/// A generic parse-tree node: every block and every leaf directive becomes
/// one of these before the typed build pass interprets it.
#[derive(Debug, Clone)]
pub struct Directive {
    pub name: String,
    pub args: Vec<String>,
    pub children: Vec<Directive>,
    pub loc: Loc,
}

impl Directive {
    pub fn child(&self, name: &str) -> Option<&Directive> {
        self.children.iter().find(|d| d.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Directive> {
        self.children.iter().filter(move |d| d.name == name)
    }

    pub fn arg(&self, idx: usize) -> Option<&str> {
        self.args.get(idx).map(|s| s.as_str())
    }
}
