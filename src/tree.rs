//! Directory-tree description derived from a file list.

/// Entries of one directory, in first-seen order.
#[derive(Debug, Default)]
struct Node {
    children: Vec<(String, Node)>,
    is_file: bool,
}

impl Node {
    fn insert(&mut self, rel: &str) {
        let mut current = self;
        let parts: Vec<&str> = rel.split('/').filter(|p| !p.is_empty()).collect();
        for (idx, part) in parts.iter().enumerate() {
            let pos = match current.children.iter().position(|(name, _)| name == part) {
                Some(pos) => pos,
                None => {
                    current.children.push((part.to_string(), Node::default()));
                    current.children.len() - 1
                }
            };
            current = &mut current.children[pos].1;
            if idx == parts.len() - 1 {
                current.is_file = true;
            }
        }
    }

    fn render(&self, depth: usize, out: &mut String) {
        for (name, child) in &self.children {
            out.push_str(&"  ".repeat(depth));
            out.push_str(name);
            // A path can be both a file and a directory prefix only in a
            // malformed list; render it as a directory so children stay visible.
            if !child.children.is_empty() || !child.is_file {
                out.push('/');
            }
            out.push('\n');
            child.render(depth + 1, out);
        }
    }
}

/// Describe the directory tree implied by `files`, two spaces per level,
/// directories suffixed with `/`. Pure function of the list and its order.
pub fn describe<S: AsRef<str>>(files: &[S]) -> String {
    let mut root = Node::default();
    for file in files {
        root.insert(file.as_ref());
    }
    let mut out = String::new();
    root.render(0, &mut out);
    out
}
