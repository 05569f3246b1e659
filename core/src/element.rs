use std::fmt::Display;

/// Output of a render pass. A tree of text, flattened to lines for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Element {
    #[default]
    Empty,
    Text(String),
    Column(Vec<Element>),
    /// Children shifted right by two columns.
    Indent(Box<Element>),
}

impl Element {
    pub fn text(text: impl Into<String>) -> Self {
        Element::Text(text.into())
    }

    pub fn column(children: impl IntoIterator<Item = Element>) -> Self {
        Element::Column(children.into_iter().collect())
    }

    pub fn indent(child: Element) -> Self {
        Element::Indent(Box::new(child))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Element::Empty => true,
            Element::Text(_) => false,
            Element::Column(children) => children.iter().all(Element::is_empty),
            Element::Indent(child) => child.is_empty(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.push_lines(0, &mut lines);
        lines
    }

    fn push_lines(&self, depth: usize, lines: &mut Vec<String>) {
        match self {
            Element::Empty => {}
            Element::Text(text) => {
                for line in text.lines() {
                    lines.push(format!("{:width$}{line}", "", width = depth * 2));
                }
            }
            Element::Column(children) => {
                for child in children {
                    child.push_lines(depth, lines);
                }
            }
            Element::Indent(child) => child.push_lines(depth + 1, lines),
        }
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        match self {
            Element::Empty => false,
            Element::Text(text) => text.contains(needle),
            Element::Column(children) => children.iter().any(|child| child.contains(needle)),
            Element::Indent(child) => child.contains(needle),
        }
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl From<&str> for Element {
    fn from(text: &str) -> Self {
        Element::text(text)
    }
}

impl From<String> for Element {
    fn from(text: String) -> Self {
        Element::Text(text)
    }
}

impl<T: Into<Element>> From<Option<T>> for Element {
    fn from(el: Option<T>) -> Self {
        el.map_or(Element::Empty, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_with_indentation() {
        let el = Element::column([
            Element::text("Movie search"),
            Element::indent(Element::column([
                Element::text("Alien"),
                Element::Empty,
                Element::indent("loading".into()),
            ])),
        ]);
        assert_eq!(el.lines(), vec!["Movie search", "  Alien", "    loading"]);
        assert!(el.contains("loading"));
        assert!(!el.contains("Aliens"));
    }

    #[test]
    fn empty_columns_are_empty() {
        assert!(Element::column([Element::Empty, Element::indent(Element::Empty)]).is_empty());
        assert!(!Element::column([Element::text("")]).is_empty());
    }
}
