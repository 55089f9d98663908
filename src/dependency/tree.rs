use serde::Serialize;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Nested dependency view of one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyTree {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyTree>,
    /// Depth limit reached or the service already appears on this path.
    #[serde(skip_serializing_if = "is_false")]
    pub truncated: bool,
    /// Referenced but not among the loaded schemas.
    #[serde(skip_serializing_if = "is_false")]
    pub missing: bool,
}

impl DependencyTree {
    /// Box-drawing rendering, one service per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.label());
        out.push('\n');
        let count = self.dependencies.len();
        for (i, child) in self.dependencies.iter().enumerate() {
            child.render_into(&mut out, "", i + 1 == count);
        }
        out
    }

    fn render_into(&self, out: &mut String, prefix: &str, last: bool) {
        out.push_str(prefix);
        out.push_str(if last { "└── " } else { "├── " });
        out.push_str(&self.label());
        out.push('\n');

        let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
        let count = self.dependencies.len();
        for (i, child) in self.dependencies.iter().enumerate() {
            child.render_into(out, &child_prefix, i + 1 == count);
        }
    }

    fn label(&self) -> String {
        let mut label = if self.name == self.id {
            self.id.clone()
        } else {
            format!("{} ({})", self.name, self.id)
        };
        if self.missing {
            label.push_str(" [missing]");
        } else if self.truncated {
            label.push_str(" ...");
        }
        label
    }
}
