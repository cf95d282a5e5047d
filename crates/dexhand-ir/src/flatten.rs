//! Pre-order flattening of the nested body tree.

use crate::{BodyDecl, Document};

/// A body declaration with its parent named explicitly.
///
/// This is the parent-indexed form the kernel's tree builder consumes.
#[derive(Debug, Clone, Copy)]
pub struct FlatBody<'a> {
    /// The declaration. Its `children` are ignored by consumers of this form.
    pub decl: &'a BodyDecl,
    /// Parent body name. `None` for the root.
    pub parent: Option<&'a str>,
    /// Default class inherited from the nearest ancestor-or-self `childclass`.
    pub childclass: Option<&'a str>,
}

impl<'a> FlatBody<'a> {
    /// A root record.
    pub fn root(decl: &'a BodyDecl) -> Self {
        Self {
            decl,
            parent: None,
            childclass: decl.childclass.as_deref(),
        }
    }

    /// A record under `parent`.
    pub fn child(decl: &'a BodyDecl, parent: &'a str) -> Self {
        Self {
            decl,
            parent: Some(parent),
            childclass: decl.childclass.as_deref(),
        }
    }

    /// Body name.
    pub fn name(&self) -> &'a str {
        &self.decl.name
    }
}

impl Document {
    /// Flatten the body tree in depth-first pre-order.
    ///
    /// The returned order is the order bodies (and therefore joints) are
    /// numbered in.
    pub fn flatten(&self) -> Vec<FlatBody<'_>> {
        let mut out = Vec::with_capacity(self.body_count());
        let mut stack: Vec<(&BodyDecl, Option<&str>, Option<&str>)> =
            vec![(&self.root, None, None)];

        while let Some((decl, parent, inherited)) = stack.pop() {
            let childclass = decl.childclass.as_deref().or(inherited);
            out.push(FlatBody {
                decl,
                parent,
                childclass,
            });
            // Reverse so the first child is visited first.
            for child in decl.children.iter().rev() {
                stack.push((child, Some(decl.name.as_str()), childclass));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preorder_with_inherited_class() {
        let root = BodyDecl::new("a")
            .with_child(
                BodyDecl::new("b")
                    .with_childclass("finger")
                    .with_child(BodyDecl::new("c")),
            )
            .with_child(BodyDecl::new("d"));
        let doc = Document::with_root("m", root);
        let flat = doc.flatten();

        let names: Vec<_> = flat.iter().map(|f| f.name()).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);

        let parents: Vec<_> = flat.iter().map(|f| f.parent).collect();
        assert_eq!(parents, [None, Some("a"), Some("b"), Some("a")]);

        assert_eq!(flat[2].childclass, Some("finger"));
        assert_eq!(flat[3].childclass, None);
    }
}
