//! Statement filters shared by passes 2 and 3.

pub mod directives;
pub mod scope;

pub use directives::{
    DirectiveErrorFilter, ExecFilter, NoteFilter, VarDeclarationFilter, VarFilter,
};
pub use scope::{
    AccessFilter, ClassFilter, LinemarkerFilter, NamespaceAliasFilter, NamespaceFilter,
    TypedefFilter, UsingFilter, UsingNamespaceFilter,
};

use crate::chain::{Chain, Filter};

/// Scope trackers in the order both passes consult them.
pub(crate) fn scope_filters(track_bases: bool) -> Vec<Box<dyn Filter>> {
    let class = if track_bases {
        ClassFilter::with_bases()
    } else {
        ClassFilter::without_bases()
    };
    vec![
        Box::new(class),
        Box::new(AccessFilter),
        Box::new(UsingNamespaceFilter),
        Box::new(NamespaceAliasFilter),
        Box::new(NamespaceFilter),
        Box::new(TypedefFilter),
        Box::new(UsingFilter),
    ]
}

/// The pass 2 chain.
pub fn accumulator_chain() -> Chain {
    let mut filters = scope_filters(true);
    // exec sits right after the access tracker
    filters.insert(2, Box::new(ExecFilter));
    filters.extend([
        Box::new(LinemarkerFilter) as Box<dyn Filter>,
        Box::new(NoteFilter),
        Box::new(VarFilter),
        Box::new(VarDeclarationFilter),
        Box::new(DirectiveErrorFilter::lenient()),
    ]);
    Chain::new(filters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accumulator_order() {
        assert_eq!(
            accumulator_chain().names(),
            vec![
                "class",
                "access",
                "exec",
                "using-namespace",
                "namespace-alias",
                "namespace",
                "typedef",
                "using",
                "linemarker",
                "note",
                "var",
                "var-declaration",
                "directive-error",
            ]
        );
    }
}
